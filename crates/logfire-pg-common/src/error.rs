//! Error types for the logfire-pg gateway

use std::fmt;

/// Result type alias using GatewayError
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Main error type for the gateway
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Empty username, or the probe query did not prove the token valid
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// A psql catalog query was recognized and rejected
    #[error(
        "psql commands are not supported. Detected trying to use: {command}. Please run instead:\n\n{suggestion}"
    )]
    ClientToolQueryRejected { command: String, suggestion: String },

    /// Upstream answered with a non-success status
    #[error("query failed. Status code: {status}, body: {body}")]
    UpstreamQuery { status: u16, body: String },

    /// Upstream body could not be decoded
    #[error("Upstream protocol error: {0}")]
    UpstreamProtocol(String),

    /// Upstream could not be reached
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Column type without a PostgreSQL mapping
    #[error("unsupported type for column {column}: {data_type}")]
    UnsupportedType { column: String, data_type: String },

    /// A single value could not be converted mid-stream
    #[error("failed to convert column {column} row {row}: {reason}")]
    RowConversion {
        row: usize,
        column: usize,
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Create an internal error from any error type
    pub fn internal<E: fmt::Display>(err: E) -> Self {
        GatewayError::Internal(err.to_string())
    }

    /// Create an upstream protocol error from any error type
    pub fn protocol<E: fmt::Display>(err: E) -> Self {
        GatewayError::UpstreamProtocol(err.to_string())
    }

    /// Unsupported type error for a column that is not known yet (nested mapping)
    pub fn unsupported(data_type: impl fmt::Display) -> Self {
        GatewayError::UnsupportedType {
            column: String::new(),
            data_type: data_type.to_string(),
        }
    }

    /// Attach the column name to an `UnsupportedType` error
    pub fn for_column(self, name: &str) -> Self {
        match self {
            GatewayError::UnsupportedType { data_type, .. } => GatewayError::UnsupportedType {
                column: name.to_string(),
                data_type,
            },
            other => other,
        }
    }

    /// Attach row and column positions to a conversion failure
    pub fn at(self, row: usize, column: usize) -> Self {
        match self {
            GatewayError::RowConversion { reason, .. } => {
                GatewayError::RowConversion { row, column, reason }
            }
            GatewayError::UnsupportedType { data_type, .. } => GatewayError::RowConversion {
                row,
                column,
                reason: format!("unsupported type {}", data_type),
            },
            other => other,
        }
    }

    /// Conversion failure whose position is filled in by the caller via `at`
    pub fn conversion(reason: impl Into<String>) -> Self {
        GatewayError::RowConversion {
            row: 0,
            column: 0,
            reason: reason.into(),
        }
    }

    /// Get the error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::InvalidCredentials(_) => "INVALID_CREDENTIALS",
            GatewayError::ClientToolQueryRejected { .. } => "CLIENT_TOOL_QUERY_REJECTED",
            GatewayError::UpstreamQuery { .. } => "UPSTREAM_QUERY_ERROR",
            GatewayError::UpstreamProtocol(_) => "UPSTREAM_PROTOCOL_ERROR",
            GatewayError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            GatewayError::UnsupportedType { .. } => "UNSUPPORTED_TYPE",
            GatewayError::RowConversion { .. } => "ROW_CONVERSION_ERROR",
            GatewayError::Config(_) => "CONFIG_ERROR",
            GatewayError::Internal(_) => "INTERNAL",
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::UpstreamProtocol(format!("invalid JSON: {}", err))
    }
}
