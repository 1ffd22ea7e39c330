//! Error classification for the PostgreSQL front end
//!
//! Maps `GatewayError` to SQLSTATE codes and severities and turns it into the
//! `ErrorResponse` pgwire sends to the client.

use logfire_pg_common::GatewayError;
use pgwire::error::{ErrorInfo, PgWireError};
use std::fmt;

/// PostgreSQL SQLSTATE error codes
/// See: https://www.postgresql.org/docs/current/errcodes-appendix.html
pub mod sqlstate {
    // Class 08: Connection Exception
    pub const CONNECTION_FAILURE: &str = "08006";

    // Class 0A: Feature Not Supported
    pub const FEATURE_NOT_SUPPORTED: &str = "0A000";

    // Class 22: Data Exception
    pub const DATA_EXCEPTION: &str = "22000";

    // Class 28: Invalid Authorization
    pub const INVALID_PASSWORD: &str = "28P01";

    // Class 42: Syntax Error or Access Rule Violation
    pub const SYNTAX_ERROR_OR_ACCESS_RULE_VIOLATION: &str = "42000";
    pub const DATATYPE_MISMATCH: &str = "42804";

    // Class XX: Internal Error
    pub const INTERNAL_ERROR: &str = "XX000";
}

/// Severity sent in the `S` field of an ErrorResponse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// A classified error with all information needed for an ErrorResponse
#[derive(Debug, Clone)]
pub struct ClassifiedError {
    /// PostgreSQL SQLSTATE code
    pub sqlstate: &'static str,
    pub severity: Severity,
    /// Message shown to the client
    pub message: String,
    /// Optional hint for the user
    pub hint: Option<String>,
}

impl ClassifiedError {
    pub fn new(sqlstate: &'static str, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            sqlstate,
            severity,
            message: message.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Format for user display (includes hint if present)
    pub fn user_message(&self) -> String {
        let mut msg = self.message.clone();
        if let Some(ref hint) = self.hint {
            msg.push_str("\nHINT: ");
            msg.push_str(hint);
        }
        msg
    }

    pub fn into_error_info(self) -> ErrorInfo {
        let message = self.user_message();
        ErrorInfo::new(self.severity.to_string(), self.sqlstate.to_string(), message)
    }
}

/// Classify a gateway error for the client
pub fn classify(err: &GatewayError) -> ClassifiedError {
    use sqlstate::*;

    let message = err.to_string();
    match err {
        GatewayError::InvalidCredentials(_) => {
            ClassifiedError::new(INVALID_PASSWORD, Severity::Fatal, message)
                .with_hint("Use a Logfire read token as the password.")
        }
        GatewayError::ClientToolQueryRejected { .. } => {
            ClassifiedError::new(FEATURE_NOT_SUPPORTED, Severity::Error, message)
        }
        GatewayError::UpstreamQuery { .. } => ClassifiedError::new(
            SYNTAX_ERROR_OR_ACCESS_RULE_VIOLATION,
            Severity::Error,
            message,
        ),
        GatewayError::UpstreamProtocol(_) => {
            ClassifiedError::new(DATA_EXCEPTION, Severity::Fatal, message)
        }
        GatewayError::UpstreamUnavailable(_) => {
            ClassifiedError::new(CONNECTION_FAILURE, Severity::Fatal, message)
        }
        GatewayError::UnsupportedType { .. } => {
            ClassifiedError::new(DATATYPE_MISMATCH, Severity::Error, message)
        }
        GatewayError::RowConversion { .. } => {
            ClassifiedError::new(DATA_EXCEPTION, Severity::Error, message)
        }
        GatewayError::Config(_) | GatewayError::Internal(_) => {
            ClassifiedError::new(INTERNAL_ERROR, Severity::Fatal, message)
        }
    }
}

/// Convert into the error pgwire reports to the client
pub fn to_pg_error(err: GatewayError) -> PgWireError {
    PgWireError::UserError(Box::new(classify(&err).into_error_info()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_are_fatal() {
        let classified = classify(&GatewayError::InvalidCredentials("bad token".into()));
        assert_eq!(classified.sqlstate, "28P01");
        assert_eq!(classified.severity, Severity::Fatal);
        assert!(classified.user_message().contains("HINT:"));
    }

    #[test]
    fn test_rejected_tool_query() {
        let classified = classify(&GatewayError::ClientToolQueryRejected {
            command: "\\dt".into(),
            suggestion: "show tables;".into(),
        });
        assert_eq!(classified.sqlstate, "0A000");
        assert_eq!(classified.severity, Severity::Error);
        assert!(classified.message.contains("show tables;"));
    }

    #[test]
    fn test_upstream_errors() {
        let query = classify(&GatewayError::UpstreamQuery {
            status: 400,
            body: "syntax error".into(),
        });
        assert_eq!(query.sqlstate, "42000");
        assert_eq!(query.severity, Severity::Error);
        assert!(query.message.contains("syntax error"));

        let unavailable = classify(&GatewayError::UpstreamUnavailable("refused".into()));
        assert_eq!(unavailable.sqlstate, "08006");
        assert_eq!(unavailable.severity, Severity::Fatal);

        let protocol = classify(&GatewayError::UpstreamProtocol("truncated".into()));
        assert_eq!(protocol.sqlstate, "22000");
        assert_eq!(protocol.severity, Severity::Fatal);
    }

    #[test]
    fn test_conversion_errors() {
        let unsupported = classify(&GatewayError::unsupported("Float16").for_column("f"));
        assert_eq!(unsupported.sqlstate, "42804");

        let conversion = classify(&GatewayError::conversion("overflow").at(3, 1));
        assert_eq!(conversion.sqlstate, "22000");
        assert_eq!(conversion.severity, Severity::Error);
    }

    #[test]
    fn test_pg_error_is_user_error() {
        match to_pg_error(GatewayError::Internal("boom".into())) {
            PgWireError::UserError(info) => {
                let rendered = format!("{:?}", info);
                assert!(rendered.contains("XX000"));
                assert!(rendered.contains("FATAL"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
