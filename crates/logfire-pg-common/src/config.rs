//! Configuration for the logfire-pg gateway
//!
//! Built once at startup and shared read-only by every connection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default upstream API host
pub const DEFAULT_BASE_URL: &str = "https://logfire-us.pydantic.dev";

/// Path of the query endpoint relative to the base URL
pub const QUERY_PATH: &str = "/v1/query";

/// Gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// PostgreSQL listener settings
    pub server: ServerConfig,
    /// Upstream query API settings
    pub upstream: UpstreamConfig,
}

/// PostgreSQL listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to listen on
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5432,
        }
    }
}

impl ServerConfig {
    /// Listen address as `host:port`
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Preferred upstream response encoding, sent as the `Accept` header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// Arrow IPC stream (`application/vnd.apache.arrow.stream`)
    #[default]
    Arrow,
    /// Column-oriented JSON document
    Json,
}

impl Transport {
    pub fn accept_header(&self) -> &'static str {
        match self {
            Transport::Arrow => "application/vnd.apache.arrow.stream",
            Transport::Json => "application/json",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Arrow => write!(f, "arrow"),
            Transport::Json => write!(f, "json"),
        }
    }
}

impl FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "arrow" => Ok(Transport::Arrow),
            "json" => Ok(Transport::Json),
            other => Err(format!("unknown transport '{}' (expected arrow or json)", other)),
        }
    }
}

/// Upstream query API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the API, without trailing slash
    pub base_url: String,
    /// Preferred response encoding
    pub transport: Transport,
    /// TCP connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds (None = no timeout)
    pub request_timeout_secs: Option<u64>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            transport: Transport::default(),
            connect_timeout_secs: 30,
            request_timeout_secs: None,
        }
    }
}

impl UpstreamConfig {
    /// Full URL of the query endpoint
    pub fn query_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), QUERY_PATH)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_url() {
        let config = UpstreamConfig::default();
        assert_eq!(config.query_url(), "https://logfire-us.pydantic.dev/v1/query");

        let config = UpstreamConfig {
            base_url: "http://127.0.0.1:8080/".into(),
            ..Default::default()
        };
        assert_eq!(config.query_url(), "http://127.0.0.1:8080/v1/query");
    }

    #[test]
    fn test_transport_parsing() {
        assert_eq!("arrow".parse::<Transport>().unwrap(), Transport::Arrow);
        assert_eq!("JSON".parse::<Transport>().unwrap(), Transport::Json);
        assert!("csv".parse::<Transport>().is_err());
        assert_eq!(Transport::Json.accept_header(), "application/json");
    }

    #[test]
    fn test_server_defaults() {
        let server = ServerConfig::default();
        assert_eq!(server.listen_addr(), "127.0.0.1:5432");
    }
}
