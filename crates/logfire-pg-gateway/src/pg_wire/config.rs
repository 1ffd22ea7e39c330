//! PostgreSQL wire protocol configuration
//!
//! Values can be overridden via `LOGFIRE_PG_*` environment variables.

use tracing::info;

/// Version advertised in the `server_version` startup parameter
pub const DEFAULT_SERVER_VERSION: &str = "17.0";

/// PostgreSQL wire protocol configuration
#[derive(Debug, Clone)]
pub struct PgWireConfig {
    /// TCP keepalive idle time in seconds, 0 keeps the OS defaults
    pub tcp_keepalive_secs: u64,
    /// Value reported as `server_version`
    pub server_version: String,
}

impl Default for PgWireConfig {
    fn default() -> Self {
        Self {
            tcp_keepalive_secs: 10,
            server_version: DEFAULT_SERVER_VERSION.to_string(),
        }
    }
}

impl PgWireConfig {
    /// Defaults overridden by the environment
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            tcp_keepalive_secs: std::env::var("LOGFIRE_PG_TCP_KEEPALIVE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.tcp_keepalive_secs),
            server_version: std::env::var("LOGFIRE_PG_SERVER_VERSION")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.server_version),
        }
    }

    /// Log configuration on startup
    pub fn log_config(&self) {
        info!(
            "PgWireServer config: tcp_keepalive={}s, server_version={}",
            self.tcp_keepalive_secs, self.server_version
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PgWireConfig::default();
        assert_eq!(config.tcp_keepalive_secs, 10);
        assert_eq!(config.server_version, "17.0");
    }
}
