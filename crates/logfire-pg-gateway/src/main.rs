//! logfire-pg gateway
//!
//! Serves the Logfire query API over the PostgreSQL wire protocol, so psql and
//! other PostgreSQL clients can query Logfire with a read token as password.

mod auth;
mod errors;
mod pg_wire;
mod telemetry;
mod upstream;

use crate::pg_wire::{PgWireConfig, PgWireServer};
use crate::upstream::UpstreamClient;
use clap::Parser;
use logfire_pg_common::config::DEFAULT_BASE_URL;
use logfire_pg_common::{GatewayConfig, ServerConfig, Transport, UpstreamConfig};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "logfire_pg", version)]
#[command(about = "PostgreSQL wire protocol gateway for the Logfire query API")]
struct Args {
    /// Host to listen on
    #[arg(long, env = "LOGFIRE_PG_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(long, env = "LOGFIRE_PG_PORT", default_value = "5432")]
    port: u16,

    /// Base URL of the Logfire API
    #[arg(long, env = "LOGFIRE_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Preferred upstream response encoding (arrow or json)
    #[arg(long, env = "LOGFIRE_PG_TRANSPORT", default_value = "arrow")]
    transport: Transport,

    /// Timeout for a whole upstream request in seconds
    #[arg(long, env = "LOGFIRE_PG_REQUEST_TIMEOUT_SECS")]
    request_timeout_secs: Option<u64>,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            server: ServerConfig {
                host: self.host.clone(),
                port: self.port,
            },
            upstream: UpstreamConfig {
                base_url: self.base_url.clone(),
                transport: self.transport,
                request_timeout_secs: self.request_timeout_secs,
                ..Default::default()
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    telemetry::init(&args.log_level)?;

    let config = args.gateway_config();
    info!("Starting logfire-pg gateway");
    info!("  Listen address: {}", config.server.listen_addr());
    info!("  Query endpoint: {}", config.upstream.query_url());
    info!("  Transport: {}", config.upstream.transport);

    let executor = Arc::new(UpstreamClient::new(config.upstream.clone())?);
    let server = PgWireServer::new(config.server.listen_addr(), PgWireConfig::from_env(), executor);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down logfire-pg gateway");
        }
        result = server.start() => {
            if let Err(e) = &result {
                error!("PostgreSQL server stopped: {:#}", e);
            }
            result?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["logfire_pg"]).unwrap();
        let config = args.gateway_config();
        assert_eq!(config.server.listen_addr(), "127.0.0.1:5432");
        assert_eq!(config.upstream.query_url(), "https://logfire-us.pydantic.dev/v1/query");
        assert_eq!(config.upstream.transport, Transport::Arrow);
        assert_eq!(config.upstream.request_timeout_secs, None);
    }

    #[test]
    fn test_flags() {
        let args = Args::try_parse_from([
            "logfire_pg",
            "--host",
            "0.0.0.0",
            "--port",
            "6543",
            "--base-url",
            "http://localhost:8000",
            "--transport",
            "json",
            "--request-timeout-secs",
            "30",
        ])
        .unwrap();
        let config = args.gateway_config();
        assert_eq!(config.server.listen_addr(), "0.0.0.0:6543");
        assert_eq!(config.upstream.query_url(), "http://localhost:8000/v1/query");
        assert_eq!(config.upstream.transport, Transport::Json);
        assert_eq!(config.upstream.request_timeout_secs, Some(30));
    }

    #[test]
    fn test_bad_transport_rejected() {
        assert!(Args::try_parse_from(["logfire_pg", "--transport", "csv"]).is_err());
    }
}
