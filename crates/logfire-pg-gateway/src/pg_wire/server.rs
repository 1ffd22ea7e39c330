//! PostgreSQL listener
//!
//! Accepts TCP connections and hands each one to pgwire with a fresh
//! [`Session`] shared by that connection's startup and query handlers.

use super::auth::{LogfireParameterProvider, LogfireStartupHandler};
use super::config::PgWireConfig;
use super::connection::configure_client_socket;
use super::session::LogfireQueryHandler;
use crate::auth::{AuthGateway, Session};
use crate::upstream::QueryExecutor;
use pgwire::api::copy::NoopCopyHandler;
use pgwire::api::query::PlaceholderExtendedQueryHandler;
use pgwire::api::{NoopErrorHandler, PgWireServerHandlers};
use pgwire::tokio::process_socket;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Handlers for one connection
struct LogfireHandlers {
    startup: Arc<LogfireStartupHandler>,
    query: Arc<LogfireQueryHandler>,
}

impl PgWireServerHandlers for LogfireHandlers {
    type StartupHandler = LogfireStartupHandler;
    type SimpleQueryHandler = LogfireQueryHandler;
    type ExtendedQueryHandler = PlaceholderExtendedQueryHandler;
    type CopyHandler = NoopCopyHandler;
    type ErrorHandler = NoopErrorHandler;

    fn simple_query_handler(&self) -> Arc<Self::SimpleQueryHandler> {
        self.query.clone()
    }

    fn extended_query_handler(&self) -> Arc<Self::ExtendedQueryHandler> {
        Arc::new(PlaceholderExtendedQueryHandler)
    }

    fn startup_handler(&self) -> Arc<Self::StartupHandler> {
        self.startup.clone()
    }

    fn copy_handler(&self) -> Arc<Self::CopyHandler> {
        Arc::new(NoopCopyHandler)
    }

    fn error_handler(&self) -> Arc<Self::ErrorHandler> {
        Arc::new(NoopErrorHandler)
    }
}

/// PostgreSQL front end of the gateway
#[derive(Clone)]
pub struct PgWireServer {
    addr: String,
    config: PgWireConfig,
    executor: Arc<dyn QueryExecutor>,
    gateway: Arc<AuthGateway>,
    parameters: Arc<LogfireParameterProvider>,
}

impl PgWireServer {
    pub fn new(addr: impl Into<String>, config: PgWireConfig, executor: Arc<dyn QueryExecutor>) -> Self {
        let parameters = Arc::new(LogfireParameterProvider::new(config.server_version.clone()));
        Self {
            addr: addr.into(),
            gateway: Arc::new(AuthGateway::new(executor.clone())),
            config,
            executor,
            parameters,
        }
    }

    pub async fn start(self) -> anyhow::Result<()> {
        self.config.log_config();
        let listener = TcpListener::bind(&self.addr).await?;
        info!("Starting PostgreSQL wire protocol server on {}", listener.local_addr()?);
        self.serve(listener).await
    }

    /// Accept loop on an already bound listener
    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        loop {
            let (socket, peer_addr) = listener.accept().await?;
            info!("New PostgreSQL connection from {}", peer_addr);

            configure_client_socket(&socket, peer_addr, self.config.tcp_keepalive_secs);

            let session = Arc::new(Session::new(peer_addr));
            let handlers = Arc::new(LogfireHandlers {
                startup: Arc::new(LogfireStartupHandler::new(
                    self.gateway.clone(),
                    session.clone(),
                    self.parameters.clone(),
                )),
                query: Arc::new(LogfireQueryHandler::new(self.executor.clone(), session.clone())),
            });

            tokio::spawn(async move {
                match process_socket(socket, None, handlers).await {
                    Ok(()) => info!(
                        peer = %peer_addr,
                        user = session.user().unwrap_or("-"),
                        "PostgreSQL connection closed"
                    ),
                    Err(e) => {
                        let err_str = e.to_string();
                        if err_str.contains("early eof") || err_str.contains("connection reset") {
                            debug!("Client disconnected: {}", err_str);
                        } else {
                            error!("Error handling PostgreSQL connection from {}: {}", peer_addr, e);
                        }
                    }
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::gateway::PROBE_QUERY;
    use crate::upstream::fake::{int64_result, FakeExecutor};
    use logfire_pg_common::GatewayError;
    use tokio_postgres::{NoTls, SimpleQueryMessage};

    const TOKEN: &str = "pylf_v1_us_test";

    /// Fake upstream: accepts TOKEN, fails queries starting with `SELEC `
    fn upstream() -> Arc<FakeExecutor> {
        Arc::new(FakeExecutor::new(|sql, credential| {
            if credential.token() != TOKEN {
                return Err(GatewayError::UpstreamQuery {
                    status: 401,
                    body: "invalid token".into(),
                });
            }
            match sql {
                PROBE_QUERY => Ok(int64_result(&[1])),
                s if s.starts_with("SELEC ") => Err(GatewayError::UpstreamQuery {
                    status: 400,
                    body: "syntax error".into(),
                }),
                _ => Ok(int64_result(&[1, 2, 3])),
            }
        }))
    }

    async fn spawn_server(executor: Arc<FakeExecutor>) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = PgWireServer::new("127.0.0.1:0", PgWireConfig::default(), executor);
        tokio::spawn(server.serve(listener));
        port
    }

    async fn connect(port: u16, user: &str, password: &str) -> Result<tokio_postgres::Client, tokio_postgres::Error> {
        let conn_str = format!("host=127.0.0.1 port={} user={} password={}", port, user, password);
        let (client, connection) = tokio_postgres::connect(&conn_str, NoTls).await?;
        tokio::spawn(connection);
        Ok(client)
    }

    fn rows_and_tag(messages: &[SimpleQueryMessage]) -> (Vec<String>, Option<u64>) {
        let mut rows = Vec::new();
        let mut tag = None;
        for message in messages {
            match message {
                SimpleQueryMessage::Row(row) => rows.push(row.get(0).unwrap_or("NULL").to_string()),
                SimpleQueryMessage::CommandComplete(n) => tag = Some(*n),
                _ => {}
            }
        }
        (rows, tag)
    }

    #[tokio::test]
    async fn test_query_round_trip() {
        let executor = upstream();
        let port = spawn_server(executor.clone()).await;

        let client = connect(port, "alice", TOKEN).await.unwrap();
        let messages = client.simple_query("SELECT n FROM records").await.unwrap();

        let (rows, tag) = rows_and_tag(&messages);
        assert_eq!(rows, vec!["1", "2", "3"]);
        assert_eq!(tag, Some(3));
        assert_eq!(
            executor.queries(),
            vec![PROBE_QUERY.to_string(), "SELECT n FROM records".to_string()]
        );
    }

    #[tokio::test]
    async fn test_invalid_token_refused() {
        let port = spawn_server(upstream()).await;

        let err = connect(port, "alice", "wrong").await.err().expect("connection should fail");
        let db_error = err.as_db_error().expect("server error response");
        assert_eq!(db_error.code().code(), "28P01");
    }

    #[tokio::test]
    async fn test_psql_command_rejected() {
        let executor = upstream();
        let port = spawn_server(executor.clone()).await;
        let client = connect(port, "alice", TOKEN).await.unwrap();

        let describe = "SELECT c.oid,\n  n.nspname,\n  c.relname\nFROM pg_catalog.pg_class c\n     LEFT JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace\nWHERE c.relname OPERATOR(pg_catalog.~) '^(records)$' COLLATE pg_catalog.default\n  AND pg_catalog.pg_table_is_visible(c.oid)\nORDER BY 2, 3;";
        let err = client.simple_query(describe).await.err().expect("query should fail");
        let db_error = err.as_db_error().expect("server error response");
        assert_eq!(db_error.code().code(), "0A000");
        assert!(db_error.message().contains("show columns from records;"));

        // Only the authentication probe reached the upstream
        assert_eq!(executor.calls(), 1);
    }

    #[tokio::test]
    async fn test_upstream_error_then_next_query() {
        let port = spawn_server(upstream()).await;
        let client = connect(port, "alice", TOKEN).await.unwrap();

        let err = client.simple_query("SELEC 1").await.err().expect("query should fail");
        let db_error = err.as_db_error().expect("server error response");
        assert_eq!(db_error.code().code(), "42000");
        assert!(db_error.message().contains("syntax error"));

        let messages = client.simple_query("SELECT n FROM records").await.unwrap();
        assert_eq!(rows_and_tag(&messages).1, Some(3));
    }
}
