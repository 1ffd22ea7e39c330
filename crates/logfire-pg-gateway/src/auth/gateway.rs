//! Authentication Gateway
//!
//! Validates a connection password by using it as the bearer token of a
//! `SELECT 1` probe against the upstream.

use super::Credential;
use crate::upstream::{QueryExecutor, ResultSet, Value};
use logfire_pg_common::{GatewayError, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Query used to prove a token is accepted upstream
pub const PROBE_QUERY: &str = "SELECT 1";

/// Checks connection credentials against the upstream
pub struct AuthGateway {
    executor: Arc<dyn QueryExecutor>,
}

impl AuthGateway {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }

    /// Validate `password` as an upstream token for `username`
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Credential> {
        let start = Instant::now();

        if username.is_empty() {
            warn!("Authentication rejected: empty username");
            return Err(GatewayError::InvalidCredentials("username is required".into()));
        }

        let credential = Credential::new(password);
        let outcome = match self.executor.execute(PROBE_QUERY, &credential).await {
            Ok(result) => check_probe(result).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                info!(
                    user = %username,
                    latency_ms = start.elapsed().as_millis() as u64,
                    "Authentication successful"
                );
                Ok(credential)
            }
            Err(GatewayError::UpstreamUnavailable(reason)) => {
                warn!(user = %username, reason = %reason, "Authentication failed: upstream unavailable");
                Err(GatewayError::UpstreamUnavailable(reason))
            }
            Err(e @ GatewayError::InvalidCredentials(_)) => {
                warn!(user = %username, error = %e, "Authentication failed");
                Err(e)
            }
            Err(e) => {
                warn!(user = %username, code = e.code(), error = %e, "Authentication failed");
                Err(GatewayError::InvalidCredentials(e.to_string()))
            }
        }
    }
}

/// One column, one row, value equal to 1
async fn check_probe(mut result: ResultSet) -> Result<()> {
    if result.schema.len() != 1 {
        return Err(GatewayError::InvalidCredentials(format!(
            "probe returned {} columns",
            result.schema.len()
        )));
    }

    let Some(row) = result.next_row().await? else {
        return Err(GatewayError::InvalidCredentials("probe returned no rows".into()));
    };
    if result.next_row().await?.is_some() {
        return Err(GatewayError::InvalidCredentials("probe returned more than one row".into()));
    }

    debug!(value = ?row.first(), "Probe answered");
    match row.first() {
        Some(value) if is_one(value) => Ok(()),
        Some(value) => Err(GatewayError::InvalidCredentials(format!(
            "probe returned {:?}",
            value
        ))),
        None => Err(GatewayError::InvalidCredentials("probe row is empty".into())),
    }
}

fn is_one(value: &Value) -> bool {
    match value {
        Value::Int(v) => *v == 1,
        Value::UInt(v) => *v == 1,
        Value::Float(v) => *v == 1.0,
        Value::Text(s) => s.trim().parse::<f64>().is_ok_and(|v| v == 1.0),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::fake::{int64_result, FakeExecutor};
    use crate::upstream::{ColumnSchema, ScalarKind, TypeDescriptor};

    fn build(executor: FakeExecutor) -> (AuthGateway, Arc<FakeExecutor>) {
        let executor = Arc::new(executor);
        (AuthGateway::new(executor.clone()), executor)
    }

    #[tokio::test]
    async fn test_empty_username_skips_upstream() {
        let (gateway, executor) = build(FakeExecutor::new(|_, _| Ok(int64_result(&[1]))));

        let err = gateway.authenticate("", "token").await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidCredentials(_)));
        assert_eq!(executor.calls(), 0);
    }

    #[tokio::test]
    async fn test_probe_accepts_one() {
        let (gateway, executor) = build(FakeExecutor::new(|_, _| Ok(int64_result(&[1]))));

        let credential = gateway.authenticate("alice", "token").await.unwrap();
        assert_eq!(credential.token(), "token");
        assert_eq!(executor.queries(), vec![PROBE_QUERY.to_string()]);
    }

    #[tokio::test]
    async fn test_probe_float_values() {
        let (gateway, _) = build(FakeExecutor::single_value(ScalarKind::Float64, Value::Float(1.0)));
        assert!(gateway.authenticate("alice", "token").await.is_ok());

        let (gateway, _) = build(FakeExecutor::single_value(ScalarKind::Float64, Value::Float(2.0)));
        let err = gateway.authenticate("alice", "token").await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidCredentials(_)));
    }

    #[tokio::test]
    async fn test_probe_numeric_text() {
        let (gateway, _) = build(FakeExecutor::single_value(ScalarKind::Utf8, Value::Text("1".into())));
        assert!(gateway.authenticate("alice", "token").await.is_ok());
    }

    #[tokio::test]
    async fn test_probe_shape_mismatch() {
        let (gateway, _) = build(FakeExecutor::new(|_, _| Ok(int64_result(&[1, 1]))));
        assert!(matches!(
            gateway.authenticate("alice", "token").await,
            Err(GatewayError::InvalidCredentials(_))
        ));

        let (gateway, _) = build(FakeExecutor::new(|_, _| Ok(int64_result(&[]))));
        assert!(matches!(
            gateway.authenticate("alice", "token").await,
            Err(GatewayError::InvalidCredentials(_))
        ));

        let (gateway, _) = build(FakeExecutor::new(|_, _| {
            let column = |name| ColumnSchema::new(name, TypeDescriptor::Scalar(ScalarKind::Int64), false);
            Ok(ResultSet::buffered(
                vec![column("a"), column("b")],
                vec![vec![Value::Int(1), Value::Int(1)]],
            ))
        }));
        assert!(matches!(
            gateway.authenticate("alice", "token").await,
            Err(GatewayError::InvalidCredentials(_))
        ));
    }

    #[tokio::test]
    async fn test_upstream_errors() {
        let (gateway, _) = build(FakeExecutor::new(|_, _| {
            Err(GatewayError::UpstreamQuery {
                status: 401,
                body: "invalid token".into(),
            })
        }));
        assert!(matches!(
            gateway.authenticate("alice", "bad").await,
            Err(GatewayError::InvalidCredentials(_))
        ));

        let (gateway, _) = build(FakeExecutor::new(|_, _| {
            Err(GatewayError::UpstreamUnavailable("connection refused".into()))
        }));
        assert!(matches!(
            gateway.authenticate("alice", "token").await,
            Err(GatewayError::UpstreamUnavailable(_))
        ));
    }
}
