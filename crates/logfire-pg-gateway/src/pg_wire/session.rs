//! Per-query coordination
//!
//! ```text
//! query ─► empty? ─► psql meta-command? ─► credential ─► upstream
//!                                                          │
//!                          SELECT n ◄─ DataRows ◄─ map_type/map_value
//! ```

use super::protocol::{map_type, map_value, WireValue};
use super::query::detect_psql_command;
use crate::auth::Session;
use crate::errors::to_pg_error;
use crate::upstream::{QueryExecutor, ResultSet};
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::{Sink, StreamExt};
use logfire_pg_common::{GatewayError, Result};
use pgwire::api::query::SimpleQueryHandler;
use pgwire::api::results::{DataRowEncoder, FieldFormat, FieldInfo, QueryResponse, Response};
use pgwire::api::{ClientInfo, Type};
use pgwire::error::{PgWireError, PgWireResult};
use pgwire::messages::data::DataRow;
use pgwire::messages::PgWireBackendMessage;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// What a query turned into before any row is sent
pub enum QueryOutcome {
    Empty,
    Rows(PreparedResult),
}

/// Runs queries for one connection
pub struct QueryCoordinator {
    executor: Arc<dyn QueryExecutor>,
    session: Arc<Session>,
}

impl QueryCoordinator {
    pub fn new(executor: Arc<dyn QueryExecutor>, session: Arc<Session>) -> Self {
        Self { executor, session }
    }

    /// Intercept, execute and map the schema of one query
    pub async fn prepare(&self, sql: &str) -> Result<QueryOutcome> {
        if sql.trim().is_empty() {
            return Ok(QueryOutcome::Empty);
        }

        info!(peer = %self.session.peer(), query = %sql, "Query received");

        if let Some(detected) = detect_psql_command(sql) {
            return Err(GatewayError::ClientToolQueryRejected {
                command: detected.command,
                suggestion: detected.suggestion,
            });
        }

        let credential = self.session.credential().inspect_err(|e| {
            error!(peer = %self.session.peer(), error = %e, "Query on unauthenticated session");
        })?;

        let started = Instant::now();
        let result = self.executor.execute(sql, credential).await.inspect_err(|e| {
            warn!(peer = %self.session.peer(), code = e.code(), error = %e, "Upstream query failed");
        })?;

        PreparedResult::new(result, started).map(QueryOutcome::Rows)
    }
}

/// Result whose schema has been mapped and whose rows are ready to stream
pub struct PreparedResult {
    fields: Arc<Vec<FieldInfo>>,
    types: Vec<Type>,
    result: ResultSet,
    rows_sent: usize,
    started: Instant,
}

impl PreparedResult {
    /// Fails on the first column without a PostgreSQL type
    fn new(result: ResultSet, started: Instant) -> Result<Self> {
        let types = result
            .schema
            .iter()
            .map(|column| map_type(&column.data_type).map_err(|e| e.for_column(&column.name)))
            .collect::<Result<Vec<_>>>()?;

        let fields = result
            .schema
            .iter()
            .zip(&types)
            .map(|(column, ty)| {
                FieldInfo::new(column.name.clone(), None, None, ty.clone(), FieldFormat::Text)
            })
            .collect();

        debug!(columns = types.len(), "Schema mapped");

        Ok(Self {
            fields: Arc::new(fields),
            types,
            result,
            rows_sent: 0,
            started,
        })
    }

    pub fn fields(&self) -> Arc<Vec<FieldInfo>> {
        self.fields.clone()
    }

    pub fn rows_sent(&self) -> usize {
        self.rows_sent
    }

    pub fn completion_tag(&self) -> String {
        format!("SELECT {}", self.rows_sent)
    }

    /// Next row converted for the wire
    pub async fn next_row(&mut self) -> Result<Option<Vec<WireValue>>> {
        let Some(row) = self.result.next_row().await? else {
            return Ok(None);
        };

        if row.len() != self.types.len() {
            return Err(GatewayError::UpstreamProtocol(format!(
                "row {} has {} values, expected {}",
                self.rows_sent,
                row.len(),
                self.types.len()
            )));
        }

        let row_idx = self.rows_sent;
        let wire = row
            .into_iter()
            .zip(&self.types)
            .enumerate()
            .map(|(col_idx, (value, ty))| map_value(ty, value).map_err(|e| e.at(row_idx, col_idx)))
            .collect::<Result<Vec<_>>>()?;

        self.rows_sent += 1;
        Ok(Some(wire))
    }

    /// Encoded DataRows; the stream ends after the first error
    pub fn into_data_rows(self) -> BoxStream<'static, PgWireResult<DataRow>> {
        stream::unfold(Some(self), |state| async move {
            let mut prepared = state?;
            match prepared.next_row().await {
                Ok(Some(values)) => {
                    let row = encode_row(&prepared.fields, &values);
                    Some((row, Some(prepared)))
                }
                Ok(None) => {
                    info!(
                        tag = %prepared.completion_tag(),
                        elapsed_ms = prepared.started.elapsed().as_millis() as u64,
                        "Query completed"
                    );
                    None
                }
                Err(e) => {
                    warn!(
                        rows_sent = prepared.rows_sent(),
                        code = e.code(),
                        error = %e,
                        "Row streaming aborted"
                    );
                    Some((Err(to_pg_error(e)), None))
                }
            }
        })
        .boxed()
    }
}

fn encode_row(fields: &Arc<Vec<FieldInfo>>, values: &[WireValue]) -> PgWireResult<DataRow> {
    let mut encoder = DataRowEncoder::new(fields.clone());
    for value in values {
        value.encode(&mut encoder)?;
    }
    encoder.finish()
}

/// pgwire simple query handler backed by a [`QueryCoordinator`]
pub struct LogfireQueryHandler {
    coordinator: QueryCoordinator,
}

impl LogfireQueryHandler {
    pub fn new(executor: Arc<dyn QueryExecutor>, session: Arc<Session>) -> Self {
        Self {
            coordinator: QueryCoordinator::new(executor, session),
        }
    }
}

#[async_trait]
impl SimpleQueryHandler for LogfireQueryHandler {
    async fn do_query<'a, C>(&self, _client: &mut C, query: &'a str) -> PgWireResult<Vec<Response<'a>>>
    where
        C: ClientInfo + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: std::fmt::Debug,
        PgWireError: From<<C as Sink<PgWireBackendMessage>>::Error>,
    {
        match self.coordinator.prepare(query).await.map_err(to_pg_error)? {
            QueryOutcome::Empty => Ok(vec![Response::EmptyQuery]),
            QueryOutcome::Rows(prepared) => {
                let fields = prepared.fields();
                Ok(vec![Response::Query(QueryResponse::new(
                    fields,
                    prepared.into_data_rows(),
                ))])
            }
        }
    }
}
