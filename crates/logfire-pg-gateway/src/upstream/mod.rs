//! Upstream query API
//!
//! The gateway forwards every query to the Logfire HTTP query endpoint. The
//! endpoint answers with either an Arrow IPC stream or a column-oriented JSON
//! document; both are exposed through [`ResultSet`] so the wire layer does not
//! care which one came back.

mod arrow_stream;
mod client;
mod json;
mod schema;
mod value;

#[cfg(test)]
pub mod fake;

pub use client::UpstreamClient;
pub use schema::{ColumnSchema, ScalarKind, TypeDescriptor};
pub use value::{Row, Value};

use crate::auth::Credential;
use async_trait::async_trait;
use logfire_pg_common::Result;

/// Forward-only source of decoded rows
#[async_trait]
pub trait RowSource: Send {
    /// Next row, or `None` once the result is exhausted
    async fn next_row(&mut self) -> Result<Option<Row>>;
}

/// Schema plus rows of one upstream answer
pub struct ResultSet {
    pub schema: Vec<ColumnSchema>,
    pub rows: Box<dyn RowSource>,
}

impl ResultSet {
    pub fn new(schema: Vec<ColumnSchema>, rows: impl RowSource + 'static) -> Self {
        Self {
            schema,
            rows: Box::new(rows),
        }
    }

    pub async fn next_row(&mut self) -> Result<Option<Row>> {
        self.rows.next_row().await
    }
}

impl std::fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSet")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// Executes SQL against the upstream on behalf of one credential
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, sql: &str, credential: &Credential) -> Result<ResultSet>;
}
