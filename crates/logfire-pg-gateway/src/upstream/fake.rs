//! In-process executor for handler tests

use super::{ColumnSchema, QueryExecutor, ResultSet, Row, RowSource, ScalarKind, TypeDescriptor, Value};
use crate::auth::Credential;
use async_trait::async_trait;
use logfire_pg_common::Result;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Rows held in memory
#[derive(Debug, Default)]
pub struct BufferedRows {
    rows: VecDeque<Row>,
}

impl From<Vec<Row>> for BufferedRows {
    fn from(rows: Vec<Row>) -> Self {
        Self { rows: rows.into() }
    }
}

#[async_trait]
impl RowSource for BufferedRows {
    async fn next_row(&mut self) -> Result<Option<Row>> {
        Ok(self.rows.pop_front())
    }
}

impl ResultSet {
    /// Result whose rows are already in memory
    pub fn buffered(schema: Vec<ColumnSchema>, rows: Vec<Row>) -> Self {
        Self::new(schema, BufferedRows::from(rows))
    }
}

type Responder = dyn Fn(&str, &Credential) -> Result<ResultSet> + Send + Sync;

/// Answers every query through a closure and records what it was asked
pub struct FakeExecutor {
    calls: AtomicUsize,
    queries: Mutex<Vec<String>>,
    respond: Box<Responder>,
}

impl FakeExecutor {
    pub fn new(
        respond: impl Fn(&str, &Credential) -> Result<ResultSet> + Send + Sync + 'static,
    ) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        }
    }

    /// Executor answering every query with a single value column
    pub fn single_value(data_type: ScalarKind, value: Value) -> Self {
        Self::new(move |_, _| {
            Ok(ResultSet::buffered(
                vec![ColumnSchema::new("?column?", TypeDescriptor::Scalar(data_type.clone()), false)],
                vec![vec![value.clone()]],
            ))
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryExecutor for FakeExecutor {
    async fn execute(&self, sql: &str, credential: &Credential) -> Result<ResultSet> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(sql.to_string());
        (self.respond)(sql, credential)
    }
}

/// Rows of a single Int64 column named `n`
pub fn int64_result(values: &[i64]) -> ResultSet {
    let rows: Vec<Row> = values.iter().map(|v| vec![Value::Int(*v)]).collect();
    ResultSet::buffered(
        vec![ColumnSchema::new("n", TypeDescriptor::Scalar(ScalarKind::Int64), false)],
        rows,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_buffered_rows_in_order() {
        let schema = vec![ColumnSchema::new("n", TypeDescriptor::Scalar(ScalarKind::Int64), false)];
        let mut result = ResultSet::buffered(schema, vec![vec![Value::Int(1)], vec![Value::Int(2)]]);

        assert_eq!(result.next_row().await.unwrap(), Some(vec![Value::Int(1)]));
        assert_eq!(result.next_row().await.unwrap(), Some(vec![Value::Int(2)]));
        assert_eq!(result.next_row().await.unwrap(), None);
    }
}
