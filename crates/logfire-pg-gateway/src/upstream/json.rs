//! Column-oriented JSON result decoding

use super::schema::{ColumnSchema, TypeDescriptor};
use super::value::{Row, Value};
use super::{ResultSet, RowSource};
use async_trait::async_trait;
use logfire_pg_common::{GatewayError, Result};
use serde::Deserialize;
use serde_json::Value as JsonValue;

/// Whole JSON answer of the query endpoint
#[derive(Debug, Deserialize)]
pub struct JsonDocument {
    pub columns: Vec<JsonColumn>,
}

/// One column with all of its values
#[derive(Debug, Deserialize)]
pub struct JsonColumn {
    pub name: String,
    pub datatype: JsonValue,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub values: Vec<JsonValue>,
}

fn default_nullable() -> bool {
    true
}

impl JsonDocument {
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(body)?)
    }

    /// Validate column lengths and expose the document as a result set
    pub fn into_result_set(self) -> Result<ResultSet> {
        let row_count = self.columns.first().map_or(0, |c| c.values.len());
        if let Some(bad) = self.columns.iter().find(|c| c.values.len() != row_count) {
            return Err(GatewayError::UpstreamProtocol(format!(
                "column {} has {} values, expected {}",
                bad.name,
                bad.values.len(),
                row_count
            )));
        }

        let schema: Vec<ColumnSchema> = self
            .columns
            .iter()
            .map(|c| ColumnSchema::new(c.name.clone(), TypeDescriptor::from_json(&c.datatype), c.nullable))
            .collect();

        let rows = JsonRows {
            types: schema.iter().map(|c| c.data_type.clone()).collect(),
            values: self.columns.into_iter().map(|c| c.values).collect(),
            row_count,
            next: 0,
        };

        Ok(ResultSet::new(schema, rows))
    }
}

/// Transposes the decoded columns one row at a time
struct JsonRows {
    types: Vec<TypeDescriptor>,
    values: Vec<Vec<JsonValue>>,
    row_count: usize,
    next: usize,
}

#[async_trait]
impl RowSource for JsonRows {
    async fn next_row(&mut self) -> Result<Option<Row>> {
        if self.next >= self.row_count {
            return Ok(None);
        }
        let row_idx = self.next;
        self.next += 1;

        let row = self
            .types
            .iter()
            .zip(&mut self.values)
            .enumerate()
            .map(|(col_idx, (data_type, column))| {
                let cell = std::mem::take(&mut column[row_idx]);
                Value::from_json(data_type, &cell).map_err(|e| e.at(row_idx, col_idx))
            })
            .collect::<Result<Row>>()?;

        Ok(Some(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::ScalarKind;
    use serde_json::json;

    fn document(value: JsonValue) -> JsonDocument {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_int64_rows() {
        let doc = document(json!({
            "columns": [
                {"name": "n", "datatype": "Int64", "nullable": false, "values": [1, 2, 3]}
            ]
        }));
        let mut result = doc.into_result_set().unwrap();
        assert_eq!(result.schema[0].data_type, TypeDescriptor::Scalar(ScalarKind::Int64));
        assert!(!result.schema[0].nullable);

        let mut seen = Vec::new();
        while let Some(row) = result.next_row().await.unwrap() {
            seen.push(row);
        }
        assert_eq!(
            seen,
            vec![vec![Value::Int(1)], vec![Value::Int(2)], vec![Value::Int(3)]]
        );
    }

    #[tokio::test]
    async fn test_multi_column_transpose() {
        let doc = document(json!({
            "columns": [
                {"name": "id", "datatype": "Int32", "nullable": false, "values": [1, 2]},
                {"name": "tags", "datatype": {"List": {"name": "item", "data_type": "Utf8", "nullable": true}},
                 "nullable": true, "values": [["a"], null]}
            ]
        }));
        let mut result = doc.into_result_set().unwrap();
        assert_eq!(
            result.next_row().await.unwrap(),
            Some(vec![Value::Int(1), Value::List(vec![Value::Text("a".into())])])
        );
        assert_eq!(
            result.next_row().await.unwrap(),
            Some(vec![Value::Int(2), Value::Null])
        );
        assert_eq!(result.next_row().await.unwrap(), None);
    }

    #[test]
    fn test_unequal_columns_rejected() {
        let doc = document(json!({
            "columns": [
                {"name": "a", "datatype": "Int64", "values": [1, 2]},
                {"name": "b", "datatype": "Int64", "values": [1]}
            ]
        }));
        let err = doc.into_result_set().unwrap_err();
        assert!(matches!(err, GatewayError::UpstreamProtocol(_)));
    }

    #[tokio::test]
    async fn test_bad_value_reports_position() {
        let doc = document(json!({
            "columns": [
                {"name": "a", "datatype": "Int64", "values": [1, "x"]}
            ]
        }));
        let mut result = doc.into_result_set().unwrap();
        assert!(result.next_row().await.unwrap().is_some());
        match result.next_row().await.unwrap_err() {
            GatewayError::RowConversion { row, column, .. } => {
                assert_eq!(row, 1);
                assert_eq!(column, 0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_body() {
        let err = JsonDocument::from_slice(b"{not json").unwrap_err();
        assert!(matches!(err, GatewayError::UpstreamProtocol(_)));
    }
}
