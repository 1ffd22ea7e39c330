//! Incremental Arrow IPC stream decoding
//!
//! The response body is fed chunk by chunk into an `arrow_ipc` stream decoder.
//! Only the batch currently being emitted is kept in memory, so large results
//! are never materialized.

use super::schema::ColumnSchema;
use super::value::{date_from_epoch_days, timestamp_from_epoch, Row, Value};
use super::{ResultSet, RowSource};
use arrow_array::cast::AsArray;
use arrow_array::types::{
    Date32Type, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type,
    TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
    TimestampSecondType, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use arrow_array::{Array, RecordBatch};
use arrow_buffer::Buffer;
use arrow_ipc::reader::StreamDecoder;
use arrow_schema::{DataType, TimeUnit};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use logfire_pg_common::{GatewayError, Result};

/// Body chunks as delivered by the HTTP client
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Rows decoded lazily from an Arrow IPC stream
pub struct ArrowRows {
    body: ByteStream,
    decoder: StreamDecoder,
    pending: Buffer,
    body_done: bool,
    batch: Option<RecordBatch>,
    batch_row: usize,
    rows_emitted: usize,
}

impl ArrowRows {
    /// Read the stream until its schema is known and wrap it in a result set
    pub async fn open(body: ByteStream) -> Result<ResultSet> {
        let mut rows = Self {
            body,
            decoder: StreamDecoder::new(),
            pending: Buffer::from_vec(Vec::<u8>::new()),
            body_done: false,
            batch: None,
            batch_row: 0,
            rows_emitted: 0,
        };

        // Decoding stops at the first batch, which is kept for the first next_row
        if rows.decoder.schema().is_none() {
            rows.batch = rows.next_batch().await?;
        }
        let schema = rows.decoder.schema().ok_or_else(|| {
            GatewayError::UpstreamProtocol("arrow stream ended before its schema".into())
        })?;

        let columns = schema
            .fields()
            .iter()
            .map(|field| ColumnSchema::from_arrow_field(field))
            .collect();

        Ok(ResultSet::new(columns, rows))
    }

    /// Decode the next record batch, pulling body chunks as needed
    async fn next_batch(&mut self) -> Result<Option<RecordBatch>> {
        loop {
            if !self.pending.is_empty() {
                let decoded = self
                    .decoder
                    .decode(&mut self.pending)
                    .map_err(GatewayError::protocol)?;
                match decoded {
                    Some(batch) => return Ok(Some(batch)),
                    None => continue,
                }
            }

            if self.body_done {
                return Ok(None);
            }

            match self.body.next().await {
                Some(chunk) => self.pending = Buffer::from(chunk?),
                None => {
                    self.body_done = true;
                    self.decoder.finish().map_err(GatewayError::protocol)?;
                }
            }
        }
    }
}

#[async_trait]
impl RowSource for ArrowRows {
    async fn next_row(&mut self) -> Result<Option<Row>> {
        loop {
            if let Some(batch) = &self.batch {
                if self.batch_row < batch.num_rows() {
                    let row_idx = self.rows_emitted;
                    let row = batch
                        .columns()
                        .iter()
                        .enumerate()
                        .map(|(col_idx, column)| {
                            arrow_value(column.as_ref(), self.batch_row)
                                .map_err(|e| e.at(row_idx, col_idx))
                        })
                        .collect::<Result<Row>>()?;
                    self.batch_row += 1;
                    self.rows_emitted += 1;
                    return Ok(Some(row));
                }
            }

            match self.next_batch().await? {
                Some(batch) => {
                    self.batch = Some(batch);
                    self.batch_row = 0;
                }
                None => {
                    self.batch = None;
                    return Ok(None);
                }
            }
        }
    }
}

/// Extract one cell of an Arrow array
pub fn arrow_value(array: &dyn Array, idx: usize) -> Result<Value> {
    if array.is_null(idx) {
        return Ok(Value::Null);
    }

    let value = match array.data_type() {
        DataType::Utf8 => Value::Text(array.as_string::<i32>().value(idx).to_string()),
        DataType::LargeUtf8 => Value::Text(array.as_string::<i64>().value(idx).to_string()),
        DataType::Utf8View => Value::Text(array.as_string_view().value(idx).to_string()),
        DataType::Boolean => Value::Bool(array.as_boolean().value(idx)),

        DataType::Int8 => Value::Int(array.as_primitive::<Int8Type>().value(idx).into()),
        DataType::Int16 => Value::Int(array.as_primitive::<Int16Type>().value(idx).into()),
        DataType::Int32 => Value::Int(array.as_primitive::<Int32Type>().value(idx).into()),
        DataType::Int64 => Value::Int(array.as_primitive::<Int64Type>().value(idx)),
        DataType::UInt8 => Value::UInt(array.as_primitive::<UInt8Type>().value(idx).into()),
        DataType::UInt16 => Value::UInt(array.as_primitive::<UInt16Type>().value(idx).into()),
        DataType::UInt32 => Value::UInt(array.as_primitive::<UInt32Type>().value(idx).into()),
        DataType::UInt64 => Value::UInt(array.as_primitive::<UInt64Type>().value(idx)),
        DataType::Float32 => Value::Float(array.as_primitive::<Float32Type>().value(idx).into()),
        DataType::Float64 => Value::Float(array.as_primitive::<Float64Type>().value(idx)),

        DataType::Date32 => {
            let days = array.as_primitive::<Date32Type>().value(idx);
            date_from_epoch_days(days)
                .map(Value::Date)
                .ok_or_else(|| GatewayError::conversion(format!("date out of range: {} days", days)))?
        }
        DataType::Timestamp(unit, _) => {
            let raw = match unit {
                TimeUnit::Second => array.as_primitive::<TimestampSecondType>().value(idx),
                TimeUnit::Millisecond => array.as_primitive::<TimestampMillisecondType>().value(idx),
                TimeUnit::Microsecond => array.as_primitive::<TimestampMicrosecondType>().value(idx),
                TimeUnit::Nanosecond => array.as_primitive::<TimestampNanosecondType>().value(idx),
            };
            timestamp_from_epoch(raw, *unit)
                .map(Value::Timestamp)
                .ok_or_else(|| GatewayError::conversion(format!("timestamp out of range: {}", raw)))?
        }

        DataType::List(_) => list_value(array.as_list::<i32>().value(idx).as_ref())?,
        DataType::LargeList(_) => list_value(array.as_list::<i64>().value(idx).as_ref())?,

        other => {
            return Err(GatewayError::conversion(format!(
                "unsupported arrow type {}",
                other
            )))
        }
    };

    Ok(value)
}

fn list_value(elements: &dyn Array) -> Result<Value> {
    (0..elements.len())
        .map(|i| arrow_value(elements, i))
        .collect::<Result<Vec<_>>>()
        .map(Value::List)
}
