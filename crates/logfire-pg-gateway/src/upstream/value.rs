//! Decoded upstream values
//!
//! Both decoders produce rows of [`Value`] so the wire layer only deals with a
//! single representation regardless of how the upstream encoded the result.

use super::schema::{ScalarKind, TypeDescriptor};
use arrow_schema::TimeUnit;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use logfire_pg_common::{GatewayError, Result};
use serde_json::Value as JsonValue;

/// Days between 0001-01-01 and 1970-01-01
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// One decoded cell
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Json(JsonValue),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    List(Vec<Value>),
}

/// One decoded row, positionally aligned with the result schema
pub type Row = Vec<Value>;

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Interpret a JSON cell according to its column's declared type
    pub fn from_json(data_type: &TypeDescriptor, value: &JsonValue) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }

        match data_type {
            TypeDescriptor::List(inner) => match value {
                JsonValue::Array(items) => items
                    .iter()
                    .map(|item| Value::from_json(inner, item))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::List),
                other => Err(mismatch("list", other)),
            },
            TypeDescriptor::Scalar(kind) => scalar_from_json(kind, value),
        }
    }
}

fn scalar_from_json(kind: &ScalarKind, value: &JsonValue) -> Result<Value> {
    match kind {
        ScalarKind::Utf8 | ScalarKind::Unsupported(_) => Ok(match value {
            JsonValue::String(s) => Value::Text(s.clone()),
            other => Value::Text(other.to_string()),
        }),
        ScalarKind::Json => Ok(Value::Json(value.clone())),
        ScalarKind::Boolean => match value {
            JsonValue::Bool(b) => Ok(Value::Bool(*b)),
            JsonValue::String(s) if s == "true" || s == "false" => Ok(Value::Bool(s == "true")),
            other => Err(mismatch("boolean", other)),
        },
        ScalarKind::Int32 | ScalarKind::Int64 => value
            .as_i64()
            .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
            .map(Value::Int)
            .ok_or_else(|| mismatch("integer", value)),
        ScalarKind::UInt16 | ScalarKind::UInt32 | ScalarKind::UInt64 => value
            .as_u64()
            .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
            .map(Value::UInt)
            .ok_or_else(|| mismatch("unsigned integer", value)),
        ScalarKind::Float64 => value
            .as_f64()
            .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
            .map(Value::Float)
            .ok_or_else(|| mismatch("float", value)),
        ScalarKind::Date32 => match value {
            JsonValue::String(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(Value::Date)
                .map_err(|e| GatewayError::conversion(format!("invalid date {:?}: {}", s, e))),
            JsonValue::Number(n) => n
                .as_i64()
                .and_then(|days| i32::try_from(days).ok())
                .and_then(date_from_epoch_days)
                .map(Value::Date)
                .ok_or_else(|| mismatch("date", value)),
            other => Err(mismatch("date", other)),
        },
        ScalarKind::Timestamp(unit, _) => match value {
            JsonValue::String(s) => parse_timestamp(s).map(Value::Timestamp),
            JsonValue::Number(n) => n
                .as_i64()
                .and_then(|raw| timestamp_from_epoch(raw, *unit))
                .map(Value::Timestamp)
                .ok_or_else(|| mismatch("timestamp", value)),
            other => Err(mismatch("timestamp", other)),
        },
    }
}

/// Date from days since the Unix epoch (Arrow `Date32`)
pub fn date_from_epoch_days(days: i32) -> Option<NaiveDate> {
    days.checked_add(EPOCH_DAYS_FROM_CE)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
}

/// Timestamp from an epoch offset in the given unit (Arrow `Timestamp`)
pub fn timestamp_from_epoch(raw: i64, unit: TimeUnit) -> Option<DateTime<Utc>> {
    match unit {
        TimeUnit::Second => DateTime::from_timestamp(raw, 0),
        TimeUnit::Millisecond => DateTime::from_timestamp_millis(raw),
        TimeUnit::Microsecond => DateTime::from_timestamp_micros(raw),
        TimeUnit::Nanosecond => Some(DateTime::from_timestamp_nanos(raw)),
    }
}

/// Parse a textual timestamp; values without an offset are taken as UTC
fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| GatewayError::conversion(format!("invalid timestamp {:?}", s)))
}

fn mismatch(expected: &str, value: &JsonValue) -> GatewayError {
    GatewayError::conversion(format!("expected {}, got {}", expected, value))
}
