//! Upstream type and value mapping
//!
//! Maps upstream column descriptors to PostgreSQL types and decoded values to
//! what goes into a text-format DataRow.
//!
//! | Upstream kind        | PostgreSQL type |
//! |----------------------|-----------------|
//! | Utf8                 | text            |
//! | Json                 | json            |
//! | Boolean              | bool            |
//! | Int32, UInt16        | int4            |
//! | Int64, UInt32/64     | int8            |
//! | Float64              | float8          |
//! | Date32               | date            |
//! | Timestamp            | timestamptz     |
//! | List(scalar)         | scalar's array  |

use crate::upstream::{ScalarKind, TypeDescriptor, Value};
use chrono::{DateTime, NaiveDate, Utc};
use logfire_pg_common::{GatewayError, Result};
use pgwire::api::results::DataRowEncoder;
use pgwire::api::Type;
use pgwire::error::PgWireResult;

/// Timestamp text form: UTC, microsecond precision
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Value ready to be written into a DataRow
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    Null,
    Bool(bool),
    Int4(i32),
    Int8(i64),
    Float8(f64),
    Text(String),
}

impl WireValue {
    pub fn encode(&self, encoder: &mut DataRowEncoder) -> PgWireResult<()> {
        match self {
            WireValue::Null => encoder.encode_field(&None::<String>),
            WireValue::Bool(v) => encoder.encode_field(v),
            WireValue::Int4(v) => encoder.encode_field(v),
            WireValue::Int8(v) => encoder.encode_field(v),
            WireValue::Float8(v) => encoder.encode_field(v),
            WireValue::Text(v) => encoder.encode_field(v),
        }
    }
}

/// PostgreSQL type for an upstream column
pub fn map_type(data_type: &TypeDescriptor) -> Result<Type> {
    match data_type {
        TypeDescriptor::Scalar(kind) => scalar_type(kind),
        TypeDescriptor::List(inner) => match inner.as_ref() {
            TypeDescriptor::Scalar(ScalarKind::Json) | TypeDescriptor::List(_) => {
                Err(GatewayError::unsupported(data_type))
            }
            TypeDescriptor::Scalar(kind) => {
                let element = scalar_type(kind).map_err(|_| GatewayError::unsupported(data_type))?;
                array_of(&element).ok_or_else(|| GatewayError::unsupported(data_type))
            }
        },
    }
}

fn scalar_type(kind: &ScalarKind) -> Result<Type> {
    let ty = match kind {
        ScalarKind::Utf8 => Type::TEXT,
        ScalarKind::Json => Type::JSON,
        ScalarKind::Boolean => Type::BOOL,
        ScalarKind::Int32 | ScalarKind::UInt16 => Type::INT4,
        ScalarKind::Int64 | ScalarKind::UInt32 | ScalarKind::UInt64 => Type::INT8,
        ScalarKind::Float64 => Type::FLOAT8,
        ScalarKind::Date32 => Type::DATE,
        ScalarKind::Timestamp(_, _) => Type::TIMESTAMPTZ,
        ScalarKind::Unsupported(name) => return Err(GatewayError::unsupported(name)),
    };
    Ok(ty)
}

/// Element type and array type pairs
fn array_types() -> [(Type, Type); 7] {
    [
        (Type::TEXT, Type::TEXT_ARRAY),
        (Type::BOOL, Type::BOOL_ARRAY),
        (Type::INT4, Type::INT4_ARRAY),
        (Type::INT8, Type::INT8_ARRAY),
        (Type::FLOAT8, Type::FLOAT8_ARRAY),
        (Type::DATE, Type::DATE_ARRAY),
        (Type::TIMESTAMPTZ, Type::TIMESTAMPTZ_ARRAY),
    ]
}

fn array_of(element: &Type) -> Option<Type> {
    array_types()
        .into_iter()
        .find(|(e, _)| e == element)
        .map(|(_, array)| array)
}

fn element_of(array: &Type) -> Option<Type> {
    array_types()
        .into_iter()
        .find(|(_, a)| a == array)
        .map(|(element, _)| element)
}

/// Convert a decoded value for a column of type `ty`
pub fn map_value(ty: &Type, value: Value) -> Result<WireValue> {
    if value.is_null() {
        return Ok(WireValue::Null);
    }

    if let Some(element) = element_of(ty) {
        return match value {
            Value::List(items) => array_literal(&element, items).map(WireValue::Text),
            other => Err(mismatch(ty, &other)),
        };
    }

    let wire = match (ty, value) {
        (t, Value::Bool(v)) if *t == Type::BOOL => WireValue::Bool(v),

        (t, Value::Int(v)) if *t == Type::INT4 => WireValue::Int4(
            i32::try_from(v).map_err(|_| out_of_range(v, t))?,
        ),
        (t, Value::UInt(v)) if *t == Type::INT4 => WireValue::Int4(
            i32::try_from(v).map_err(|_| out_of_range(v, t))?,
        ),
        (t, Value::Int(v)) if *t == Type::INT8 => WireValue::Int8(v),
        (t, Value::UInt(v)) if *t == Type::INT8 => WireValue::Int8(
            i64::try_from(v).map_err(|_| out_of_range(v, t))?,
        ),

        (t, Value::Float(v)) if *t == Type::FLOAT8 => WireValue::Float8(v),
        (t, Value::Int(v)) if *t == Type::FLOAT8 => WireValue::Float8(v as f64),
        (t, Value::UInt(v)) if *t == Type::FLOAT8 => WireValue::Float8(v as f64),

        (t, Value::Date(d)) if *t == Type::DATE => WireValue::Text(format_date(&d)),
        (t, Value::Timestamp(ts)) if *t == Type::TIMESTAMPTZ => {
            WireValue::Text(format_timestamp(&ts))
        }

        (t, Value::Json(v)) if *t == Type::JSON => WireValue::Text(v.to_string()),
        (t, Value::Text(s)) if *t == Type::JSON => WireValue::Text(s),

        (t, value) if *t == Type::TEXT => match value {
            Value::Text(s) => WireValue::Text(s),
            other => WireValue::Text(
                scalar_text(&other).ok_or_else(|| mismatch(t, &other))?,
            ),
        },

        (t, other) => return Err(mismatch(t, &other)),
    };

    Ok(wire)
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Render a list as a PostgreSQL array literal such as `{1,2,NULL}`
fn array_literal(element: &Type, items: Vec<Value>) -> Result<String> {
    let mut out = String::from("{");
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        match map_value(element, item)? {
            WireValue::Null => out.push_str("NULL"),
            WireValue::Bool(b) => out.push(if b { 't' } else { 'f' }),
            WireValue::Int4(v) => out.push_str(&v.to_string()),
            WireValue::Int8(v) => out.push_str(&v.to_string()),
            WireValue::Float8(v) => out.push_str(&format_float(v)),
            WireValue::Text(s) if *element == Type::TEXT => push_quoted(&mut out, &s),
            WireValue::Text(s) => out.push_str(&s),
        }
    }
    out.push('}');
    Ok(out)
}

fn push_quoted(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
}

fn format_float(v: f64) -> String {
    if v.is_nan() {
        "NaN".into()
    } else if v.is_infinite() {
        if v > 0.0 { "Infinity" } else { "-Infinity" }.into()
    } else {
        v.to_string()
    }
}

/// Text form of a scalar placed in a text column
fn scalar_text(value: &Value) -> Option<String> {
    Some(match value {
        Value::Bool(b) => b.to_string(),
        Value::Int(v) => v.to_string(),
        Value::UInt(v) => v.to_string(),
        Value::Float(v) => format_float(*v),
        Value::Text(s) => s.clone(),
        Value::Json(v) => v.to_string(),
        Value::Date(d) => format_date(d),
        Value::Timestamp(ts) => format_timestamp(ts),
        Value::Null | Value::List(_) => return None,
    })
}

fn out_of_range(v: impl std::fmt::Display, ty: &Type) -> GatewayError {
    GatewayError::conversion(format!("value {} out of range for {}", v, ty.name()))
}

fn mismatch(ty: &Type, value: &Value) -> GatewayError {
    GatewayError::conversion(format!("cannot encode {:?} as {}", value, ty.name()))
}
