//! Upstream column descriptors
//!
//! Both transports describe their columns with the same Arrow-derived
//! vocabulary. The Arrow stream carries a real `arrow_schema::Schema`; the JSON
//! document carries Arrow's serde encoding of `DataType` (`"Int64"`,
//! `{"Timestamp": ["Microsecond", "UTC"]}`, `{"List": {field}}`).

use arrow_schema::{DataType, Field, TimeUnit};
use serde_json::Value as JsonValue;
use std::fmt;

/// Field metadata key Arrow uses for extension types
const EXTENSION_NAME_KEY: &str = "ARROW:extension:name";

/// Canonical JSON extension name
const JSON_EXTENSION: &str = "arrow.json";

/// Scalar column kinds the upstream can return
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalarKind {
    Utf8,
    Json,
    Boolean,
    Int32,
    Int64,
    UInt16,
    UInt32,
    UInt64,
    Float64,
    Date32,
    Timestamp(TimeUnit, Option<String>),
    /// Anything else, carrying the upstream's name for error messages
    Unsupported(String),
}

/// Declared type of an upstream column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDescriptor {
    Scalar(ScalarKind),
    List(Box<TypeDescriptor>),
}

impl TypeDescriptor {
    pub fn list(inner: TypeDescriptor) -> Self {
        TypeDescriptor::List(Box::new(inner))
    }

    /// Descriptor for an Arrow field, honoring the JSON extension marker
    pub fn from_arrow_field(field: &Field) -> Self {
        let is_json = field
            .metadata()
            .get(EXTENSION_NAME_KEY)
            .is_some_and(|name| name == JSON_EXTENSION);

        match Self::from_arrow(field.data_type()) {
            TypeDescriptor::Scalar(ScalarKind::Utf8) if is_json => {
                TypeDescriptor::Scalar(ScalarKind::Json)
            }
            other => other,
        }
    }

    /// Descriptor for an Arrow data type
    pub fn from_arrow(data_type: &DataType) -> Self {
        let kind = match data_type {
            DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => ScalarKind::Utf8,
            DataType::Boolean => ScalarKind::Boolean,
            DataType::Int32 => ScalarKind::Int32,
            DataType::Int64 => ScalarKind::Int64,
            DataType::UInt16 => ScalarKind::UInt16,
            DataType::UInt32 => ScalarKind::UInt32,
            DataType::UInt64 => ScalarKind::UInt64,
            DataType::Float64 => ScalarKind::Float64,
            DataType::Date32 => ScalarKind::Date32,
            DataType::Timestamp(unit, tz) => {
                ScalarKind::Timestamp(*unit, tz.as_ref().map(|tz| tz.to_string()))
            }
            DataType::List(field) | DataType::LargeList(field) => {
                return TypeDescriptor::list(Self::from_arrow_field(field));
            }
            other => ScalarKind::Unsupported(other.to_string()),
        };
        TypeDescriptor::Scalar(kind)
    }

    /// Descriptor from the JSON transport's `datatype` value
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::String(name) => TypeDescriptor::Scalar(scalar_from_name(name)),
            JsonValue::Object(map) if map.len() == 1 => {
                let Some((key, inner)) = map.iter().next() else {
                    return TypeDescriptor::Scalar(ScalarKind::Unsupported(value.to_string()));
                };
                match key.as_str() {
                    "Timestamp" => TypeDescriptor::Scalar(timestamp_from_json(inner)),
                    "List" | "LargeList" => {
                        // Arrow encodes the element as a full Field; accept a bare descriptor too
                        let element = inner.get("data_type").unwrap_or(inner);
                        TypeDescriptor::list(Self::from_json(element))
                    }
                    other => TypeDescriptor::Scalar(ScalarKind::Unsupported(other.to_string())),
                }
            }
            other => TypeDescriptor::Scalar(ScalarKind::Unsupported(other.to_string())),
        }
    }
}

fn scalar_from_name(name: &str) -> ScalarKind {
    match name {
        "Utf8" | "LargeUtf8" | "Utf8View" => ScalarKind::Utf8,
        "Json" => ScalarKind::Json,
        "Boolean" => ScalarKind::Boolean,
        "Int32" => ScalarKind::Int32,
        "Int64" => ScalarKind::Int64,
        "UInt16" => ScalarKind::UInt16,
        "UInt32" => ScalarKind::UInt32,
        "UInt64" => ScalarKind::UInt64,
        "Float64" => ScalarKind::Float64,
        "Date32" => ScalarKind::Date32,
        "Timestamp" => ScalarKind::Timestamp(TimeUnit::Microsecond, None),
        other => ScalarKind::Unsupported(other.to_string()),
    }
}

fn timestamp_from_json(value: &JsonValue) -> ScalarKind {
    let parts = value.as_array().map(Vec::as_slice).unwrap_or_default();
    let unit = match parts.first().and_then(JsonValue::as_str) {
        Some("Second") => TimeUnit::Second,
        Some("Millisecond") => TimeUnit::Millisecond,
        Some("Nanosecond") => TimeUnit::Nanosecond,
        _ => TimeUnit::Microsecond,
    };
    let tz = parts.get(1).and_then(JsonValue::as_str).map(str::to_string);
    ScalarKind::Timestamp(unit, tz)
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarKind::Timestamp(unit, Some(tz)) => write!(f, "Timestamp({:?}, {})", unit, tz),
            ScalarKind::Timestamp(unit, None) => write!(f, "Timestamp({:?})", unit),
            ScalarKind::Unsupported(name) => write!(f, "{}", name),
            other => write!(f, "{:?}", other),
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Scalar(kind) => write!(f, "{}", kind),
            TypeDescriptor::List(inner) => write!(f, "List({})", inner),
        }
    }
}

/// One upstream column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: TypeDescriptor,
    pub nullable: bool,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, data_type: TypeDescriptor, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }

    pub fn from_arrow_field(field: &Field) -> Self {
        Self::new(
            field.name().clone(),
            TypeDescriptor::from_arrow_field(field),
            field.is_nullable(),
        )
    }
}
