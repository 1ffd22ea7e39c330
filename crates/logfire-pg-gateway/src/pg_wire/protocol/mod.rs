//! PostgreSQL type mapping

pub mod types;

pub use types::{map_type, map_value, WireValue};
