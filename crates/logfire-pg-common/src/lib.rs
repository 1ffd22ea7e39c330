//! logfire-pg common library
//!
//! Error taxonomy and configuration shared by the gateway.

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::{GatewayConfig, ServerConfig, Transport, UpstreamConfig};
pub use error::{GatewayError, Result};
