//! PostgreSQL wire protocol front end
//!
//! Framing, startup negotiation and ReadyForQuery bookkeeping are handled by
//! `pgwire`; this module supplies the handlers.
//!
//! ## Module Structure
//!
//! - `config` - Server configuration (environment-driven)
//! - `protocol` - Type and value mapping
//! - `query` - psql meta-command interception
//! - `auth` - Startup and password handling
//! - `connection` - TCP keepalive
//! - `session` - Per-query coordination and row streaming
//! - `server` - Accept loop

pub mod auth;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod query;
pub mod session;

mod server;

pub use config::PgWireConfig;
pub use server::PgWireServer;
