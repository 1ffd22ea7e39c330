//! Connection authentication
//!
//! The PostgreSQL password is a Logfire read token. It is checked once per
//! connection by running a probe query, then kept in the connection's
//! [`Session`] for every later query.
//!
//! ```text
//! StartupMessage ──► cleartext password ──► AuthGateway::authenticate
//!                                              │  SELECT 1 (bearer token)
//!                                              ▼
//!                                     Session::bind(credential)
//! ```

pub mod gateway;

pub use gateway::AuthGateway;

use logfire_pg_common::{GatewayError, Result};
use std::fmt;
use std::net::SocketAddr;
use std::sync::OnceLock;

/// Bearer token supplied as the connection password
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Per-connection state shared by the startup and query handlers
#[derive(Debug)]
pub struct Session {
    peer: SocketAddr,
    user: OnceLock<String>,
    credential: OnceLock<Credential>,
}

impl Session {
    pub fn new(peer: SocketAddr) -> Self {
        Self {
            peer,
            user: OnceLock::new(),
            credential: OnceLock::new(),
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn user(&self) -> Option<&str> {
        self.user.get().map(String::as_str)
    }

    /// Attach the validated credential; a connection authenticates once
    pub fn bind(&self, user: &str, credential: Credential) -> Result<()> {
        self.credential
            .set(credential)
            .map_err(|_| GatewayError::Internal("session already authenticated".into()))?;
        let _ = self.user.set(user.to_string());
        Ok(())
    }

    /// Credential for upstream calls
    pub fn credential(&self) -> Result<&Credential> {
        self.credential
            .get()
            .ok_or_else(|| GatewayError::Internal("no credential bound to session".into()))
    }
}
