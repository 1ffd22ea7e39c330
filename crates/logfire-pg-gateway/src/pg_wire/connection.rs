//! TCP socket tuning for accepted client connections

use socket2::{SockRef, TcpKeepalive};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Probes sent before a silent client is considered gone
#[cfg(any(target_os = "linux", target_os = "macos"))]
const KEEPALIVE_RETRIES: u32 = 3;

/// Keepalive timing for an idle time of `idle_secs`
fn keepalive_for(idle_secs: u64) -> TcpKeepalive {
    let keepalive = TcpKeepalive::new()
        .with_time(Duration::from_secs(idle_secs))
        .with_interval(Duration::from_secs(idle_secs / 2 + 1));

    #[cfg(any(target_os = "linux", target_os = "macos"))]
    let keepalive = keepalive.with_retries(KEEPALIVE_RETRIES);

    keepalive
}

/// Disable Nagle and arm keepalive on a client socket.
///
/// A psql session can sit idle for hours between queries, so a dead peer is
/// only noticed through keepalive probes. `keepalive_secs == 0` leaves the
/// operating system defaults untouched.
pub fn configure_client_socket(stream: &TcpStream, peer: SocketAddr, keepalive_secs: u64) {
    // Row messages are small and flushed per batch
    if let Err(e) = stream.set_nodelay(true) {
        warn!(peer = %peer, error = %e, "Failed to set TCP_NODELAY");
    }

    if keepalive_secs == 0 {
        return;
    }

    let socket = SockRef::from(stream);
    match socket.set_tcp_keepalive(&keepalive_for(keepalive_secs)) {
        Ok(()) => debug!(peer = %peer, idle_secs = keepalive_secs, "TCP keepalive armed"),
        Err(e) => warn!(peer = %peer, error = %e, "Failed to configure TCP keepalive"),
    }
}
