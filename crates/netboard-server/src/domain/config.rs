//! Relay configuration types.
//!
//! [`RelayConfig`] holds every runtime setting of the relay.  It is a plain
//! struct with no environment or file reads of its own: the `netboard` binary
//! fills it from CLI flags, environment variables and the config file, while
//! tests build it directly from [`RelayConfig::default`].

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Port the relay listens on when none is configured.
pub const DEFAULT_PORT: u16 = 8989;

/// All runtime configuration for the relay.
///
/// # Example
///
/// ```rust
/// use netboard_server::domain::RelayConfig;
///
/// let cfg = RelayConfig::default();
/// assert_eq!(cfg.listen_addr.port(), 8989);
/// ```
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address and port the TLS listener binds to.
    pub listen_addr: SocketAddr,

    /// Frames buffered per subscriber before new frames are dropped for it.
    pub queue_capacity: usize,

    /// Largest publish body accepted, in bytes.
    pub max_payload_bytes: usize,

    /// Interval between server-initiated WebSocket pings.
    ///
    /// Clipboard traffic is sparse, so this is long; it only has to beat NAT
    /// and proxy idle timeouts.
    pub ws_ping_period: Duration,

    /// A WebSocket peer silent for this long is considered gone.
    ///
    /// Also the write deadline for both streaming transports: a subscriber
    /// that accepts no data for this long is dropped.
    ///
    /// Must be larger than `ws_ping_period` so a healthy peer always has a
    /// chance to answer a ping.
    pub ws_pong_wait: Duration,

    /// Upper bound on the TLS handshake of a new connection.
    pub handshake_timeout: Duration,

    /// How long shutdown waits for open connections to finish.
    pub shutdown_grace: Duration,
}

impl Default for RelayConfig {
    /// | Field             | Default          |
    /// |-------------------|------------------|
    /// | listen_addr       | `0.0.0.0:8989`   |
    /// | queue_capacity    | 16               |
    /// | max_payload_bytes | 16 MiB           |
    /// | ws_ping_period    | 15 minutes       |
    /// | ws_pong_wait      | 20 minutes       |
    /// | handshake_timeout | 10 seconds       |
    /// | shutdown_grace    | 5 seconds        |
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            queue_capacity: 16,
            max_payload_bytes: 16 * 1024 * 1024,
            ws_ping_period: Duration::from_secs(15 * 60),
            ws_pong_wait: Duration::from_secs(20 * 60),
            handshake_timeout: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
