//! Client configuration types.
//!
//! [`SubscribeConfig`] describes how the client reaches the relay.  Like the
//! relay's own config it performs no I/O: the `netboard` binary fills it from
//! flags, environment and the config file.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use netboard_core::protocol::reader::DEFAULT_MAX_FRAME_LEN;

/// Relay URL used when none is configured.
pub const DEFAULT_SERVER_URL: &str = "https://127.0.0.1:8989";

/// How the client receives updates from the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    /// `GET /subscribe/ws`, one text message per frame.
    #[default]
    WebSocket,
    /// `GET /subscribe/chunked`, an endless response body of frames.
    Chunked,
}

impl TransportKind {
    /// Pause between a lost subscription and the next attempt.
    pub fn default_reconnect_delay(self) -> Duration {
        match self {
            Self::WebSocket => Duration::from_secs(1),
            Self::Chunked => Duration::from_secs(5),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::WebSocket => "websocket",
            Self::Chunked => "chunked",
        })
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "websocket" | "ws" => Ok(Self::WebSocket),
            "chunked" | "http" => Ok(Self::Chunked),
            other => Err(format!(
                "unknown transport '{other}' (expected 'websocket' or 'chunked')"
            )),
        }
    }
}

/// Everything the client needs to talk to the relay, minus TLS material.
#[derive(Debug, Clone)]
pub struct SubscribeConfig {
    /// Base URL of the relay (`https://host:port`).
    pub server_url: String,

    /// Transport used for the subscription.
    pub transport: TransportKind,

    /// Backoff between subscription attempts.  `None` uses
    /// [`TransportKind::default_reconnect_delay`].
    pub reconnect_delay: Option<Duration>,

    /// Interval between client-initiated WebSocket pings.
    pub ws_ping_period: Duration,

    /// A WebSocket relay silent for this long is considered gone.
    pub ws_pong_wait: Duration,

    /// Upper bound on a single `POST /publish`.
    pub publish_timeout: Duration,

    /// Upper bound on establishing a connection to the relay.
    pub connect_timeout: Duration,

    /// Payloads buffered between the subscription and the sync loop.
    pub downstream_capacity: usize,

    /// Largest partial frame the chunked reader buffers before giving up on
    /// the stream.
    pub max_frame_len: usize,
}

impl SubscribeConfig {
    /// Backoff actually used between subscription attempts.
    pub fn effective_reconnect_delay(&self) -> Duration {
        self.reconnect_delay
            .unwrap_or_else(|| self.transport.default_reconnect_delay())
    }
}

impl Default for SubscribeConfig {
    /// | Field               | Default                  |
    /// |---------------------|--------------------------|
    /// | server_url          | `https://127.0.0.1:8989` |
    /// | transport           | websocket                |
    /// | reconnect_delay     | per transport (1 s / 5 s)|
    /// | ws_ping_period      | 15 minutes               |
    /// | ws_pong_wait        | 20 minutes               |
    /// | publish_timeout     | 30 seconds               |
    /// | connect_timeout     | 10 seconds               |
    /// | downstream_capacity | 512                      |
    /// | max_frame_len       | 64 MiB                   |
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            transport: TransportKind::default(),
            reconnect_delay: None,
            ws_ping_period: Duration::from_secs(15 * 60),
            ws_pong_wait: Duration::from_secs(20 * 60),
            publish_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            downstream_capacity: 512,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_reconnect_delay_depends_on_transport() {
        // Arrange
        let mut cfg = SubscribeConfig::default();

        // Act / Assert
        assert_eq!(cfg.effective_reconnect_delay(), Duration::from_secs(1));
        cfg.transport = TransportKind::Chunked;
        assert_eq!(cfg.effective_reconnect_delay(), Duration::from_secs(5));
    }

    #[test]
    fn test_explicit_reconnect_delay_wins() {
        let cfg = SubscribeConfig {
            reconnect_delay: Some(Duration::from_millis(250)),
            ..SubscribeConfig::default()
        };
        assert_eq!(cfg.effective_reconnect_delay(), Duration::from_millis(250));
    }

    #[test]
    fn test_transport_kind_parses_and_displays() {
        assert_eq!("chunked".parse::<TransportKind>().unwrap(), TransportKind::Chunked);
        assert_eq!("websocket".parse::<TransportKind>().unwrap(), TransportKind::WebSocket);
        assert_eq!(TransportKind::Chunked.to_string(), "chunked");
        assert!("carrier-pigeon".parse::<TransportKind>().is_err());
    }

    #[test]
    fn test_default_downstream_capacity_is_512() {
        assert_eq!(SubscribeConfig::default().downstream_capacity, 512);
    }
}
