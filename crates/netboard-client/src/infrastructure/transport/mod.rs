//! Client side of the relay protocol.
//!
//! - **`publish`** – [`HttpPublisher`]: one `POST /publish` per local change.
//! - **`chunked`** – [`ChunkedSubscriber`]: reads frames from an endless
//!   `GET /subscribe/chunked` body.
//! - **`websocket`** – [`WebSocketSubscriber`]: reads frames from
//!   `GET /subscribe/ws` messages.
//!
//! Both subscribers implement [`SubscribeTransport`], which covers a single
//! session.  [`run_subscriber`] wraps any of them in the reconnect loop, so
//! backoff and shutdown handling exist once.

pub mod chunked;
pub mod publish;
pub mod websocket;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use netboard_core::FrameError;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::config::{SubscribeConfig, TransportKind};

pub use chunked::ChunkedSubscriber;
pub use publish::HttpPublisher;
pub use websocket::WebSocketSubscriber;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Error type for a subscription session or transport setup.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid relay URL '{0}': expected http:// or https://")]
    InvalidUrl(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("relay answered {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("no message from relay for {0:?}")]
    KeepaliveTimeout(Duration),

    #[error("relay closed the stream: {0}")]
    Closed(String),

    /// The consumer of received payloads has gone away.
    #[error("downstream receiver closed")]
    DownstreamClosed,
}

// ── Endpoint ──────────────────────────────────────────────────────────────────

/// Relay base URL plus the client TLS configuration used for every request.
#[derive(Debug, Clone)]
pub struct ServerEndpoint {
    base_url: String,
    tls: Arc<rustls::ClientConfig>,
}

impl ServerEndpoint {
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidUrl`] unless `base_url` starts with
    /// `http://` or `https://`.
    pub fn new(base_url: &str, tls: Arc<rustls::ClientConfig>) -> Result<Self, TransportError> {
        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            return Err(TransportError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            tls,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tls(&self) -> Arc<rustls::ClientConfig> {
        Arc::clone(&self.tls)
    }

    /// `{base}{path}` over HTTP(S).
    pub fn http_url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// `{base}{path}` with `https` rewritten to `wss` and `http` to `ws`.
    pub fn ws_url(&self, path: &str) -> String {
        let url = self.http_url(path);
        if let Some(rest) = url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            url
        }
    }

    /// A `reqwest` client using this endpoint's TLS configuration.
    pub(crate) fn http_client(
        &self,
        connect_timeout: Duration,
        request_timeout: Option<Duration>,
    ) -> Result<reqwest::Client, TransportError> {
        let mut builder = reqwest::Client::builder()
            .use_preconfigured_tls((*self.tls).clone())
            .connect_timeout(connect_timeout);
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(builder.build()?)
    }
}

// ── Downstream ────────────────────────────────────────────────────────────────

/// Sending half of the channel between a subscription and the sync loop.
///
/// Delivery never waits: if the sync loop is behind and the buffer is full,
/// the newest payload is dropped and counted.
#[derive(Debug, Clone)]
pub struct Downstream {
    tx: mpsc::Sender<Bytes>,
    dropped: Arc<AtomicU64>,
}

impl Downstream {
    /// Creates a downstream buffer holding up to `capacity` payloads.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    /// Hands one received payload to the sync loop.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::DownstreamClosed`] once the receiver is gone.
    pub fn deliver(&self, payload: Bytes) -> Result<(), TransportError> {
        match self.tx.try_send(payload) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(payload)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(bytes = payload.len(), "sync loop is behind, dropping remote update");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(TransportError::DownstreamClosed),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Payloads dropped because the buffer was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

// ── Transport abstraction ─────────────────────────────────────────────────────

/// One way of receiving frames from the relay.
#[async_trait]
pub trait SubscribeTransport: Send + Sync + 'static {
    /// Transport name for log lines.
    fn name(&self) -> &'static str;

    /// Runs a single subscription: connect, then deliver decoded payloads to
    /// `downstream` until the connection is lost or `shutdown` fires.
    ///
    /// Returns `Ok(())` only when stopped by `shutdown`.
    async fn run_session(
        &self,
        downstream: &Downstream,
        shutdown: &CancellationToken,
    ) -> Result<(), TransportError>;
}

/// Builds the subscriber for `config.transport`.
///
/// # Errors
///
/// Propagates HTTP client construction failures.
pub fn build_subscriber(
    endpoint: &ServerEndpoint,
    config: &SubscribeConfig,
) -> Result<Arc<dyn SubscribeTransport>, TransportError> {
    Ok(match config.transport {
        TransportKind::WebSocket => Arc::new(WebSocketSubscriber::new(endpoint, config)),
        TransportKind::Chunked => Arc::new(ChunkedSubscriber::new(endpoint, config)?),
    })
}

/// Keeps a subscription alive until `shutdown` fires or `downstream` closes.
///
/// Every session that ends for any other reason is followed by a pause of
/// `reconnect_delay` and a new session.  Returns the number of sessions
/// started.
pub async fn run_subscriber(
    transport: Arc<dyn SubscribeTransport>,
    downstream: Downstream,
    reconnect_delay: Duration,
    shutdown: CancellationToken,
) -> u64 {
    let mut sessions = 0u64;

    while !shutdown.is_cancelled() && !downstream.is_closed() {
        sessions += 1;
        debug!(transport = transport.name(), attempt = sessions, "starting subscription");

        match transport.run_session(&downstream, &shutdown).await {
            Ok(()) => break,
            Err(TransportError::DownstreamClosed) => break,
            Err(e) => warn!(transport = transport.name(), "subscription lost: {e}"),
        }

        info!(
            transport = transport.name(),
            delay = ?reconnect_delay,
            "reconnecting to relay"
        );
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(reconnect_delay) => {}
        }
    }

    info!(
        transport = transport.name(),
        sessions,
        dropped = downstream.dropped(),
        "subscription stopped"
    );
    sessions
}

/// Spawns [`run_subscriber`] and returns the receiving end of its downstream.
pub fn spawn_subscriber(
    transport: Arc<dyn SubscribeTransport>,
    downstream_capacity: usize,
    reconnect_delay: Duration,
    shutdown: CancellationToken,
) -> (mpsc::Receiver<Bytes>, JoinHandle<u64>) {
    let (downstream, rx) = Downstream::channel(downstream_capacity);
    let handle = tokio::spawn(run_subscriber(transport, downstream, reconnect_delay, shutdown));
    (rx, handle)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
