//! WebSocket subscribe transport.
//!
//! `GET /subscribe/ws` upgrades the connection; afterwards every queued frame
//! is sent as one text message whose payload is the encoded frame including
//! its trailing `,`.
//!
//! # Keepalive
//!
//! Clipboard updates can be hours apart, so the relay pings the peer every
//! `ws_ping_period` and gives up on a peer it has not heard from (pong or any
//! other message) for `ws_pong_wait`.  Incoming pings are answered by the
//! WebSocket library itself.
//!
//! # Closing
//!
//! Whatever ends the session (peer close, keepalive timeout, eviction, relay
//! shutdown), the relay tries to send a `1001 Going Away` close frame before
//! dropping the socket.

use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::Extension;
use netboard_core::{Frame, PeerIdentity};
use tokio::time::{interval_at, sleep_until, Instant, Interval, MissedTickBehavior};
use tracing::{debug, trace};

use crate::infrastructure::http::RelayState;
use crate::infrastructure::subscriber::{pump_frames, FrameSink, PeerSignal, PumpOutcome, SinkError};

/// Longest close reason a control frame can carry (125 bytes minus the code).
const MAX_CLOSE_REASON: usize = 123;

/// [`FrameSink`] over an upgraded WebSocket.
pub struct WebSocketSink {
    socket: WebSocket,
    ping: Interval,
    pong_wait: Duration,
    last_heard: Instant,
}

impl WebSocketSink {
    /// Wraps an upgraded socket.  The first ping goes out after `ping_period`.
    pub fn new(socket: WebSocket, ping_period: Duration, pong_wait: Duration) -> Self {
        let now = Instant::now();
        let mut ping = interval_at(now + ping_period, ping_period);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            socket,
            ping,
            pong_wait,
            last_heard: now,
        }
    }
}

#[async_trait]
impl FrameSink for WebSocketSink {
    fn transport(&self) -> &'static str {
        "websocket"
    }

    async fn send_frame(&mut self, frame: Frame) -> Result<(), SinkError> {
        self.socket
            .send(Message::Text(frame.to_text()))
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))
    }

    async fn watch_peer(&mut self) -> PeerSignal {
        let deadline = self.last_heard + self.pong_wait;
        tokio::select! {
            _ = sleep_until(deadline) => PeerSignal::Gone(SinkError::KeepaliveTimeout),
            _ = self.ping.tick() => PeerSignal::KeepaliveDue,
            msg = self.socket.recv() => match msg {
                None | Some(Ok(Message::Close(_))) => PeerSignal::Gone(SinkError::Disconnected),
                Some(Err(e)) => PeerSignal::Gone(SinkError::Transport(e.to_string())),
                Some(Ok(other)) => {
                    trace!(kind = message_kind(&other), "websocket message from subscriber");
                    self.last_heard = Instant::now();
                    PeerSignal::Alive
                }
            },
        }
    }

    async fn keepalive(&mut self) -> Result<(), SinkError> {
        self.socket
            .send(Message::Ping(Vec::new()))
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))
    }

    async fn finish(&mut self, outcome: &PumpOutcome) {
        let close = Message::Close(Some(CloseFrame {
            code: close_code::AWAY,
            reason: close_reason(outcome).into(),
        }));
        if let Err(e) = self.socket.send(close).await {
            debug!("websocket close frame not sent: {e}");
        }
    }
}

/// Renders `outcome` as a close reason, cut at a character boundary so it
/// fits in a close frame.
fn close_reason(outcome: &PumpOutcome) -> String {
    let mut reason = outcome.to_string();
    if reason.len() > MAX_CLOSE_REASON {
        let mut end = MAX_CLOSE_REASON;
        while !reason.is_char_boundary(end) {
            end -= 1;
        }
        reason.truncate(end);
    }
    reason
}

fn message_kind(msg: &Message) -> &'static str {
    match msg {
        Message::Text(_) => "text",
        Message::Binary(_) => "binary",
        Message::Ping(_) => "ping",
        Message::Pong(_) => "pong",
        Message::Close(_) => "close",
    }
}

/// Handler for `GET /subscribe/ws`.
///
/// Registration happens after the upgrade completes, inside the connection
/// task, so a failed handshake never leaves a registry entry behind.
pub async fn subscribe_ws(
    State(state): State<RelayState>,
    Extension(identity): Extension<PeerIdentity>,
    upgrade: WebSocketUpgrade,
) -> Response {
    upgrade.on_upgrade(move |socket| async move {
        let subscription = state.dispatcher.register(identity);
        let sink = WebSocketSink::new(
            socket,
            state.config.ws_ping_period,
            state.config.ws_pong_wait,
        );
        pump_frames(
            subscription,
            sink,
            state.shutdown.clone(),
            state.config.ws_pong_wait,
        )
        .await;
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, SocketAddr};
    use std::sync::Arc;

    use axum::routing::get;
    use axum::Router;
    use futures_util::{SinkExt, StreamExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;
    use tokio_tungstenite::tungstenite::Message as PeerMessage;
    use tokio_util::sync::CancellationToken;

    use crate::application::dispatcher::Dispatcher;

    const PING_PERIOD: Duration = Duration::from_millis(100);
    const PONG_WAIT: Duration = Duration::from_millis(400);

    /// Serves one WebSocket route backed by [`WebSocketSink`] on loopback and
    /// reports each session's outcome.
    async fn serve_sink() -> (SocketAddr, mpsc::UnboundedReceiver<PumpOutcome>) {
        let dispatcher = Arc::new(Dispatcher::new(8));
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let app = Router::new().route(
            "/ws",
            get(move |upgrade: WebSocketUpgrade| {
                let dispatcher = Arc::clone(&dispatcher);
                let outcome_tx = outcome_tx.clone();
                async move {
                    upgrade.on_upgrade(move |socket| async move {
                        let subscription = dispatcher.register(PeerIdentity::from_string("peer"));
                        let sink = WebSocketSink::new(socket, PING_PERIOD, PONG_WAIT);
                        let outcome =
                            pump_frames(subscription, sink, CancellationToken::new(), PONG_WAIT)
                                .await;
                        let _ = outcome_tx.send(outcome);
                    })
                }
            }),
        );
        let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, outcome_rx)
    }

    #[tokio::test]
    async fn test_sink_pings_after_ping_period() {
        // Arrange
        let (addr, _outcomes) = serve_sink().await;
        let (mut peer, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
            .await
            .unwrap();

        // Act
        let first = tokio::time::timeout(Duration::from_secs(2), peer.next())
            .await
            .expect("no message from the relay")
            .unwrap()
            .unwrap();

        // Assert
        assert!(matches!(first, PeerMessage::Ping(_)), "got {first:?}");
    }

    #[tokio::test]
    async fn test_silent_peer_times_out() {
        // Arrange: the peer connects and then never sends anything
        let (addr, mut outcomes) = serve_sink().await;
        let (_peer, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
            .await
            .unwrap();

        // Act
        let outcome = tokio::time::timeout(Duration::from_secs(3), outcomes.recv())
            .await
            .expect("session did not end")
            .unwrap();

        // Assert
        assert_eq!(outcome, PumpOutcome::PeerGone(SinkError::KeepaliveTimeout));
    }

    #[tokio::test]
    async fn test_chatty_peer_stays_connected() {
        // Arrange
        let (addr, mut outcomes) = serve_sink().await;
        let (mut peer, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
            .await
            .unwrap();

        // Act: keep talking for twice the pong wait
        for _ in 0..8 {
            peer.send(PeerMessage::Text("still here".into())).await.unwrap();
            tokio::time::sleep(PONG_WAIT / 4).await;
        }

        // Assert
        assert!(outcomes.try_recv().is_err());
    }

    #[test]
    fn test_close_reason_fits_close_frame() {
        // Arrange: multi-byte characters straddle the limit
        let long = SinkError::Transport("é".repeat(100));

        // Act
        let reason = close_reason(&PumpOutcome::PeerGone(long));

        // Assert
        assert!(reason.len() <= MAX_CLOSE_REASON);
        assert!(reason.starts_with("transport error: é"));
    }

    #[test]
    fn test_short_close_reason_is_unchanged() {
        assert_eq!(close_reason(&PumpOutcome::Shutdown), "relay shutting down");
    }
}
