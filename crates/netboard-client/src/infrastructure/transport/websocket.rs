//! `GET /subscribe/ws` reader.
//!
//! Each text or binary message carries one encoded frame, normally with its
//! trailing `,`.  The client pings the relay every `ws_ping_period` and gives
//! up on a relay it has not heard from for `ws_pong_wait`.  Pings from the
//! relay are answered by tungstenite.  On shutdown a `1001 Going Away` close
//! frame is sent before the socket is dropped.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use netboard_core::decode_frame;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_tls_with_config, Connector};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::config::SubscribeConfig;
use crate::infrastructure::transport::{
    Downstream, ServerEndpoint, SubscribeTransport, TransportError,
};

/// Path of the relay's WebSocket subscribe endpoint.
pub const SUBSCRIBE_WS_PATH: &str = "/subscribe/ws";

/// Subscription over a WebSocket.
#[derive(Debug, Clone)]
pub struct WebSocketSubscriber {
    url: String,
    tls: Arc<rustls::ClientConfig>,
    ping_period: Duration,
    pong_wait: Duration,
}

impl WebSocketSubscriber {
    pub fn new(endpoint: &ServerEndpoint, config: &SubscribeConfig) -> Self {
        Self {
            url: endpoint.ws_url(SUBSCRIBE_WS_PATH),
            tls: endpoint.tls(),
            ping_period: config.ws_ping_period,
            pong_wait: config.ws_pong_wait,
        }
    }
}

/// Decodes one message payload and hands it on.  Malformed frames are
/// logged and skipped.
fn deliver_message(wire: &[u8], downstream: &Downstream) -> Result<(), TransportError> {
    match decode_frame(wire) {
        Ok(payload) => downstream.deliver(Bytes::from(payload)),
        Err(e) => {
            warn!("skipping malformed frame: {e}");
            Ok(())
        }
    }
}

#[async_trait]
impl SubscribeTransport for WebSocketSubscriber {
    fn name(&self) -> &'static str {
        "websocket"
    }

    async fn run_session(
        &self,
        downstream: &Downstream,
        shutdown: &CancellationToken,
    ) -> Result<(), TransportError> {
        let connect = connect_async_tls_with_config(
            self.url.as_str(),
            None,
            false,
            Some(Connector::Rustls(Arc::clone(&self.tls))),
        );
        let (mut socket, _response) = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            connected = connect => connected?,
        };
        info!(url = %self.url, "subscribed to relay over WebSocket");

        let mut ping = interval_at(Instant::now() + self.ping_period, self.ping_period);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut deadline = Instant::now() + self.pong_wait;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    let close = CloseFrame {
                        code: CloseCode::Away,
                        reason: "client shutting down".into(),
                    };
                    if let Err(e) = socket.close(Some(close)).await {
                        debug!("unable to send close frame: {e}");
                    }
                    return Ok(());
                }
                _ = sleep_until(deadline) => {
                    return Err(TransportError::KeepaliveTimeout(self.pong_wait));
                }
                _ = ping.tick() => {
                    socket.send(Message::Ping(Vec::new())).await?;
                }
                message = socket.next() => {
                    let Some(message) = message else {
                        return Err(TransportError::Closed("connection dropped".into()));
                    };
                    deadline = Instant::now() + self.pong_wait;
                    match message? {
                        Message::Text(text) => deliver_message(text.as_bytes(), downstream)?,
                        Message::Binary(data) => deliver_message(&data, downstream)?,
                        Message::Close(frame) => {
                            let reason = frame
                                .map(|f| format!("{} {}", u16::from(f.code), f.reason))
                                .unwrap_or_else(|| "no close frame".to_string());
                            return Err(TransportError::Closed(reason));
                        }
                        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
                    }
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
