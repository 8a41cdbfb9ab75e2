//! Chunked HTTP subscribe transport.
//!
//! `GET /subscribe/chunked` answers `200 OK` with a body that never ends on
//! its own: every frame queued for the subscriber is written as one body
//! chunk (`<base64url>,`).  The body is fed through a one-slot channel, so a
//! frame is handed to hyper only after the previous one was taken for
//! writing, and hyper flushes each chunk as it goes out.
//!
//! When the client disconnects hyper drops the body; the sender sees the
//! channel close and the pump unregisters the subscriber.

use std::convert::Infallible;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use bytes::Bytes;
use futures_util::stream;
use netboard_core::{Frame, PeerIdentity};
use tokio::sync::mpsc;

use crate::infrastructure::http::RelayState;
use crate::infrastructure::subscriber::{pump_frames, FrameSink, PeerSignal, PumpOutcome, SinkError};

/// Content type of the streamed body.
pub const CHUNKED_CONTENT_TYPE: &str = "application/octet-stream";

/// [`FrameSink`] that feeds a streamed HTTP response body.
pub struct ChunkedSink {
    body_tx: mpsc::Sender<Bytes>,
}

impl ChunkedSink {
    /// Creates the sink and the response body it writes into.
    pub fn new() -> (Self, Body) {
        let (body_tx, body_rx) = mpsc::channel::<Bytes>(1);
        let chunks = stream::unfold(body_rx, |mut rx| async move {
            rx.recv()
                .await
                .map(|chunk| (Ok::<_, Infallible>(chunk), rx))
        });
        (Self { body_tx }, Body::from_stream(chunks))
    }
}

#[async_trait]
impl FrameSink for ChunkedSink {
    fn transport(&self) -> &'static str {
        "chunked"
    }

    async fn send_frame(&mut self, frame: Frame) -> Result<(), SinkError> {
        self.body_tx
            .send(frame.into_bytes())
            .await
            .map_err(|_| SinkError::Disconnected)
    }

    async fn watch_peer(&mut self) -> PeerSignal {
        self.body_tx.closed().await;
        PeerSignal::Gone(SinkError::Disconnected)
    }

    async fn finish(&mut self, _outcome: &PumpOutcome) {
        // Dropping the sender ends the body with the terminating zero chunk.
    }
}

/// Handler for `GET /subscribe/chunked`.
pub async fn subscribe_chunked(
    State(state): State<RelayState>,
    Extension(identity): Extension<PeerIdentity>,
) -> Response {
    let subscription = state.dispatcher.register(identity);
    let (sink, body) = ChunkedSink::new();
    tokio::spawn(pump_frames(
        subscription,
        sink,
        state.shutdown.clone(),
        state.config.ws_pong_wait,
    ));

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, CHUNKED_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
