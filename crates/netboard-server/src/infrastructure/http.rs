//! HTTP surface of the relay.
//!
//! | Method & path            | Handler                         |
//! |--------------------------|---------------------------------|
//! | `POST /publish`          | [`publish`]                     |
//! | `GET /subscribe/chunked` | [`chunked::subscribe_chunked`]  |
//! | `GET /subscribe/ws`      | [`websocket::subscribe_ws`]     |
//!
//! Every handler reads the caller's [`PeerIdentity`] from a request
//! extension.  The TLS listener inserts it per connection from the client
//! certificate; nothing the client sends over HTTP can influence it.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Router};
use netboard_core::{Frame, PeerIdentity};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::application::dispatcher::Dispatcher;
use crate::domain::config::RelayConfig;
use crate::infrastructure::{chunked, websocket};

pub const PUBLISH_PATH: &str = "/publish";
pub const SUBSCRIBE_CHUNKED_PATH: &str = "/subscribe/chunked";
pub const SUBSCRIBE_WS_PATH: &str = "/subscribe/ws";

/// State shared by every handler.
#[derive(Clone)]
pub struct RelayState {
    pub dispatcher: Arc<Dispatcher>,
    pub config: Arc<RelayConfig>,
    /// Cancelled when the relay shuts down; streaming handlers stop on it.
    pub shutdown: CancellationToken,
}

impl RelayState {
    pub fn new(config: RelayConfig, shutdown: CancellationToken) -> Self {
        Self {
            dispatcher: Arc::new(Dispatcher::new(config.queue_capacity)),
            config: Arc::new(config),
            shutdown,
        }
    }
}

/// Builds the relay router.
pub fn build_router(state: RelayState) -> Router {
    Router::new()
        .route(PUBLISH_PATH, post(publish))
        .route(SUBSCRIBE_CHUNKED_PATH, get(chunked::subscribe_chunked))
        .route(SUBSCRIBE_WS_PATH, get(websocket::subscribe_ws))
        .with_state(state)
}

/// Handler for `POST /publish`.
///
/// Reads the whole body (up to `max_payload_bytes`), wraps it in one frame
/// and dispatches it to every subscriber but the caller.
pub async fn publish(
    State(state): State<RelayState>,
    Extension(identity): Extension<PeerIdentity>,
    body: Body,
) -> Response {
    let payload = match axum::body::to_bytes(body, state.config.max_payload_bytes).await {
        Ok(payload) => payload,
        Err(e) => {
            debug!(publisher = identity.short(), "publish body rejected: {e}");
            return (StatusCode::BAD_REQUEST, format!("unable to read body: {e}")).into_response();
        }
    };

    let report = state.dispatcher.dispatch(&identity, Frame::encode(&payload));
    debug!(
        publisher = identity.short(),
        bytes = payload.len(),
        delivered = report.delivered,
        dropped = report.dropped,
        "published"
    );
    StatusCode::NO_CONTENT.into_response()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
