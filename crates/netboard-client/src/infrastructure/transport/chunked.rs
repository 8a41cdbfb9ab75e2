//! `GET /subscribe/chunked` reader.
//!
//! The relay never ends the response body on its own; frames arrive as body
//! chunks in whatever sizes the network produces.  A [`FrameReader`] stitches
//! them back together.  A malformed frame is skipped; an oversized partial
//! frame or any read error ends the session.

use async_trait::async_trait;
use bytes::Bytes;
use netboard_core::{FrameError, FrameReader};
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::config::SubscribeConfig;
use crate::infrastructure::transport::{
    Downstream, ServerEndpoint, SubscribeTransport, TransportError,
};

/// Path of the relay's chunked subscribe endpoint.
pub const SUBSCRIBE_CHUNKED_PATH: &str = "/subscribe/chunked";

/// Subscription over a streamed HTTP response body.
#[derive(Debug, Clone)]
pub struct ChunkedSubscriber {
    client: reqwest::Client,
    url: String,
    max_frame_len: usize,
}

impl ChunkedSubscriber {
    /// # Errors
    ///
    /// Returns [`TransportError::Http`] if the HTTP client cannot be built.
    pub fn new(endpoint: &ServerEndpoint, config: &SubscribeConfig) -> Result<Self, TransportError> {
        Ok(Self {
            // No request timeout: the body is meant to stay open.
            client: endpoint.http_client(config.connect_timeout, None)?,
            url: endpoint.http_url(SUBSCRIBE_CHUNKED_PATH),
            max_frame_len: config.max_frame_len,
        })
    }
}

/// Delivers every complete frame buffered in `reader`.
fn drain_frames(reader: &mut FrameReader, downstream: &Downstream) -> Result<(), TransportError> {
    while let Some(frame) = reader.next_frame() {
        match frame {
            Ok(payload) => downstream.deliver(Bytes::from(payload))?,
            Err(FrameError::InvalidEncoding(e)) => warn!("skipping malformed frame: {e}"),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

#[async_trait]
impl SubscribeTransport for ChunkedSubscriber {
    fn name(&self) -> &'static str {
        "chunked"
    }

    async fn run_session(
        &self,
        downstream: &Downstream,
        shutdown: &CancellationToken,
    ) -> Result<(), TransportError> {
        let mut response = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            response = self.client.get(&self.url).send() => response?,
        };

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::UnexpectedStatus {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }
        info!(url = %self.url, "subscribed to relay over chunked HTTP");

        let mut reader = FrameReader::with_max_frame_len(self.max_frame_len);
        loop {
            let chunk = tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                chunk = response.chunk() => chunk?,
            };
            let Some(chunk) = chunk else {
                return Err(TransportError::Closed("end of response body".into()));
            };
            reader.push(&chunk);
            drain_frames(&mut reader, downstream)?;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
