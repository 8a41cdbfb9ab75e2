//! Integration tests for the relay's HTTP surface.
//!
//! These tests drive the router built by `build_router` exactly as the TLS
//! listener does, minus the socket: each request carries the caller's
//! `PeerIdentity` as an extension, which is what the listener inserts after
//! the handshake.  They verify the publish/subscribe contract across
//! handlers:
//!
//! - A publish reaches every other chunked subscriber and never the publisher.
//! - A subscriber that re-subscribes replaces its old stream.
//! - Several publishes arrive in order on one subscriber.
//!
//! The full mutual-TLS path is covered by the end-to-end suite of the
//! `netboard` crate.

use std::time::Duration;

use axum::body::{Body, BodyDataStream};
use axum::http::{Request, StatusCode};
use axum::Router;
use futures_util::StreamExt;
use netboard_core::{FrameReader, PeerIdentity};
use netboard_server::domain::RelayConfig;
use netboard_server::infrastructure::{build_router, RelayState};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

// ── Helpers ───────────────────────────────────────────────────────────────────

fn relay() -> (RelayState, Router) {
    let state = RelayState::new(RelayConfig::default(), CancellationToken::new());
    let router = build_router(state.clone());
    (state, router)
}

fn as_peer(caller: &str, req: Request<Body>) -> Request<Body> {
    let mut req = req;
    req.extensions_mut().insert(PeerIdentity::from_string(caller));
    req
}

async fn subscribe(router: &Router, caller: &str) -> BodyDataStream {
    let req = Request::get("/subscribe/chunked").body(Body::empty()).unwrap();
    let resp = router.clone().oneshot(as_peer(caller, req)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    resp.into_body().into_data_stream()
}

async fn publish(router: &Router, caller: &str, payload: &'static [u8]) {
    let req = Request::post("/publish").body(Body::from(payload)).unwrap();
    let resp = router.clone().oneshot(as_peer(caller, req)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

/// Reads the next decoded payload, or `None` if nothing arrives in 200 ms.
async fn next_payload(stream: &mut BodyDataStream, reader: &mut FrameReader) -> Option<Vec<u8>> {
    loop {
        if let Some(frame) = reader.next_frame() {
            return Some(frame.expect("valid frame"));
        }
        match tokio::time::timeout(Duration::from_millis(200), stream.next()).await {
            Ok(Some(Ok(chunk))) => reader.push(&chunk),
            _ => return None,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

/// A and B subscribe; A publishes P; B's stream yields P and A's yields
/// nothing from that publish.
#[tokio::test]
async fn test_publish_fans_out_to_others_but_not_publisher() {
    // Arrange
    let (_state, router) = relay();
    let mut stream_a = subscribe(&router, "a").await;
    let mut stream_b = subscribe(&router, "b").await;
    let (mut reader_a, mut reader_b) = (FrameReader::new(), FrameReader::new());

    // Act
    publish(&router, "a", b"P").await;

    // Assert
    assert_eq!(next_payload(&mut stream_b, &mut reader_b).await, Some(b"P".to_vec()));
    assert_eq!(next_payload(&mut stream_a, &mut reader_a).await, None);
}

#[tokio::test]
async fn test_publishes_arrive_in_order() {
    let (_state, router) = relay();
    let mut stream_b = subscribe(&router, "b").await;
    let mut reader = FrameReader::new();

    for payload in [&b"1"[..], b"22", b"333"] {
        publish(&router, "a", payload).await;
    }

    assert_eq!(next_payload(&mut stream_b, &mut reader).await, Some(b"1".to_vec()));
    assert_eq!(next_payload(&mut stream_b, &mut reader).await, Some(b"22".to_vec()));
    assert_eq!(next_payload(&mut stream_b, &mut reader).await, Some(b"333".to_vec()));
}

/// Re-subscribing with the same identity replaces the registration: the old
/// body ends and the new one receives subsequent publishes.
#[tokio::test]
async fn test_resubscribe_replaces_previous_stream() {
    // Arrange
    let (state, router) = relay();
    let mut old = subscribe(&router, "b").await;

    // Act
    let mut new = subscribe(&router, "b").await;
    publish(&router, "a", b"fresh").await;

    // Assert
    assert!(old.next().await.is_none(), "old stream must end");
    let mut reader = FrameReader::new();
    assert_eq!(next_payload(&mut new, &mut reader).await, Some(b"fresh".to_vec()));
    assert_eq!(state.dispatcher.subscriber_count(), 1);
    assert_eq!(state.dispatcher.stats().registrations, 2);
}

/// With no subscribers a publish still succeeds.
#[tokio::test]
async fn test_publish_without_subscribers_succeeds() {
    let (state, router) = relay();

    publish(&router, "lonely", b"anyone?").await;

    assert_eq!(state.dispatcher.stats().frames_dispatched, 1);
    assert_eq!(state.dispatcher.stats().frames_delivered, 0);
}
