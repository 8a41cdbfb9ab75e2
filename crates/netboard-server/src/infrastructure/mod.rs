//! Infrastructure layer for the relay.
//!
//! Contains the network-facing adapters that feed the dispatcher.
//!
//! **Dependency rule**: this layer may depend on `application`, `domain` and
//! `netboard_core`, but MUST NOT be imported by them.
//!
//! # Sub-modules
//!
//! - **`listener`** – TCP accept loop, mutual-TLS handshake, identity
//!   extraction and per-connection HTTP serving with graceful shutdown.
//!
//! - **`http`** – The router and the publish handler.
//!
//! - **`subscriber`** – The `FrameSink` abstraction and the single pump loop
//!   that moves frames from a subscription to a transport.
//!
//! - **`chunked`** – `FrameSink` over a never-ending chunked response body.
//!
//! - **`websocket`** – `FrameSink` over an upgraded WebSocket, with
//!   ping/pong keepalive.

pub mod chunked;
pub mod http;
pub mod listener;
pub mod subscriber;
pub mod websocket;

pub use http::{build_router, RelayState};
pub use listener::{RelayError, RelayServer};
