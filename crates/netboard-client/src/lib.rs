//! # netboard-client
//!
//! The client half of netboard: it watches the local clipboard, publishes
//! every change to the relay, and applies changes published by other hosts.
//!
//! # How a remote change reaches this host
//!
//! 1. A subscriber (`transport::websocket` or `transport::chunked`) holds a
//!    long-lived connection to the relay and decodes incoming frames.
//! 2. Decoded payloads are queued for the sync loop.  If the loop falls
//!    behind, new payloads are dropped rather than blocking the connection.
//! 3. The sync loop's remote path reads the local clipboard and writes the
//!    payload only if it differs.
//!
//! Local changes travel the other way: the clipboard watcher reports them,
//! the sync loop's local path skips content it already published, and
//! `HttpPublisher` sends the rest with `POST /publish`.
//!
//! Lost subscriptions are retried forever after a fixed backoff.

/// Domain layer: client configuration.
pub mod domain;

/// Application layer: capability traits and the sync loop.
pub mod application;

/// Infrastructure layer: clipboard backends and relay transports.
pub mod infrastructure;
