//! # netboard-server
//!
//! The netboard relay: a pub/sub broker for clipboard frames served over
//! mutually authenticated TLS.
//!
//! # How a clipboard change travels through the relay
//!
//! 1. A client `POST`s the raw clipboard bytes to `/publish`.
//! 2. The listener already knows who the client is: the SHA-256 fingerprint
//!    of the certificate it used during the TLS handshake.
//! 3. The publish handler encodes the bytes as one frame and asks the
//!    [`application::Dispatcher`] to offer it to every subscriber except the
//!    publisher.
//! 4. Each subscriber's connection task (chunked body or WebSocket) pulls the
//!    frame from its queue and writes it to the wire.
//!
//! Slow subscribers never hold anyone up: when a subscriber's queue is full
//! the frame is simply dropped for that subscriber.

/// Domain layer: relay configuration.
pub mod domain;

/// Application layer: the dispatcher.
pub mod application;

/// Infrastructure layer: TLS listener, HTTP routes and streaming transports.
pub mod infrastructure;
