//! Domain layer for the client: configuration only.
//!
//! Clipboard contents, frames and fingerprints are already modelled by
//! `netboard_core`; this layer carries [`SubscribeConfig`] and the
//! [`TransportKind`] choice it is built around.

pub mod config;

pub use config::{SubscribeConfig, TransportKind};
