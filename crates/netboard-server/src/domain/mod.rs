//! Domain layer for the relay: configuration only.
//!
//! The relay has no business entities beyond what `netboard_core` already
//! defines (`Frame`, `PeerIdentity`), so this layer just carries
//! [`RelayConfig`].

pub mod config;

pub use config::RelayConfig;
