//! # netboard-core
//!
//! Shared library for netboard containing the wire frame codec, the
//! certificate-derived peer identity, and clipboard content fingerprints.
//!
//! This crate is used by both the relay server and the client.
//! It has no dependencies on sockets, TLS stacks, or clipboard APIs.
//!
//! # Architecture overview
//!
//! netboard shares one logical clipboard between several hosts.  Every host
//! runs a client that publishes local clipboard changes to a central relay;
//! the relay fans each change out to every *other* connected client.
//!
//! This crate (`netboard-core`) is the shared foundation.  It defines:
//!
//! - **`protocol`** – How clipboard payloads travel inside a byte stream.
//!   Each payload is encoded as unpadded base64url text followed by a single
//!   `,` delimiter.  Because `,` is not part of the base64url alphabet, a
//!   reader can split an endless stream into frames without length prefixes.
//!
//! - **`identity`** – The identity of a connected peer: the SHA-256 digest of
//!   the DER bytes of its TLS client certificate, hex encoded.
//!
//! - **`fingerprint`** – A fast BLAKE3 hash of clipboard contents used by the
//!   client to suppress echo and redundant publishes.

pub mod fingerprint;
pub mod identity;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `netboard_core::Frame` instead of `netboard_core::protocol::frame::Frame`.
pub use fingerprint::{ClipboardSnapshot, ContentFingerprint};
pub use identity::PeerIdentity;
pub use protocol::frame::{decode_frame, Frame, FrameError, FRAME_DELIMITER};
pub use protocol::reader::FrameReader;
