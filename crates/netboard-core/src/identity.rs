//! Peer identity derived from a TLS client certificate.
//!
//! Every publisher and subscriber is identified by the SHA-256 digest of the
//! DER encoding of the certificate it presented during the mutual-TLS
//! handshake, rendered as uppercase hex.  The identity is:
//!
//! - stable for as long as the client keeps the same certificate,
//! - impossible to claim without the matching private key,
//! - independent of anything the client sends after the handshake.
//!
//! The relay uses it as the subscriber key and to exclude a publisher from
//! receiving its own frames.

use std::fmt;

use sha2::{Digest, Sha256};

/// Length in characters of a hex-encoded SHA-256 digest.
pub const IDENTITY_HEX_LEN: usize = 64;

/// Stable identity of a connected peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerIdentity(String);

impl PeerIdentity {
    /// Computes the identity for a DER-encoded certificate.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use netboard_core::PeerIdentity;
    ///
    /// let id = PeerIdentity::from_certificate(b"");
    /// assert_eq!(
    ///     id.as_str(),
    ///     "E3B0C44298FC1C149AFBF4C8996FB92427AE41E4649B934CA495991B7852B855"
    /// );
    /// ```
    pub fn from_certificate(der: &[u8]) -> Self {
        Self(hex::encode_upper(Sha256::digest(der)))
    }

    /// Wraps an already computed identity string.
    ///
    /// Used by tests and by callers that key subscribers on something other
    /// than a certificate (for example a loopback harness).
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(12);
        self.0.get(..end).unwrap_or(&self.0)
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerIdentity {
    fn from(s: &str) -> Self {
        Self::from_string(s)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
