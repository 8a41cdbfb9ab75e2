//! Clipboard content fingerprints.
//!
//! The client never stores clipboard history; it only remembers the hash of
//! the last content it published and the last content it wrote.  Comparing
//! hashes is enough to tell whether a change is new.

use std::fmt;

use bytes::Bytes;

/// 32-byte BLAKE3 digest of clipboard contents.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentFingerprint([u8; 32]);

impl ContentFingerprint {
    /// Hashes `data`.
    pub fn of(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentFingerprint({})", hex::encode(&self.0[..8]))
    }
}

/// Clipboard data paired with its fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardSnapshot {
    pub data: Bytes,
    pub fingerprint: ContentFingerprint,
}

impl ClipboardSnapshot {
    /// Captures `data` and computes its fingerprint.
    pub fn new(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let fingerprint = ContentFingerprint::of(&data);
        Self { data, fingerprint }
    }

    /// Returns `true` if `other` has the same content.
    pub fn same_content(&self, other: &ContentFingerprint) -> bool {
        self.fingerprint == *other
    }
}
