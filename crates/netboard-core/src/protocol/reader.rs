//! Incremental frame splitter for streamed bodies.
//!
//! A chunked HTTP body arrives as arbitrary byte chunks: one chunk may hold a
//! fraction of a frame, exactly one frame, or several frames back to back.
//! [`FrameReader`] accumulates chunks and yields each complete frame once its
//! delimiter has arrived.

use bytes::{Buf, BytesMut};
use tracing::trace;

use crate::protocol::frame::{decode_frame, FrameError, FRAME_DELIMITER};

/// Default upper bound on a buffered, still-undelimited frame (64 MiB of text).
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Accumulates stream chunks and splits them into decoded payloads.
///
/// # Usage
///
/// ```rust
/// use netboard_core::FrameReader;
///
/// let mut reader = FrameReader::new();
/// reader.push(b"aGk,d29y");
/// reader.push(b"bGQ,");
///
/// assert_eq!(reader.next_frame().unwrap().unwrap(), b"hi");
/// assert_eq!(reader.next_frame().unwrap().unwrap(), b"world");
/// assert!(reader.next_frame().is_none());
/// ```
#[derive(Debug)]
pub struct FrameReader {
    buf: BytesMut,
    max_frame_len: usize,
    /// Bytes before this offset are known not to contain a delimiter.
    scanned: usize,
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReader {
    /// Creates a reader with [`DEFAULT_MAX_FRAME_LEN`].
    pub fn new() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }

    /// Creates a reader that rejects undelimited data longer than `max_frame_len`.
    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            max_frame_len,
            scanned: 0,
        }
    }

    /// Appends a chunk read from the stream.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Number of bytes buffered but not yet returned as a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Returns the next complete frame, if one is buffered.
    ///
    /// - `None` – no delimiter buffered yet; push more data.
    /// - `Some(Ok(payload))` – one frame decoded.
    /// - `Some(Err(FrameError::InvalidEncoding))` – one frame was malformed and
    ///   has been consumed; later frames are unaffected.
    /// - `Some(Err(FrameError::Oversized))` – the undelimited tail exceeded the
    ///   limit.  The buffer is discarded; the caller should drop the stream
    ///   since the next bytes are mid-frame.
    pub fn next_frame(&mut self) -> Option<Result<Vec<u8>, FrameError>> {
        let found = self.buf[self.scanned..]
            .iter()
            .position(|&b| b == FRAME_DELIMITER);

        match found {
            Some(offset) => {
                let end = self.scanned + offset + 1;
                let frame = self.buf.split_to(end);
                self.scanned = 0;
                trace!(len = frame.len(), "split frame from stream");
                Some(decode_frame(&frame))
            }
            None if self.buf.len() > self.max_frame_len => {
                let buffered = self.buf.len();
                self.buf.advance(buffered);
                self.scanned = 0;
                Some(Err(FrameError::Oversized {
                    buffered,
                    limit: self.max_frame_len,
                }))
            }
            None => {
                self.scanned = self.buf.len();
                None
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
