//! Frame codec for clipboard payloads.
//!
//! Wire format:
//! ```text
//! [base64url(payload), no padding][',']
//! ```
//! The delimiter byte `,` never occurs in base64url output, so a stream of
//! frames can be split on `,` alone.  An empty payload encodes to a lone `,`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bytes::Bytes;
use thiserror::Error;

/// Byte that terminates every encoded frame on the wire.
pub const FRAME_DELIMITER: u8 = b',';

/// Errors that can occur while decoding frames.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FrameError {
    /// The frame body is not valid unpadded base64url.
    #[error("invalid frame encoding: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),

    /// A partial frame grew past the reader's buffer limit without a delimiter.
    #[error("frame exceeds {limit} bytes without a delimiter (buffered {buffered})")]
    Oversized { buffered: usize, limit: usize },
}

/// One clipboard payload in its wire representation.
///
/// The encoded bytes live in a [`Bytes`] buffer, so cloning a `Frame` to hand
/// it to many subscribers only bumps a reference count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    wire: Bytes,
}

impl Frame {
    /// Encodes `payload` into a delimited wire frame.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use netboard_core::Frame;
    ///
    /// let frame = Frame::encode(b"hi");
    /// assert_eq!(frame.as_bytes(), b"aGk,");
    /// assert_eq!(frame.decode().unwrap(), b"hi");
    /// ```
    pub fn encode(payload: &[u8]) -> Self {
        let mut text = String::with_capacity(encoded_len(payload.len()) + 1);
        URL_SAFE_NO_PAD.encode_string(payload, &mut text);
        text.push(FRAME_DELIMITER as char);
        Self {
            wire: Bytes::from(text),
        }
    }

    /// Returns the wire bytes, including the trailing delimiter.
    pub fn as_bytes(&self) -> &[u8] {
        &self.wire
    }

    /// Consumes the frame and returns the shared wire buffer.
    pub fn into_bytes(self) -> Bytes {
        self.wire
    }

    /// Returns the wire bytes as text.  Encoded frames are always ASCII.
    pub fn to_text(&self) -> String {
        String::from_utf8_lossy(&self.wire).into_owned()
    }

    /// Length of the wire representation in bytes.
    pub fn wire_len(&self) -> usize {
        self.wire.len()
    }

    /// Decodes the frame back into its raw payload.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::InvalidEncoding`] if the body is not valid
    /// unpadded base64url.
    pub fn decode(&self) -> Result<Vec<u8>, FrameError> {
        decode_frame(&self.wire)
    }
}

/// Decodes one wire frame, with or without its trailing delimiter.
///
/// WebSocket messages carry the delimiter although the message boundary
/// already delimits them; the stream reader strips it before calling this.
/// Both forms are accepted.
///
/// # Errors
///
/// Returns [`FrameError::InvalidEncoding`] if the remaining text is not valid
/// unpadded base64url.
pub fn decode_frame(wire: &[u8]) -> Result<Vec<u8>, FrameError> {
    let body = wire.strip_suffix(&[FRAME_DELIMITER]).unwrap_or(wire);
    Ok(URL_SAFE_NO_PAD.decode(body)?)
}

/// Number of base64 characters produced for `n` input bytes without padding.
fn encoded_len(n: usize) -> usize {
    (n * 4 + 2) / 3
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_appends_single_delimiter() {
        // Arrange / Act
        let frame = Frame::encode(b"hello");

        // Assert
        assert_eq!(frame.as_bytes(), b"aGVsbG8,");
        assert_eq!(
            frame.as_bytes().iter().filter(|&&b| b == FRAME_DELIMITER).count(),
            1
        );
    }

    #[test]
    fn test_encode_empty_payload_is_lone_delimiter() {
        let frame = Frame::encode(b"");
        assert_eq!(frame.as_bytes(), b",");
        assert_eq!(frame.decode().unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_encode_uses_url_safe_alphabet_without_padding() {
        // 0xFB 0xFF encodes to "+/8=" in the standard alphabet.
        let frame = Frame::encode(&[0xFB, 0xFF]);
        assert_eq!(frame.as_bytes(), b"-_8,");
    }

    #[test]
    fn test_every_byte_value_survives_round_trip() {
        // Arrange: a payload containing all 256 byte values, twice
        let payload: Vec<u8> = (0..=255u8).chain(0..=255u8).collect();

        // Act
        let frame = Frame::encode(&payload);

        // Assert
        assert!(!frame.as_bytes()[..frame.wire_len() - 1].contains(&FRAME_DELIMITER));
        assert_eq!(frame.decode().unwrap(), payload);
    }

    #[test]
    fn test_round_trip_across_padding_boundaries() {
        // Lengths 0..=7 cover all three base64 remainder cases twice.
        for len in 0..8usize {
            let payload: Vec<u8> = (0..len as u8).map(|b| b.wrapping_mul(37)).collect();
            let frame = Frame::encode(&payload);
            assert_eq!(frame.wire_len(), encoded_len(len) + 1, "len {len}");
            assert_eq!(frame.decode().unwrap(), payload, "len {len}");
        }
    }

    #[test]
    fn test_decode_frame_accepts_missing_delimiter() {
        assert_eq!(decode_frame(b"aGk").unwrap(), b"hi");
        assert_eq!(decode_frame(b"aGk,").unwrap(), b"hi");
    }

    #[test]
    fn test_decode_frame_rejects_invalid_characters() {
        // Arrange: '*' is outside the base64url alphabet
        let result = decode_frame(b"a*Gk,");

        // Assert
        assert!(matches!(result, Err(FrameError::InvalidEncoding(_))));
    }

    #[test]
    fn test_decode_frame_rejects_padding() {
        assert!(decode_frame(b"aGk=,").is_err());
    }

    #[test]
    fn test_to_text_matches_wire_bytes() {
        let frame = Frame::encode(b"world");
        assert_eq!(frame.to_text(), "d29ybGQ,");
        assert_eq!(frame.wire_len(), 8);
    }

    #[test]
    fn test_clone_shares_wire_buffer() {
        let frame = Frame::encode(b"shared");
        let clone = frame.clone();
        assert_eq!(frame.as_bytes().as_ptr(), clone.as_bytes().as_ptr());
    }
}
