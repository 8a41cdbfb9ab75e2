//! Integration tests for the frame codec as seen by a stream consumer.
//!
//! These tests exercise `Frame` and `FrameReader` through the crate's public
//! API the same way the chunked transport uses them: the server encodes one
//! frame per clipboard update and writes it to a long-lived body; the client
//! receives the body in arbitrarily sized chunks and must recover exactly the
//! payloads that were sent, in order.
//!
//! ```text
//! server: encode(p1) ++ encode(p2) ++ encode(p3) ...
//!            │ network re-chunks the bytes however it likes
//!            ▼
//! client: push(chunk) ; while let Some(f) = next_frame() { ... }
//! ```

use netboard_core::{decode_frame, Frame, FrameReader, FRAME_DELIMITER};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn stream_of(payloads: &[&[u8]]) -> Vec<u8> {
    payloads
        .iter()
        .flat_map(|p| Frame::encode(p).into_bytes().to_vec())
        .collect()
}

fn read_all(chunks: impl IntoIterator<Item = Vec<u8>>) -> Vec<Vec<u8>> {
    let mut reader = FrameReader::new();
    let mut out = Vec::new();
    for chunk in chunks {
        reader.push(&chunk);
        while let Some(frame) = reader.next_frame() {
            out.push(frame.expect("valid frame"));
        }
    }
    out
}

// ── Stream splitting ──────────────────────────────────────────────────────────

/// A body of `"<frame1>,<frame2>,"` yields exactly two payloads in order.
#[test]
fn test_two_frame_body_yields_two_payloads_in_order() {
    // Arrange
    let body = stream_of(&[b"one", b"two"]);

    // Act
    let payloads = read_all([body]);

    // Assert
    assert_eq!(payloads, vec![b"one".to_vec(), b"two".to_vec()]);
}

/// Re-chunking the same body at every possible chunk size never changes the
/// decoded result.
#[test]
fn test_any_chunk_size_recovers_the_same_payloads() {
    let payloads: [&[u8]; 4] = [b"", b"a", b"clipboard text with spaces", &[0xFF; 300]];
    let body = stream_of(&payloads);
    let expected: Vec<Vec<u8>> = payloads.iter().map(|p| p.to_vec()).collect();

    for size in 1..=body.len() {
        let chunks = body.chunks(size).map(<[u8]>::to_vec);
        assert_eq!(read_all(chunks), expected, "chunk size {size}");
    }
}

/// Binary payloads containing the delimiter byte itself survive because the
/// delimiter only appears in the encoded form as a terminator.
#[test]
fn test_payload_containing_commas_is_not_split() {
    let payload = b"a,b,,c,";
    let body = stream_of(&[payload]);

    assert_eq!(
        body.iter().filter(|&&b| b == FRAME_DELIMITER).count(),
        1,
        "only the terminator may be a delimiter on the wire"
    );
    assert_eq!(read_all([body]), vec![payload.to_vec()]);
}

// ── WebSocket message form ────────────────────────────────────────────────────

/// WebSocket messages carry the encoded frame including its trailing `,`.
/// Stripping and decoding must give the original payload.
#[test]
fn test_message_form_decodes_with_trailing_delimiter() {
    let frame = Frame::encode("héllo wörld".as_bytes());
    let text = frame.to_text();

    assert!(text.ends_with(','));
    assert_eq!(decode_frame(text.as_bytes()).unwrap(), "héllo wörld".as_bytes());
}
