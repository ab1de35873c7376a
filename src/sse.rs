//! Server-Sent Events (SSE) frame decoding.
//!
//! This module turns an arbitrary sequence of byte chunks into complete
//! SSE frames, independent of where the transport happened to split the
//! stream. Chunk boundaries may fall anywhere, including in the middle of
//! a multi-byte UTF-8 character.
//!
//! SSE format:
//! ```text
//! data: {"content": "some text"}
//!
//! data: {"content": "more text"}
//!
//! data: [DONE]
//! ```

use bytes::{Buf, BytesMut};

/// Terminal marker signalling normal end of stream.
pub const DONE_MARKER: &str = "[DONE]";

/// Incremental decoder from raw byte chunks to complete SSE frames.
///
/// Bytes are accumulated and decoded to text lazily: only the longest
/// valid UTF-8 prefix is moved into the text buffer, so a multi-byte
/// character split across two chunks decodes intact once the second
/// chunk arrives. Frames are delimited by a blank line (`"\n\n"`).
///
/// # Example
/// ```
/// use hackitech_assistant::sse::FrameDecoder;
///
/// let mut decoder = FrameDecoder::new();
/// decoder.push(b"data: {\"content\":\"hi\"}\n\ndata: ");
/// assert_eq!(decoder.next_frame().as_deref(), Some("data: {\"content\":\"hi\"}"));
/// assert_eq!(decoder.next_frame(), None);
///
/// decoder.push(b"[DONE]\n\n");
/// assert_eq!(decoder.next_frame().as_deref(), Some("data: [DONE]"));
/// ```
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Bytes not yet decodable as UTF-8 (at most one partial character).
    pending: BytesMut,
    /// Decoded text not yet split into complete frames.
    buffer: String,
}

impl FrameDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw chunk from the transport.
    ///
    /// Invalid byte sequences decode to U+FFFD and are skipped; an
    /// incomplete trailing sequence is held back until more bytes arrive.
    pub fn push(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(s) => {
                    self.buffer.push_str(s);
                    self.pending.clear();
                    return;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    self.buffer
                        .push_str(std::str::from_utf8(&self.pending[..valid]).unwrap_or(""));
                    match e.error_len() {
                        // Truncated sequence at the end of the chunk: keep
                        // the partial bytes for the next push.
                        None => {
                            self.pending.advance(valid);
                            return;
                        }
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            self.pending.advance(valid + len);
                        }
                    }
                }
            }
        }
    }

    /// Pop the next complete frame, if one is buffered.
    ///
    /// Returns frames in arrival order; the trailing (possibly incomplete)
    /// segment stays buffered for the next [`push`](Self::push).
    pub fn next_frame(&mut self) -> Option<String> {
        let pos = self.buffer.find("\n\n")?;
        let frame = self.buffer[..pos].to_string();
        self.buffer.drain(..pos + 2);
        Some(frame)
    }

    /// Flush the trailing partial frame once the stream has ended.
    ///
    /// Returns `None` when nothing (or only whitespace) remains.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        let rest = rest.trim();
        if rest.is_empty() {
            None
        } else {
            Some(rest.to_string())
        }
    }
}

/// Extract the payload of an SSE frame.
///
/// Strips the `data: ` prefix when present; frames without the prefix are
/// used as-is. Surrounding whitespace is trimmed either way.
///
/// # Example
/// ```
/// use hackitech_assistant::sse::frame_payload;
///
/// assert_eq!(frame_payload("data: {\"content\":\"x\"}"), "{\"content\":\"x\"}");
/// assert_eq!(frame_payload("{\"content\":\"x\"}"), "{\"content\":\"x\"}");
/// ```
pub fn frame_payload(frame: &str) -> &str {
    let frame = frame.trim();
    frame.strip_prefix("data:").map(str::trim).unwrap_or(frame)
}

/// Check whether an SSE payload is the end-of-stream sentinel.
///
/// # Example
/// ```
/// use hackitech_assistant::sse::is_done_marker;
///
/// assert!(is_done_marker("[DONE]"));
/// assert!(!is_done_marker("{\"content\": \"value\"}"));
/// ```
pub fn is_done_marker(payload: &str) -> bool {
    payload == DONE_MARKER
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_payload() {
        assert_eq!(frame_payload("data: hello"), "hello");
        assert_eq!(frame_payload("data: {\"key\": \"value\"}"), "{\"key\": \"value\"}");
        assert_eq!(frame_payload("data:   spaces  "), "spaces");
        assert_eq!(frame_payload("no-prefix"), "no-prefix");
        assert_eq!(frame_payload("  data: padded\n"), "padded");
        assert_eq!(frame_payload(""), "");
    }

    #[test]
    fn test_is_done_marker() {
        assert!(is_done_marker("[DONE]"));
        assert!(!is_done_marker(""));
        assert!(!is_done_marker("data"));
        assert!(!is_done_marker("{\"key\": \"value\"}"));
    }

    #[test]
    fn frame_split_across_chunks() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"data: {\"content\":\"ab");
        assert_eq!(decoder.next_frame(), None);
        decoder.push(b"c\"}\n\n");
        assert_eq!(
            decoder.next_frame().as_deref(),
            Some("data: {\"content\":\"abc\"}")
        );
        assert_eq!(decoder.next_frame(), None);
    }

    #[test]
    fn multiple_frames_in_one_chunk() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"data: one\n\ndata: two\n\ndata: thr");
        assert_eq!(decoder.next_frame().as_deref(), Some("data: one"));
        assert_eq!(decoder.next_frame().as_deref(), Some("data: two"));
        assert_eq!(decoder.next_frame(), None);
        decoder.push(b"ee\n\n");
        assert_eq!(decoder.next_frame().as_deref(), Some("data: three"));
    }

    #[test]
    fn utf8_character_split_across_chunks() {
        // "é" is 0xC3 0xA9; split it mid-codepoint.
        let bytes = "data: {\"content\":\"é\"}\n\n".as_bytes();
        let split = bytes.iter().position(|&b| b == 0xC3).unwrap() + 1;

        let mut decoder = FrameDecoder::new();
        decoder.push(&bytes[..split]);
        assert_eq!(decoder.next_frame(), None);
        decoder.push(&bytes[split..]);

        let frame = decoder.next_frame().unwrap();
        assert!(frame.contains('é'), "decoded frame was {frame:?}");
        assert!(!frame.contains(char::REPLACEMENT_CHARACTER));
    }

    #[test]
    fn invalid_byte_becomes_replacement_character() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"data: a\xFFb\n\n");
        let frame = decoder.next_frame().unwrap();
        assert_eq!(frame, format!("data: a{}b", char::REPLACEMENT_CHARACTER));
    }

    #[test]
    fn finish_flushes_trailing_partial_frame() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"data: complete\n\ndata: trailing");
        assert_eq!(decoder.next_frame().as_deref(), Some("data: complete"));
        assert_eq!(decoder.finish().as_deref(), Some("data: trailing"));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn finish_ignores_whitespace_remainder() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"data: x\n\n\n");
        assert_eq!(decoder.next_frame().as_deref(), Some("data: x"));
        assert_eq!(decoder.finish(), None);
    }
}
