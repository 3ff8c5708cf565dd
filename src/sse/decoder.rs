//! Byte-chunk decoding for the chunked stream transport.
//!
//! Network reads split the stream at arbitrary byte offsets, including in
//! the middle of a line or a multi-byte UTF-8 sequence. [`ChunkDecoder`]
//! holds the trailing partial line until the rest arrives.

use tracing::warn;

use crate::error::StreamError;
use crate::sse::events::RawFrame;
use crate::sse::parser::FrameParser;

/// Longest line buffered while waiting for its terminator.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Default)]
pub struct ChunkDecoder {
    /// Bytes after the last `\n` seen so far.
    pending: Vec<u8>,
    /// Skipping the remainder of a line that already overflowed.
    discarding: bool,
    parser: FrameParser,
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk and return every frame it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<RawFrame> {
        self.pending.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            if self.discarding {
                self.discarding = false;
            } else if end - start > MAX_LINE_BYTES {
                self.drop_line(end - start);
            } else if let Some(frame) = self.feed_raw_line(start, end) {
                frames.push(frame);
            }
            start = end + 1;
        }
        self.pending.drain(..start);

        if self.discarding {
            self.pending.clear();
        } else if self.pending.len() > MAX_LINE_BYTES {
            self.drop_line(self.pending.len());
            self.pending.clear();
            self.discarding = true;
        }
        frames
    }

    /// Flush at end of stream.
    ///
    /// A final line without a terminator is processed, and a frame missing
    /// only its closing blank line is still emitted.
    pub fn finish(&mut self) -> Option<RawFrame> {
        let mut frame = None;
        if std::mem::take(&mut self.discarding) {
            self.pending.clear();
        } else if !self.pending.is_empty() {
            let end = self.pending.len();
            frame = self.feed_raw_line(0, end);
            self.pending.clear();
        }
        frame.or_else(|| self.parser.feed_line(""))
    }

    /// Bytes buffered waiting for a line terminator.
    pub fn buffered_len(&self) -> usize {
        self.pending.len()
    }

    /// Drop an oversized line along with the frame it was part of.
    fn drop_line(&mut self, seen: usize) {
        let err = StreamError::LineTooLong {
            limit: MAX_LINE_BYTES,
        };
        warn!("[{}] {} ({} bytes seen); dropping frame", err.error_code(), err, seen);
        self.parser.reset();
    }

    fn feed_raw_line(&mut self, start: usize, end: usize) -> Option<RawFrame> {
        let mut bytes = &self.pending[start..end];
        if let Some(stripped) = bytes.strip_suffix(b"\r") {
            bytes = stripped;
        }

        let line = match std::str::from_utf8(bytes) {
            Ok(line) => std::borrow::Cow::Borrowed(line),
            Err(e) => {
                warn!("Stream line is not valid UTF-8 ({}), decoding lossily", e);
                String::from_utf8_lossy(bytes)
            }
        };
        self.parser.feed_line(&line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: &str = "event: notification\ndata: {\"id\":\"n-1\"}\n\n";

    #[test]
    fn test_single_chunk() {
        let mut decoder = ChunkDecoder::new();
        let frames = decoder.feed(FRAME.as_bytes());
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("notification"));
        assert_eq!(frames[0].data, "{\"id\":\"n-1\"}");
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn test_every_split_point_yields_exactly_one_frame() {
        let bytes = FRAME.as_bytes();
        for split in 0..=bytes.len() {
            let mut decoder = ChunkDecoder::new();
            let mut frames = decoder.feed(&bytes[..split]);
            frames.extend(decoder.feed(&bytes[split..]));
            assert_eq!(frames.len(), 1, "split at {}", split);
            assert_eq!(frames[0].data, "{\"id\":\"n-1\"}");
        }
    }

    #[test]
    fn test_two_split_points() {
        let bytes = FRAME.as_bytes();
        for first in 0..bytes.len() {
            for second in first..bytes.len() {
                let mut decoder = ChunkDecoder::new();
                let mut frames = decoder.feed(&bytes[..first]);
                frames.extend(decoder.feed(&bytes[first..second]));
                frames.extend(decoder.feed(&bytes[second..]));
                assert_eq!(frames.len(), 1, "split at {} and {}", first, second);
            }
        }
    }

    #[test]
    fn test_split_inside_multibyte_character() {
        let text = "data: {\"title\":\"caf\u{e9} \u{1f389}\"}\n\n";
        let bytes = text.as_bytes();
        let mut decoder = ChunkDecoder::new();
        let emoji_start = text.find('\u{1f389}').unwrap();

        let mut frames = decoder.feed(&bytes[..emoji_start + 2]);
        assert!(frames.is_empty());
        frames.extend(decoder.feed(&bytes[emoji_start + 2..]));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "{\"title\":\"caf\u{e9} \u{1f389}\"}");
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut decoder = ChunkDecoder::new();
        let frames = decoder.feed(b"event: heartbeat\r\ndata: {}\r\n\r\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("heartbeat"));
        assert_eq!(frames[0].data, "{}");
    }

    #[test]
    fn test_many_frames_in_one_chunk() {
        let mut decoder = ChunkDecoder::new();
        let frames = decoder.feed(
            b": hello\n\nevent: connected\ndata: {}\n\nevent: heartbeat\ndata: {}\n\ndata: x",
        );
        assert_eq!(frames.len(), 2);
        assert!(decoder.buffered_len() > 0);
    }

    #[test]
    fn test_finish_flushes_unterminated_frame() {
        let mut decoder = ChunkDecoder::new();
        assert!(decoder.feed(b"event: notification\ndata: {}").is_empty());
        let frame = decoder.finish().unwrap();
        assert_eq!(frame.event.as_deref(), Some("notification"));
        assert_eq!(frame.data, "{}");
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_invalid_utf8_is_decoded_lossily() {
        let mut decoder = ChunkDecoder::new();
        let frames = decoder.feed(b"data: \xff\xfe\n\n");
        assert_eq!(frames.len(), 1);
        assert!(frames[0].data.contains('\u{fffd}'));
    }

    #[test]
    fn test_unterminated_line_is_capped() {
        let mut decoder = ChunkDecoder::new();
        assert!(decoder.feed(b"event: notification\ndata: ").is_empty());
        let filler = vec![b'x'; 64 * 1024];
        for _ in 0..20 {
            assert!(decoder.feed(&filler).is_empty());
            assert!(decoder.buffered_len() <= MAX_LINE_BYTES);
        }
        assert_eq!(decoder.buffered_len(), 0);

        // The tail of the dropped line and its frame are skipped; the next frame decodes.
        let frames = decoder.feed(b"xxx\n\nevent: heartbeat\ndata: {}\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("heartbeat"));
        assert_eq!(frames[0].data, "{}");
    }

    #[test]
    fn test_oversized_line_in_one_chunk_is_dropped() {
        let mut chunk = b"event: notification\ndata: ".to_vec();
        chunk.extend(vec![b'x'; MAX_LINE_BYTES + 1]);
        chunk.extend_from_slice(b"\n\ndata: after\n\n");

        let mut decoder = ChunkDecoder::new();
        let frames = decoder.feed(&chunk);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, None);
        assert_eq!(frames[0].data, "after");
    }

    #[test]
    fn test_finish_while_discarding_emits_nothing() {
        let mut decoder = ChunkDecoder::new();
        decoder.feed(b"data: ");
        decoder.feed(&vec![b'x'; MAX_LINE_BYTES + 1]);
        decoder.feed(b"still the same line");
        assert_eq!(decoder.finish(), None);
    }
}
