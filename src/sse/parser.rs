//! Line-level parsing for the event-stream text protocol.

use crate::sse::events::{RawFrame, SseLine};

/// Parse a single SSE line into its component type
pub fn parse_sse_line(line: &str) -> SseLine {
    if line.is_empty() {
        return SseLine::Empty;
    }

    if let Some(stripped) = line.strip_prefix(':') {
        return SseLine::Comment(stripped.trim().to_string());
    }

    if let Some(rest) = line.strip_prefix("event:") {
        return SseLine::Event(rest.trim().to_string());
    }

    if let Some(rest) = line.strip_prefix("data:") {
        return SseLine::Data(rest.trim().to_string());
    }

    if let Some(rest) = line.strip_prefix("id:") {
        return SseLine::Id(rest.trim().to_string());
    }

    // Unknown field (e.g. `retry:`) - treat as comment
    SseLine::Comment(line.to_string())
}

/// Stateful parser that accumulates lines and emits complete frames.
#[derive(Debug, Default)]
pub struct FrameParser {
    current_event: Option<String>,
    current_id: Option<String>,
    /// SSE allows multiple data: lines per frame
    data_buffer: Vec<String>,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line (without its terminator).
    ///
    /// Returns a frame when the line was the blank line closing one.
    pub fn feed_line(&mut self, line: &str) -> Option<RawFrame> {
        match parse_sse_line(line) {
            SseLine::Event(name) => {
                self.current_event = Some(name);
                None
            }
            SseLine::Data(data) => {
                self.data_buffer.push(data);
                None
            }
            SseLine::Id(id) => {
                self.current_id = Some(id);
                None
            }
            SseLine::Empty => self.take_frame(),
            SseLine::Comment(_) => None,
        }
    }

    /// True if some fields have been read since the last frame.
    fn has_partial_frame(&self) -> bool {
        self.current_event.is_some() || self.current_id.is_some() || !self.data_buffer.is_empty()
    }

    /// Discard any partially accumulated frame.
    pub(crate) fn reset(&mut self) {
        self.current_event = None;
        self.current_id = None;
        self.data_buffer.clear();
    }

    fn take_frame(&mut self) -> Option<RawFrame> {
        if !self.has_partial_frame() {
            return None;
        }

        let frame = RawFrame {
            event: self.current_event.take(),
            data: self.data_buffer.join("\n"),
            id: self.current_id.take(),
        };
        self.data_buffer.clear();
        Some(frame)
    }
}
