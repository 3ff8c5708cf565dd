//! Event-stream (SSE) frame parsing
//!
//! The notification stream uses the text/event-stream format:
//! - `event: <type>` - event type line
//! - `data: <json>` - data payload line (may repeat)
//! - `id: <id>` - event id
//! - Empty line - signals end of a frame
//! - Lines starting with `:` - comments (ignored)
//!
//! # Module structure
//! - `events` - Frame types and [`decode_frame`]
//! - `parser` - Line parsing and the stateful [`FrameParser`]
//! - `decoder` - [`ChunkDecoder`] for raw network chunks

mod decoder;
mod events;
mod parser;

pub use decoder::ChunkDecoder;
pub use events::{
    decode_frame, RawFrame, SseLine, StreamEvent, CONNECTED_EVENT, HEARTBEAT_EVENT,
    NOTIFICATION_EVENT,
};
pub use parser::{parse_sse_line, FrameParser};
