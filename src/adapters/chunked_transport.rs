//! Event-stream transport that decodes the response body itself.
//!
//! Authenticates with an `Authorization: Bearer` header and reassembles
//! frames from raw body chunks with [`ChunkDecoder`].

use async_trait::async_trait;
use futures_util::StreamExt;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

use crate::auth::redact_token;
use crate::sse::{ChunkDecoder, RawFrame};
use crate::traits::{ByteStream, FrameStream, Headers, HttpClient, StreamTransport, TransportError};

pub struct ChunkedStreamTransport {
    http: Arc<dyn HttpClient>,
}

impl ChunkedStreamTransport {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }

    fn stream_headers(access_token: &str) -> Headers {
        let mut headers = Headers::new();
        headers.insert(
            "Authorization".to_string(),
            format!("Bearer {}", access_token),
        );
        headers.insert("Accept".to_string(), "text/event-stream".to_string());
        headers.insert("Cache-Control".to_string(), "no-cache".to_string());
        headers
    }
}

struct DecodeState {
    body: ByteStream,
    decoder: ChunkDecoder,
    ready: VecDeque<Result<RawFrame, TransportError>>,
    done: bool,
}

/// Turn a body byte stream into complete frames.
pub fn decode_body(body: ByteStream) -> FrameStream {
    let state = DecodeState {
        body,
        decoder: ChunkDecoder::new(),
        ready: VecDeque::new(),
        done: false,
    };

    Box::pin(futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.ready.pop_front() {
                return Some((item, state));
            }
            if state.done {
                return None;
            }
            match state.body.next().await {
                Some(Ok(chunk)) => {
                    let frames = state.decoder.feed(&chunk);
                    state.ready.extend(frames.into_iter().map(Ok));
                }
                Some(Err(e)) => {
                    state.done = true;
                    state
                        .ready
                        .push_back(Err(TransportError::Connection(e.to_string())));
                }
                None => {
                    state.done = true;
                    if let Some(frame) = state.decoder.finish() {
                        state.ready.push_back(Ok(frame));
                    }
                }
            }
        }
    }))
}

#[async_trait]
impl StreamTransport for ChunkedStreamTransport {
    async fn open(&self, url: &str, access_token: &str) -> Result<FrameStream, TransportError> {
        debug!(
            "Opening chunked stream at {} (token {})",
            url,
            redact_token(access_token)
        );
        let body = self
            .http
            .get_stream(url, &Self::stream_headers(access_token))
            .await?;
        Ok(decode_body(body))
    }

    fn name(&self) -> &'static str {
        "chunked"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{MockHttpClient, MockResponse};
    use crate::traits::HttpError;
    use bytes::Bytes;

    const STREAM_URL: &str = "http://api.test/v0/notifications/stream";

    fn chunks(parts: &[&str]) -> MockResponse {
        MockResponse::Stream(parts.iter().map(|p| Bytes::from(p.to_string())).collect())
    }

    #[tokio::test]
    async fn test_open_sends_bearer_and_stream_headers() {
        let http = MockHttpClient::new();
        http.set_response(STREAM_URL, chunks(&["event: connected\ndata: {}\n\n"]));
        let transport = ChunkedStreamTransport::new(Arc::new(http.clone()));

        let frames: Vec<_> = transport
            .open(STREAM_URL, "access-1")
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(frames.len(), 1);
        let request = &http.get_requests()[0];
        assert_eq!(request.bearer_token(), Some("access-1"));
        assert_eq!(
            request.headers.get("Accept").map(String::as_str),
            Some("text/event-stream")
        );
        assert_eq!(
            request.headers.get("Cache-Control").map(String::as_str),
            Some("no-cache")
        );
        assert!(!request.url.contains("token="));
    }

    #[tokio::test]
    async fn test_frame_split_mid_line_is_reassembled() {
        let http = MockHttpClient::new();
        http.set_response(
            STREAM_URL,
            chunks(&["event: notifi", "cation\ndata: {\"a\":", "1}\n", "\n"]),
        );
        let transport = ChunkedStreamTransport::new(Arc::new(http));

        let frames: Vec<_> = transport
            .open(STREAM_URL, "t")
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(frames.len(), 1);
        let frame = frames[0].as_ref().unwrap();
        assert_eq!(frame.event.as_deref(), Some("notification"));
        assert_eq!(frame.data, "{\"a\":1}");
    }

    #[tokio::test]
    async fn test_unterminated_final_frame_is_flushed() {
        let http = MockHttpClient::new();
        http.set_response(STREAM_URL, chunks(&["event: heartbeat\ndata: {}"]));
        let transport = ChunkedStreamTransport::new(Arc::new(http));

        let frames: Vec<_> = transport
            .open(STREAM_URL, "t")
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(frames.len(), 1);
        assert_eq!(
            frames[0].as_ref().unwrap().event.as_deref(),
            Some("heartbeat")
        );
    }

    #[tokio::test]
    async fn test_auth_rejection_maps_to_unauthorized() {
        let http = MockHttpClient::new();
        http.set_response(STREAM_URL, MockResponse::status(401));
        let transport = ChunkedStreamTransport::new(Arc::new(http));

        let result = transport.open(STREAM_URL, "stale").await;

        assert!(matches!(
            result,
            Err(TransportError::Unauthorized { status: 401 })
        ));
    }

    #[tokio::test]
    async fn test_body_error_ends_stream_with_error() {
        let body: ByteStream = Box::pin(futures::stream::iter(vec![
            Ok(Bytes::from("data: {}\n\n")),
            Err(HttpError::Io("reset".to_string())),
            Ok(Bytes::from("data: ignored\n\n")),
        ]));

        let frames: Vec<_> = decode_body(body).collect().await;

        assert_eq!(frames.len(), 2);
        assert!(frames[0].is_ok());
        assert!(matches!(frames[1], Err(TransportError::Connection(_))));
    }
}
