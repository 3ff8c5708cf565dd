//! Event-stream transport built on `eventsource-client`.
//!
//! The access token travels as a `?token=` query parameter, so it can end up
//! in proxy and server logs. Prefer [`ChunkedStreamTransport`] where the
//! server accepts a header.
//!
//! [`ChunkedStreamTransport`]: super::ChunkedStreamTransport

use async_trait::async_trait;
use eventsource_client as es;
use eventsource_client::Client;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::debug;

use crate::auth::redact_token;
use crate::sse::RawFrame;
use crate::traits::{FrameStream, StreamTransport, TransportError};

/// Frames buffered between the reader task and the consumer.
const FRAME_BUFFER: usize = 64;

#[derive(Debug, Clone, Default)]
pub struct EventSourceTransport;

impl EventSourceTransport {
    pub fn new() -> Self {
        Self
    }
}

/// Append the URL-encoded access token as the `token` query parameter.
pub fn url_with_token(url: &str, access_token: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!(
        "{}{}token={}",
        url,
        separator,
        urlencoding::encode(access_token)
    )
}

fn transport_error(err: es::Error) -> TransportError {
    match err {
        es::Error::UnexpectedResponse(status) => {
            let status = status.as_u16();
            if status == 401 || status == 403 {
                TransportError::Unauthorized { status }
            } else {
                TransportError::Rejected {
                    status,
                    message: format!("event source refused with status {}", status),
                }
            }
        }
        other => TransportError::Connection(other.to_string()),
    }
}

#[async_trait]
impl StreamTransport for EventSourceTransport {
    async fn open(&self, url: &str, access_token: &str) -> Result<FrameStream, TransportError> {
        debug!(
            "Opening event source at {} (token {})",
            url,
            redact_token(access_token)
        );
        let client = es::ClientBuilder::for_url(&url_with_token(url, access_token))
            .map_err(|e| TransportError::InvalidUrl(format!("{:?}", e)))?
            // Reconnection is owned by StreamConnection
            .reconnect(es::ReconnectOptions::reconnect(false).build())
            .build();

        let (tx, mut rx) = mpsc::channel(FRAME_BUFFER);
        tokio::spawn(async move {
            let mut events = client.stream();
            loop {
                let item = tokio::select! {
                    _ = tx.closed() => break,
                    item = events.next() => item,
                };
                let frame = match item {
                    None => break,
                    Some(Ok(es::SSE::Event(event))) => Ok(RawFrame {
                        event: Some(event.event_type),
                        data: event.data,
                        id: event.id,
                    }),
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => Err(transport_error(e)),
                };
                let failed = frame.is_err();
                if tx.send(frame).await.is_err() || failed {
                    break;
                }
            }
        });

        // The client connects lazily; the first item tells us whether it opened
        let first = match rx.recv().await {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => return Err(e),
            None => {
                return Err(TransportError::Connection(
                    "event source closed before opening".to_string(),
                ))
            }
        };

        let rest = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(Box::pin(futures::stream::iter([Ok(first)]).chain(rest)))
    }

    fn name(&self) -> &'static str {
        "eventsource"
    }
}
