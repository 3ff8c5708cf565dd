//! Scripted stream transport for testing.
//!
//! Each call to `open` consumes the next queued [`MockSession`]. When the
//! queue is empty the open fails with a connection error, which lets a test
//! observe backoff without scripting every attempt.

use async_trait::async_trait;
use futures_util::StreamExt;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::sse::RawFrame;
use crate::traits::{FrameStream, StreamTransport, TransportError};

/// Sender half for a [`MockSession::Channel`] session.
pub type FrameSender = mpsc::UnboundedSender<Result<RawFrame, TransportError>>;

/// What one `open` call does.
#[derive(Debug)]
pub enum MockSession {
    /// Fail the open.
    Reject(TransportError),
    /// Open, deliver these frames, then end the stream.
    Frames(Vec<RawFrame>),
    /// Open, deliver these frames, then stay open and silent.
    Hold(Vec<RawFrame>),
    /// Open and deliver whatever the test sends; ends when the sender drops.
    Channel(mpsc::UnboundedReceiver<Result<RawFrame, TransportError>>),
}

impl MockSession {
    /// A channel-driven session and the sender that feeds it.
    pub fn channel() -> (FrameSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, MockSession::Channel(rx))
    }
}

/// A recorded `open` call.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenRecord {
    pub url: String,
    pub access_token: String,
    pub opened_at: Instant,
}

#[derive(Clone, Default)]
pub struct MockTransport {
    sessions: Arc<Mutex<VecDeque<MockSession>>>,
    opens: Arc<Mutex<Vec<OpenRecord>>>,
    open_delay: Arc<Mutex<Option<Duration>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_session(&self, session: MockSession) {
        lock(&self.sessions).push_back(session);
    }

    /// Delay every open by `delay` before it resolves.
    pub fn set_open_delay(&self, delay: Duration) {
        *lock(&self.open_delay) = Some(delay);
    }

    pub fn opens(&self) -> Vec<OpenRecord> {
        lock(&self.opens).clone()
    }

    pub fn open_count(&self) -> usize {
        lock(&self.opens).len()
    }

    pub fn last_token(&self) -> Option<String> {
        lock(&self.opens).last().map(|o| o.access_token.clone())
    }
}

#[async_trait]
impl StreamTransport for MockTransport {
    async fn open(&self, url: &str, access_token: &str) -> Result<FrameStream, TransportError> {
        lock(&self.opens).push(OpenRecord {
            url: url.to_string(),
            access_token: access_token.to_string(),
            opened_at: Instant::now(),
        });

        let delay = *lock(&self.open_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let session = lock(&self.sessions).pop_front();
        match session {
            None => Err(TransportError::Connection(
                "no scripted session".to_string(),
            )),
            Some(MockSession::Reject(err)) => Err(err),
            Some(MockSession::Frames(frames)) => Ok(Box::pin(futures::stream::iter(
                frames.into_iter().map(Ok::<_, TransportError>),
            ))),
            Some(MockSession::Hold(frames)) => Ok(Box::pin(
                futures::stream::iter(frames.into_iter().map(Ok::<_, TransportError>))
                    .chain(futures::stream::pending()),
            )),
            Some(MockSession::Channel(rx)) => {
                Ok(Box::pin(futures::stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|item| (item, rx))
                })))
            }
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sessions_play_in_order() {
        let transport = MockTransport::new();
        transport.push_session(MockSession::Reject(TransportError::Unauthorized {
            status: 401,
        }));
        transport.push_session(MockSession::Frames(vec![RawFrame::heartbeat()]));

        assert!(transport.open("u", "t1").await.is_err());
        let frames: Vec<_> = transport.open("u", "t2").await.unwrap().collect().await;
        assert_eq!(frames.len(), 1);
        assert!(transport.open("u", "t3").await.is_err());

        assert_eq!(transport.open_count(), 3);
        assert_eq!(transport.last_token().as_deref(), Some("t3"));
    }

    #[tokio::test]
    async fn test_channel_session() {
        let transport = MockTransport::new();
        let (tx, session) = MockSession::channel();
        transport.push_session(session);

        let mut frames = transport.open("u", "t").await.unwrap();
        tx.send(Ok(RawFrame::heartbeat())).unwrap();
        assert!(frames.next().await.unwrap().is_ok());
        drop(tx);
        assert!(frames.next().await.is_none());
    }
}
