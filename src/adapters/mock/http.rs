//! Mock HTTP client for testing.
//!
//! Routes are matched by exact URL first, then by prefix, then fall back to
//! a default. A route is either a fixed [`MockResponse`] or a responder
//! closure that sees the recorded request, which lets a test answer
//! differently depending on the `Authorization` header.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::traits::{ByteStream, Headers, HttpClient, HttpError, Response};

/// A request as seen by the mock.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub headers: Headers,
    pub body: Option<String>,
}

impl RecordedRequest {
    /// The bearer token from the `Authorization` header, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get("Authorization")
            .and_then(|value| value.strip_prefix("Bearer "))
    }
}

/// Canned outcome for a route.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// A complete response (any status).
    Success(Response),
    /// A transport-level failure.
    Error(HttpError),
    /// A streamed body delivered chunk by chunk, then ended.
    Stream(Vec<Bytes>),
}

impl MockResponse {
    /// Shorthand for a JSON response with `status`.
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        MockResponse::Success(Response::new(status, Bytes::from(body.to_string())))
    }

    /// Shorthand for an empty-bodied response with `status`.
    pub fn status(status: u16) -> Self {
        MockResponse::Success(Response::new(status, Bytes::new()))
    }
}

/// Computes a response from the request.
pub type Responder = Arc<dyn Fn(&RecordedRequest) -> MockResponse + Send + Sync>;

#[derive(Clone)]
enum Route {
    Fixed(MockResponse),
    Dynamic(Responder),
}

impl Route {
    fn respond(&self, request: &RecordedRequest) -> MockResponse {
        match self {
            Route::Fixed(response) => response.clone(),
            Route::Dynamic(responder) => responder(request),
        }
    }
}

#[derive(Clone, Default)]
pub struct MockHttpClient {
    routes: Arc<Mutex<HashMap<String, Route>>>,
    default_route: Arc<Mutex<Option<Route>>>,
    delays: Arc<Mutex<HashMap<String, Duration>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_response(&self, url: &str, response: MockResponse) {
        lock(&self.routes).insert(url.to_string(), Route::Fixed(response));
    }

    pub fn set_responder<F>(&self, url: &str, responder: F)
    where
        F: Fn(&RecordedRequest) -> MockResponse + Send + Sync + 'static,
    {
        lock(&self.routes).insert(url.to_string(), Route::Dynamic(Arc::new(responder)));
    }

    pub fn set_default_response(&self, response: MockResponse) {
        *lock(&self.default_route) = Some(Route::Fixed(response));
    }

    /// Hold every response for `url` (prefix match) for `delay`.
    pub fn set_delay(&self, url: &str, delay: Duration) {
        lock(&self.delays).insert(url.to_string(), delay);
    }

    pub fn get_requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    /// Number of recorded requests whose URL starts with `url`.
    pub fn request_count(&self, url: &str) -> usize {
        lock(&self.requests)
            .iter()
            .filter(|r| r.url.starts_with(url))
            .count()
    }

    pub fn clear_requests(&self) {
        lock(&self.requests).clear();
    }

    async fn handle(
        &self,
        method: &str,
        url: &str,
        headers: &Headers,
        body: Option<String>,
    ) -> Option<MockResponse> {
        let request = RecordedRequest {
            method: method.to_string(),
            url: url.to_string(),
            headers: headers.clone(),
            body,
        };
        lock(&self.requests).push(request.clone());

        let delay = lock(&self.delays)
            .iter()
            .find(|(prefix, _)| url.starts_with(prefix.as_str()))
            .map(|(_, delay)| *delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.route_for(url).map(|route| route.respond(&request))
    }

    fn route_for(&self, url: &str) -> Option<Route> {
        let routes = lock(&self.routes);

        if let Some(route) = routes.get(url) {
            return Some(route.clone());
        }

        // Longest prefix wins so more specific routes can shadow general ones
        let prefixed = routes
            .iter()
            .filter(|(pattern, _)| url.starts_with(pattern.as_str()))
            .max_by_key(|(pattern, _)| pattern.len())
            .map(|(_, route)| route.clone());
        if prefixed.is_some() {
            return prefixed;
        }

        lock(&self.default_route).clone()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn get(&self, url: &str, headers: &Headers) -> Result<Response, HttpError> {
        match self.handle("GET", url, headers, None).await {
            Some(MockResponse::Success(response)) => Ok(response),
            Some(MockResponse::Error(err)) => Err(err),
            Some(MockResponse::Stream(_)) => Err(HttpError::Other(
                "Stream response on non-stream request".to_string(),
            )),
            None => Err(HttpError::Other(format!("No mock response for URL: {}", url))),
        }
    }

    async fn post(&self, url: &str, body: &str, headers: &Headers) -> Result<Response, HttpError> {
        match self.handle("POST", url, headers, Some(body.to_string())).await {
            Some(MockResponse::Success(response)) => Ok(response),
            Some(MockResponse::Error(err)) => Err(err),
            Some(MockResponse::Stream(_)) => Err(HttpError::Other(
                "Stream response on non-stream request".to_string(),
            )),
            None => Err(HttpError::Other(format!("No mock response for URL: {}", url))),
        }
    }

    async fn get_stream(&self, url: &str, headers: &Headers) -> Result<ByteStream, HttpError> {
        match self.handle("GET", url, headers, None).await {
            Some(MockResponse::Stream(chunks)) => {
                Ok(Box::pin(futures::stream::iter(
                    chunks.into_iter().map(Ok::<_, HttpError>),
                )))
            }
            Some(MockResponse::Success(response)) if !response.is_success() => {
                Err(HttpError::ServerError {
                    status: response.status,
                    message: response.text().unwrap_or_default(),
                })
            }
            Some(MockResponse::Success(response)) => {
                Ok(Box::pin(futures::stream::iter(vec![Ok::<_, HttpError>(
                    response.body,
                )])))
            }
            Some(MockResponse::Error(err)) => Err(err),
            None => Err(HttpError::Other(format!("No mock response for URL: {}", url))),
        }
    }
}
