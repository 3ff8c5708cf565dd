//! Authorized API requests with one renewal-and-replay on rejection.

use std::sync::Arc;

use tracing::debug;

use super::renewal::RenewalCoordinator;
use super::store::CredentialStore;
use crate::traits::{Headers, HttpClient, HttpError, Response};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A request relative to the API base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<String>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: &serde_json::Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Some(body.to_string()),
        }
    }
}

/// Issues requests with the current access token attached.
///
/// A 401 or 403 triggers a shared renewal; if it yields a credential the
/// original request is replayed exactly once. Otherwise the original
/// rejection is returned unchanged. Other statuses pass straight through.
pub struct AuthorizedClient {
    http: Arc<dyn HttpClient>,
    store: Arc<CredentialStore>,
    renewal: Arc<RenewalCoordinator>,
    base_url: String,
}

impl AuthorizedClient {
    pub fn new(
        http: Arc<dyn HttpClient>,
        store: Arc<CredentialStore>,
        renewal: Arc<RenewalCoordinator>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            store,
            renewal,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn send(&self, request: &ApiRequest) -> Result<Response, HttpError> {
        let token = self.store.get().map(|c| c.access_token);
        let response = self.issue(request, token.as_deref()).await?;
        if !response.is_auth_rejection() {
            return Ok(response);
        }

        let url = self.url_for(&request.path);
        if url == self.renewal.renewal_url() {
            return Ok(response);
        }

        debug!(
            "{} returned {}; renewing credential before replay",
            request.path, response.status
        );
        match self.renewal.renew().await {
            Ok(renewed) => {
                debug!("Replaying {} with renewed credential", request.path);
                self.issue(request, Some(&renewed.access_token)).await
            }
            Err(e) => {
                debug!("Renewal failed ({}); returning original rejection", e);
                Ok(response)
            }
        }
    }

    async fn issue(
        &self,
        request: &ApiRequest,
        access_token: Option<&str>,
    ) -> Result<Response, HttpError> {
        let url = self.url_for(&request.path);
        let mut headers = Headers::new();
        if let Some(token) = access_token {
            headers.insert("Authorization".to_string(), format!("Bearer {}", token));
        }

        match request.method {
            Method::Get => self.http.get(&url, &headers).await,
            Method::Post => {
                headers.insert("Content-Type".to_string(), "application/json".to_string());
                let body = request.body.as_deref().unwrap_or("{}");
                self.http.post(&url, body, &headers).await
            }
        }
    }
}
