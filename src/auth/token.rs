//! Access token inspection.
//!
//! Access tokens are three-segment JWTs. Only the middle (claims) segment is
//! read; the signature is the server's concern.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::AuthError;

/// Claims this client reads from an access token.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenClaims {
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "_id")]
    pub object_id: Option<String>,
}

impl TokenClaims {
    /// The user identifier, from `sub`, then `id`, then `_id`.
    pub fn user_id(&self) -> Option<&str> {
        self.sub
            .as_deref()
            .or(self.id.as_deref())
            .or(self.object_id.as_deref())
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// Decode the claims segment of `token`.
pub fn decode_claims(token: &str) -> Result<TokenClaims, AuthError> {
    let mut segments = token.split('.');
    let claims = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(claims), Some(_), None) => claims,
        _ => {
            return Err(AuthError::MalformedToken {
                message: "expected three dot-separated segments".to_string(),
            })
        }
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(claims.trim_end_matches('='))
        .map_err(|e| AuthError::MalformedToken {
            message: format!("claims segment is not base64url: {}", e),
        })?;

    serde_json::from_slice(&bytes).map_err(|e| AuthError::MalformedToken {
        message: format!("claims segment is not valid JSON: {}", e),
    })
}

/// True if `token` expires within `buffer_secs` of now, or cannot be decoded.
pub fn is_token_expired(token: &str, buffer_secs: i64) -> bool {
    is_token_expired_at(token, buffer_secs, Utc::now().timestamp_millis())
}

/// [`is_token_expired`] against an explicit clock, in milliseconds.
pub fn is_token_expired_at(token: &str, buffer_secs: i64, now_millis: i64) -> bool {
    match decode_claims(token) {
        Ok(claims) => {
            claims.exp.saturating_mul(1000) <= now_millis.saturating_add(buffer_secs * 1000)
        }
        Err(_) => true,
    }
}

/// Shorten a token for log output.
pub fn redact_token(token: &str) -> String {
    let prefix: String = token.chars().take(8).collect();
    if prefix.len() < token.len() {
        format!("{}...", prefix)
    } else {
        "***".to_string()
    }
}
