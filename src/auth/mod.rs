//! Credential lifecycle.
//!
//! - [`CredentialStore`] holds the current access/refresh pair and announces changes
//! - [`RenewalCoordinator`] exchanges the refresh token, one request at a time
//! - [`AuthorizedClient`] attaches the token and replays once after renewal
//! - [`RenewalScheduler`] renews ahead of expiry

pub mod renewal;
pub mod retry;
pub mod scheduler;
pub mod store;
pub mod token;

pub use renewal::{RenewalCoordinator, RenewalError, RenewalFuture, RenewalOutcome};
pub use retry::{ApiRequest, AuthorizedClient, Method};
pub use scheduler::RenewalScheduler;
pub use store::{ClearReason, Credential, CredentialChange, CredentialStore};
pub use token::{decode_claims, is_token_expired, is_token_expired_at, redact_token, TokenClaims};
