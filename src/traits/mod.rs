//! Trait abstractions for dependency injection and testability.
//!
//! # Traits
//!
//! - [`HttpClient`] - HTTP client operations (GET, POST, streaming GET)
//! - [`CredentialStorage`] - Durable credential persistence
//! - [`StreamTransport`] - Opening a notification stream session

pub mod credentials;
pub mod http;
pub mod transport;

pub use credentials::{CredentialStorage, StorageError};
pub use http::{is_auth_status, ByteStream, Headers, HttpClient, HttpError, Response};
pub use transport::{FrameStream, StreamTransport, TransportError};
