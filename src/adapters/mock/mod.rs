//! Mock implementations for testing.
//!
//! - [`MockHttpClient`] - HTTP client with configurable responses
//! - [`InMemoryCredentialStorage`] - In-memory credential storage
//! - [`MockTransport`] - Scripted stream sessions

pub mod credentials;
pub mod http;
pub mod transport;

pub use credentials::InMemoryCredentialStorage;
pub use http::{MockHttpClient, MockResponse, RecordedRequest, Responder};
pub use transport::{FrameSender, MockSession, MockTransport, OpenRecord};
