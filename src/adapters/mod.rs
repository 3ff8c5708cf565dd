//! Concrete implementations of the trait seams in `crate::traits`.
//!
//! # Adapters
//!
//! - [`ReqwestHttpClient`] - HTTP client using reqwest
//! - [`FileCredentialStorage`] - JSON file credential storage
//! - [`EventSourceTransport`] - stream via `eventsource-client`, token in the query
//! - [`ChunkedStreamTransport`] - stream via any [`HttpClient`](crate::traits::HttpClient), token in a header
//!
//! The [`mock`] submodule provides test doubles for each seam.

pub mod chunked_transport;
pub mod eventsource_transport;
pub mod file_credentials;
pub mod mock;
pub mod reqwest_http;

pub use chunked_transport::ChunkedStreamTransport;
pub use eventsource_transport::EventSourceTransport;
pub use file_credentials::FileCredentialStorage;
pub use mock::{InMemoryCredentialStorage, MockHttpClient, MockTransport};
pub use reqwest_http::ReqwestHttpClient;
