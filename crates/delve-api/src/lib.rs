//! # delve-api
//!
//! Abstraction over the remote exploration API. The runtime only talks to the
//! [`ApiClient`] trait; [`HttpApiClient`] speaks the JSON-over-HTTP protocol and
//! [`MockApiClient`] serves an in-memory graph for tests.

pub mod client;
pub mod http;
pub mod mock;
pub mod wire;

pub use client::{ApiClient, ApiRequest, ApiResponse, CommandOutcome, CommandResult};
pub use http::HttpApiClient;
pub use mock::{MockApiClient, MockRoom};
