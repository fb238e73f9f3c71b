//! Remote-store operations with bounded retry and rate-limit backoff.

mod client;
mod transport;

pub use client::{
    sanitize_filename, CallOutcome, Endpoints, RetryPolicy, RetryingApiClient, StoredItem,
};
pub use transport::{ApiRequest, ApiResponse, Body, HttpTransport, Method, Transport, TransportError};
