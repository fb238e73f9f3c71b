use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::error::{Result, ShiftError};

/// The only verbs the remote boundary uses. Anything else is
/// unrepresentable by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Post,
    Patch,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Patch => "PATCH",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Body {
    Empty,
    Json(serde_json::Value),
    Raw(Bytes),
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub body: Body,
}

/// A response that actually arrived, whatever its status.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    /// Server-advised wait from a rate-limit response, in seconds.
    pub retry_after: Option<u64>,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(ShiftError::Json)
    }
}

/// Failure of the underlying transport, before any HTTP status exists.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> std::result::Result<ApiResponse, TransportError>;
}

/// reqwest-backed transport attaching the bearer token to every call.
pub struct HttpTransport {
    client: reqwest::Client,
    token: String,
}

impl HttpTransport {
    pub fn new(timeout: Duration, token: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            token: token.into(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: ApiRequest) -> std::result::Result<ApiResponse, TransportError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
        };

        let mut req = self
            .client
            .request(method, &request.url)
            .bearer_auth(&self.token);

        req = match request.body {
            Body::Empty => req,
            Body::Json(value) => req.json(&value),
            Body::Raw(bytes) => req
                .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                .body(bytes),
        };

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(ApiResponse {
            status,
            retry_after,
            body,
        })
    }
}
