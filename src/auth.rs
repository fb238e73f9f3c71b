//! Bearer-token acquisition, treated as a black-box capability.

use async_trait::async_trait;

use crate::error::{Result, ShiftError};

#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn bearer_token(&self) -> Result<String>;
}

/// Token handed in directly (tests, pre-acquired credentials).
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn bearer_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}

/// Token read from an environment variable at startup.
pub struct EnvTokenProvider {
    var: String,
}

impl EnvTokenProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl TokenProvider for EnvTokenProvider {
    async fn bearer_token(&self) -> Result<String> {
        match std::env::var(&self.var) {
            Ok(token) if !token.trim().is_empty() => Ok(token),
            _ => Err(ShiftError::Auth(format!(
                "no bearer token in environment variable {}",
                self.var
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_provider_returns_token() {
        let provider = StaticTokenProvider::new("tok-123");
        assert_eq!(provider.bearer_token().await.unwrap(), "tok-123");
    }

    #[tokio::test]
    async fn env_provider_rejects_missing_variable() {
        let provider = EnvTokenProvider::new("DOCSHIFT_TEST_TOKEN_UNSET");
        let err = provider.bearer_token().await.unwrap_err();
        assert!(matches!(err, ShiftError::Auth(_)));
    }
}
