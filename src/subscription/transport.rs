use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::FetchError;
use crate::error::{Result, SwitchError};

/// Source of raw subscription documents
#[async_trait]
pub trait SubscriptionTransport: Send + Sync {
    /// GET `url` and return the body.
    ///
    /// Network failures and unreadable bodies are `FetchError::Transport`, non-2xx
    /// responses are `FetchError::Status`.
    async fn get(&self, url: &str) -> std::result::Result<String, FetchError>;
}

/// Direct HTTP(S) transport
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            // Subscriptions must not be routed through the proxy they configure.
            .no_proxy()
            .build()
            .map_err(|e| SwitchError::InvalidConfig(format!("HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SubscriptionTransport for HttpTransport {
    async fn get(&self, url: &str) -> std::result::Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        debug!("Subscription responded with {}", status);
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::Transport(format!("failed to read body: {}", e)))
    }
}
