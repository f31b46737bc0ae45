//! Post-activation reachability check

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Result, SwitchError};

/// Verifies traffic actually flows through the activated proxy
#[async_trait]
pub trait ReachabilityCheck: Send + Sync {
    /// One attempt; returns the HTTP status received
    async fn check(&self) -> Result<u16>;
}

/// GET a well-known URL through the local HTTP inbound
pub struct HttpProxyCheck {
    client: reqwest::Client,
    url: String,
}

impl HttpProxyCheck {
    pub fn new(url: &str, http_port: u16, timeout: Duration) -> Result<Self> {
        let proxy = reqwest::Proxy::all(format!("http://127.0.0.1:{}", http_port))
            .map_err(|e| SwitchError::InvalidConfig(format!("check proxy: {}", e)))?;
        let client = reqwest::Client::builder()
            .proxy(proxy)
            .timeout(timeout)
            .build()
            .map_err(|e| SwitchError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ReachabilityCheck for HttpProxyCheck {
    async fn check(&self) -> Result<u16> {
        // Any response at all proves the tunnel works, whatever the status.
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| SwitchError::Check(e.to_string()))?;
        let status = response.status().as_u16();
        debug!("Check {} answered {}", self.url, status);
        Ok(status)
    }
}
