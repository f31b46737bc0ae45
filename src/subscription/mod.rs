//! Subscription fetching
//!
//! Retrieves a subscription document, skips it when it is byte-identical to the last one
//! seen, and decodes the links it carries.

mod transport;

pub use transport::{HttpTransport, SubscriptionTransport};

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::link::{self, DecodeError};
use crate::models::ProxyDescriptor;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("subscription URL is not configured")]
    MissingSource,
    #[error("unsupported subscription source: {0}")]
    UnsupportedScheme(String),
    #[error("subscription not modified")]
    NotModified,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("undecodable subscription body: {0}")]
    Body(DecodeError),
    #[error("invalid share link: {0}")]
    Link(DecodeError),
}

impl FetchError {
    /// Faults in the configured source itself, as opposed to transient transport trouble
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            FetchError::MissingSource
                | FetchError::UnsupportedScheme(_)
                | FetchError::Body(_)
                | FetchError::Link(_)
        )
    }
}

/// Fetches and decodes subscriptions, remembering the last body for change detection
pub struct SubscriptionFetcher {
    transport: Arc<dyn SubscriptionTransport>,
    snapshot: Option<String>,
}

impl SubscriptionFetcher {
    pub fn new(transport: Arc<dyn SubscriptionTransport>) -> Self {
        Self {
            transport,
            snapshot: None,
        }
    }

    /// Last successfully fetched document
    pub fn snapshot(&self) -> Option<&str> {
        self.snapshot.as_deref()
    }

    /// Fetch `url` and decode every link it yields
    #[instrument(skip(self))]
    pub async fn fetch(&mut self, url: &str) -> Result<Vec<ProxyDescriptor>, FetchError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(FetchError::MissingSource);
        }

        if link::is_share_link(url) {
            self.check_modified(url)?;
            let descriptor = link::decode(url).map_err(FetchError::Link)?;
            info!("Subscription is a single {} link: {}", descriptor.kind(), descriptor.id());
            return Ok(vec![descriptor]);
        }

        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(FetchError::UnsupportedScheme(url.to_string()));
        }

        let body = self.transport.get(url).await?;
        self.check_modified(&body)?;

        let links = decode_body(&body).map_err(FetchError::Body)?;
        let descriptors = decode_links(&links);
        info!(
            "Subscription decoded: {} proxies from {} links",
            descriptors.len(),
            links.len()
        );
        Ok(descriptors)
    }

    fn check_modified(&mut self, content: &str) -> Result<(), FetchError> {
        if self.snapshot.as_deref() == Some(content) {
            debug!("Subscription content unchanged");
            return Err(FetchError::NotModified);
        }
        self.snapshot = Some(content.to_string());
        Ok(())
    }
}

/// Split a subscription body into link lines.
///
/// Bodies are normally base64 of newline-separated links; line-wrapped base64 is accepted.
/// A body that is already a plain link list is used as is.
fn decode_body(body: &str) -> Result<Vec<String>, DecodeError> {
    let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let text = match link::decode_base64_str(&compact) {
        Ok(text) => text,
        Err(e) if body.lines().any(link::is_share_link) => {
            debug!("Subscription body is not base64 ({}), reading it as plain links", e);
            body.to_string()
        }
        Err(e) => return Err(e),
    };

    Ok(text
        .split('\n')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Decode each link, logging and skipping failures; later duplicates of an id win
fn decode_links(links: &[String]) -> Vec<ProxyDescriptor> {
    let mut by_id = HashMap::new();
    for line in links {
        match link::decode(line) {
            Ok(descriptor) => {
                by_id.insert(descriptor.id().to_string(), descriptor);
            }
            Err(e) => warn!("Skipping link ({}): {}", e, line),
        }
    }

    let mut descriptors: Vec<_> = by_id.into_values().collect();
    descriptors.sort_by(|a, b| a.id().cmp(b.id()));
    descriptors
}
