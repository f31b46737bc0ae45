//! Activation of a selected proxy
//!
//! The state machine hands the winning descriptor to a [`ConfigSink`] and then verifies the
//! result with a reachability check, so a sink never reports activation success itself.

pub mod template;
mod v2ray;

pub use v2ray::{EngineConfig, V2rayConfigSink};

use async_trait::async_trait;

use crate::error::Result;
use crate::models::ProxyDescriptor;

#[async_trait]
pub trait ConfigSink: Send + Sync {
    /// Make `descriptor` the active outbound. Must be safe to repeat with the same descriptor.
    async fn activate(&self, descriptor: &ProxyDescriptor) -> Result<()>;

    /// Release whatever `activate` started
    async fn shutdown(&self) {}
}
