//! subswitch - fastest-proxy selector for v2ray subscriptions
//!
//! Keeps a local v2ray/v2fly engine pointed at the fastest reachable proxy from a
//! subscription.
//!
//! ## Features
//!
//! - `ss://` (legacy and SIP002) and `vmess://` share link decoding
//! - Base64 subscription documents with change detection
//! - Concurrent TCP latency probing with failure-based eviction
//! - Engine config generation and process restart on every switch
//! - Reachability verification through the activated proxy

pub mod check;
pub mod config;
pub mod error;
pub mod link;
pub mod models;
pub mod probe;
pub mod sink;
pub mod subscription;
pub mod switcher;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Config;
pub use error::{Result, SwitchError};
