use thiserror::Error;

use crate::link::DecodeError;
use crate::probe::ProbeError;
use crate::subscription::FetchError;

/// Unified error type for the subswitch daemon
#[derive(Error, Debug)]
pub enum SwitchError {
    // Component errors
    #[error("Link decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("Subscription fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Probe failed: {0}")]
    Probe(#[from] ProbeError),

    // Activation errors
    #[error("Config sink failed: {0}")]
    Sink(String),

    #[error("Reachability check failed: {0}")]
    Check(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for subswitch operations
pub type Result<T> = std::result::Result<T, SwitchError>;

impl SwitchError {
    /// Configuration faults are not fixed by retrying until the operator intervenes
    pub fn is_configuration_error(&self) -> bool {
        match self {
            SwitchError::InvalidConfig(_) => true,
            SwitchError::Fetch(e) => e.is_configuration_error(),
            _ => false,
        }
    }
}

impl From<url::ParseError> for SwitchError {
    fn from(err: url::ParseError) -> Self {
        SwitchError::InvalidConfig(err.to_string())
    }
}
