//! Error types for a3s-device

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while dispatching device actions
///
/// A refused permission or an empty picker is not an error: handlers settle
/// those as outcomes (`DialOutcome::PromptOnly`, `PickOutcome::Denied`,
/// `PickOutcome::NoData`) and never surface them to the caller.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Missing, empty, or malformed request parameter
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// Method name not recognized by the bridge
    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    /// Target app or OS feature is absent on this device
    #[error("Native action unavailable: {0}")]
    NativeActionUnavailable(String),

    /// OS gateway failure not covered by the variants above
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// The owning UI session has been torn down
    #[error("Session closed")]
    SessionClosed,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DeviceError {
    /// Wire-level classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeviceError::InvalidParameters(_) | DeviceError::UnknownMethod(_) => {
                ErrorKind::InvalidParameters
            }
            DeviceError::NativeActionUnavailable(_) => ErrorKind::NativeActionUnavailable,
            DeviceError::SessionClosed => ErrorKind::SessionClosed,
            DeviceError::Gateway(_) | DeviceError::Config(_) | DeviceError::Serialization(_) => {
                ErrorKind::Internal
            }
        }
    }
}

/// Serializable error tag carried by [`crate::BridgeOutcome::Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    InvalidParameters,
    NativeActionUnavailable,
    SessionClosed,
    Internal,
}

/// Result type alias for device operations
pub type Result<T> = std::result::Result<T, DeviceError>;
