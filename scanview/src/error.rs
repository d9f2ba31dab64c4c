//! Controller error types.
//!
//! Every fallible operation in the controller reports one of these variants.
//! Most of them are recovered locally (logged, operation becomes a no-op);
//! only configuration errors are expected to reach the caller at construction.

use thiserror::Error;

use crate::engine::EngineError;

/// Errors raised by the preset controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// The requested preset name is not in the ordered preset list.
    #[error("Unknown preset '{0}' (expected one of: ultra, high, medium, low)")]
    UnknownPreset(String),

    /// An operation referenced a dataset id that is not registered.
    #[error("Dataset '{0}' not found")]
    NotFound(String),

    /// The rendering engine rejected or failed to materialize a dataset.
    #[error("Failed to load dataset '{name}' from {url}: {source}")]
    LoadFailure {
        name: String,
        url: String,
        #[source]
        source: EngineError,
    },

    /// The controller was configured with invalid values.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ControllerError {
    /// Returns `true` for lookup failures that callers recover from locally.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ControllerError::NotFound(_))
    }
}
