use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the viewer library.
///
/// Only [`ViewerError::ContextUnavailable`] aborts start-up. Model failures
/// are logged and the affected instances are left out of composed frames.
#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("graphics context unavailable: {0}")]
    ContextUnavailable(String),

    #[error("failed to load model {name}: {reason}")]
    ModelLoad { name: String, reason: String },

    #[error("model {name} is malformed: {reason}")]
    InvalidModel { name: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("GPU is out of memory")]
    GpuOutOfMemory,
}

impl ViewerError {
    pub(crate) fn invalid_model(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidModel {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// Returns true when the error should stop initialization.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ContextUnavailable(_) | Self::GpuOutOfMemory)
    }
}
