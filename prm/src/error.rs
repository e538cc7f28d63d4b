//! Error types for prm

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by backend machinery
///
/// A tool that merely exits nonzero is not an error; that outcome travels as a
/// [`ToolExitCode`](crate::ToolExitCode).
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Container engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Tool {tool} not found (image {image})")]
    ToolNotFound { tool: String, image: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Container engine error: {0}")]
    Engine(String),

    #[error("{operation} called while backend is {stage}")]
    InvalidStage { operation: &'static str, stage: String },

    #[error("Interrupted, container {container} removed")]
    Interrupted { container: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    /// Whether the engine itself could not be contacted
    pub fn is_unavailable(&self) -> bool {
        matches!(self, BackendError::EngineUnavailable(_))
    }
}

/// Top-level errors surfaced to the user
#[derive(Debug, Error)]
pub enum PrmError {
    #[error("Selected tool must be in AUTHOR/ID format")]
    InvalidToolRef(String),

    #[error("Unsupported backend: '{0}'. Supported: docker")]
    UnsupportedBackend(String),

    #[error("Unsupported output format: '{0}'. Use: human or json")]
    UnsupportedFormat(String),

    #[error("Invalid Puppet version '{version}': {source}")]
    InvalidVersion {
        version: String,
        #[source]
        source: semver::Error,
    },

    #[error("Failed to load config from {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PrmError {
    /// Process exit code for this error
    ///
    /// Interrupts follow the shell convention of 128 + SIGINT.
    pub fn exit_code(&self) -> i32 {
        match self {
            PrmError::Backend(BackendError::Interrupted { .. }) => 130,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_tool_ref_message() {
        let err = PrmError::InvalidToolRef("foo-bar".to_string());
        assert_eq!(err.to_string(), "Selected tool must be in AUTHOR/ID format");
    }

    #[test]
    fn test_backend_error_is_transparent() {
        let err = PrmError::from(BackendError::EngineUnavailable("socket missing".to_string()));
        assert_eq!(err.to_string(), "Container engine unavailable: socket missing");
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_interrupted_exit_code() {
        let err = PrmError::from(BackendError::Interrupted {
            container: "prm-abc".to_string(),
        });
        assert_eq!(err.exit_code(), 130);
    }

    #[test]
    fn test_is_unavailable() {
        assert!(BackendError::EngineUnavailable("down".to_string()).is_unavailable());
        assert!(!BackendError::Engine("boom".to_string()).is_unavailable());
    }
}
