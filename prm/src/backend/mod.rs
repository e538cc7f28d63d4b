//! Execution backends
//!
//! A backend fetches, validates and runs tools. Exactly one backend is active
//! per run, chosen from a small static registry by the configured
//! [`BackendType`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

mod container;
mod docker;
mod engine;

pub use container::{ContainerBackend, Interrupt, Stage, ctrl_c_or_term};
pub use docker::DockerEngine;
pub use engine::{ContainerEngine, ContainerSpec, EngineInfo, ImageDetails, LogChunk, LogStream};

use crate::config::Config;
use crate::error::{BackendError, PrmError};
use crate::tool::{DirectoryPaths, Tool, ToolExitCode};

/// Names of the available backend implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BackendType {
    #[default]
    Docker,
}

impl BackendType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendType::Docker => "docker",
        }
    }
}

impl FromStr for BackendType {
    type Err = PrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "BackendType::from_str: called");
        match s.to_lowercase().as_str() {
            "docker" => Ok(BackendType::Docker),
            _ => {
                debug!(%s, "BackendType::from_str: unknown backend");
                Err(PrmError::UnsupportedBackend(s.to_string()))
            }
        }
    }
}

impl TryFrom<String> for BackendType {
    type Error = PrmError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BackendType> for String {
    fn from(value: BackendType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Point-in-time health snapshot of a backend
///
/// When the backend is unavailable, `status_msg` carries the reason for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendStatus {
    #[serde(rename = "IsAvailable")]
    pub is_available: bool,
    #[serde(rename = "StatusMsg")]
    pub status_msg: String,
}

impl BackendStatus {
    pub fn available(msg: impl Into<String>) -> Self {
        Self {
            is_available: true,
            status_msg: msg.into(),
        }
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self {
            is_available: false,
            status_msg: msg.into(),
        }
    }
}

/// Capability contract every execution backend implements
///
/// Callers drive one tool per invocation through `get_tool`, `validate` and
/// `exec` in that order. `status` may be called at any time and never fails.
#[async_trait]
pub trait Backend: Send {
    /// Fetch the runnable artifact for `tool`
    async fn get_tool(&mut self, tool: &Tool, config: &Config) -> Result<(), BackendError>;

    /// Check that the fetched tool can run here
    ///
    /// A nonzero code is a tool-level validation failure, not an error.
    async fn validate(&mut self, tool: &Tool) -> Result<ToolExitCode, BackendError>;

    /// Run the tool to completion, streaming its output
    async fn exec(
        &mut self,
        tool: &Tool,
        args: &[String],
        config: &Config,
        paths: &DirectoryPaths,
    ) -> Result<ToolExitCode, BackendError>;

    /// Probe backend availability
    async fn status(&self) -> BackendStatus;
}

/// Create the backend named by the config
pub fn create_backend(config: &Config) -> Result<Box<dyn Backend>, PrmError> {
    debug!(backend = %config.backend, "create_backend: called");
    match config.backend {
        BackendType::Docker => {
            debug!("create_backend: creating Docker backend");
            let engine = DockerEngine::new(&config.docker);
            Ok(Box::new(ContainerBackend::new(Arc::new(engine))))
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_type_parse() {
        assert_eq!("docker".parse::<BackendType>().unwrap(), BackendType::Docker);
        assert_eq!("Docker".parse::<BackendType>().unwrap(), BackendType::Docker);
        assert!(matches!(
            "podman".parse::<BackendType>(),
            Err(PrmError::UnsupportedBackend(name)) if name == "podman"
        ));
    }

    #[test]
    fn test_backend_type_serializes_as_name() {
        assert_eq!(serde_json::to_string(&BackendType::Docker).unwrap(), "\"docker\"");
        assert_eq!(BackendType::Docker.to_string(), "docker");
    }

    #[tokio::test]
    async fn test_registry_creates_docker_backend() {
        let config = Config::default();
        assert!(create_backend(&config).is_ok());
    }
}
