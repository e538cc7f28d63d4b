//! Container engine client abstraction
//!
//! The container backend only needs a handful of engine operations. Keeping
//! them behind a trait lets tests drive the backend without a running engine.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::BackendError;

/// Engine identity reported by a successful ping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInfo {
    pub version: String,
    pub api_version: String,
}

/// The parts of an image inspection the backend cares about
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageDetails {
    pub entrypoint: Vec<String>,
    pub cmd: Vec<String>,
    pub labels: HashMap<String, String>,
}

impl ImageDetails {
    /// Whether the image defines something to run
    pub fn is_runnable(&self) -> bool {
        !self.entrypoint.is_empty() || !self.cmd.is_empty()
    }
}

/// Everything needed to create a tool container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub args: Vec<String>,
    /// `host:container:mode` bind specifications
    pub binds: Vec<String>,
    pub working_dir: String,
}

/// One piece of container output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogChunk {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
}

pub type LogStream<'a> = BoxStream<'a, Result<LogChunk, BackendError>>;

/// Engine operations used by the container backend
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    async fn ping(&self) -> Result<EngineInfo, BackendError>;

    /// Inspect a local image; [`BackendError::NotFound`] when absent
    async fn inspect_image(&self, image: &str) -> Result<ImageDetails, BackendError>;

    /// Pull an image; [`BackendError::NotFound`] when the registry has no such image
    async fn pull_image(&self, image: &str) -> Result<(), BackendError>;

    /// Create a container and return its id
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, BackendError>;

    async fn start_container(&self, id: &str) -> Result<(), BackendError>;

    /// Follow container output until it exits
    fn logs<'a>(&'a self, id: &str) -> LogStream<'a>;

    /// Block until the container exits and return its exit code
    async fn wait_container(&self, id: &str) -> Result<i64, BackendError>;

    /// Force-remove a container, stopping it if still running
    async fn remove_container(&self, id: &str) -> Result<(), BackendError>;
}
