//! Docker engine client built on bollard

use std::time::Duration;

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config as ContainerConfig, CreateContainerOptions, LogOutput, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, WaitContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::image::CreateImageOptions;
use bollard::models::HostConfig;
use futures::StreamExt;
use futures::stream;
use tracing::{debug, info};

use super::engine::{ContainerEngine, ContainerSpec, EngineInfo, ImageDetails, LogChunk, LogStream};
use crate::config::DockerConfig;
use crate::error::BackendError;

/// Client-side request timeout for run operations
///
/// `wait` and `logs` stay open for the whole tool run. Probes are bounded
/// separately by `DockerConfig::timeout_secs`.
const RUN_TIMEOUT_SECS: u64 = 60 * 60 * 24;

/// Docker Engine API client
pub struct DockerEngine {
    client: Result<Docker, String>,
    probe_timeout: Duration,
}

impl DockerEngine {
    /// Build a client for the configured host
    ///
    /// Never fails: a client that cannot be constructed reports itself as
    /// unavailable on first use.
    pub fn new(config: &DockerConfig) -> Self {
        debug!(host = ?config.host, timeout_secs = config.timeout_secs, "DockerEngine::new: called");
        let client = connect(config).map_err(|e| {
            debug!(error = %e, "DockerEngine::new: failed to construct client");
            e.to_string()
        });
        Self {
            client,
            probe_timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    fn client(&self) -> Result<&Docker, BackendError> {
        self.client
            .as_ref()
            .map_err(|e| BackendError::EngineUnavailable(e.clone()))
    }
}

fn connect(config: &DockerConfig) -> Result<Docker, DockerError> {
    match config.host.as_deref() {
        Some(host) if host.starts_with("unix://") || host.starts_with("npipe://") => {
            Docker::connect_with_socket(host, RUN_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
        }
        Some(host) => Docker::connect_with_http(host, RUN_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION),
        None => Docker::connect_with_local_defaults().map(|d| d.with_timeout(Duration::from_secs(RUN_TIMEOUT_SECS))),
    }
}

/// Map bollard errors onto the backend taxonomy
///
/// Server responses mean the engine is reachable; anything else (socket,
/// transport, timeout) means it is not.
fn classify(err: DockerError) -> BackendError {
    match err {
        DockerError::DockerResponseServerError {
            status_code: 404,
            message,
        } => BackendError::NotFound(message),
        DockerError::DockerResponseServerError { status_code, message } => {
            BackendError::Engine(format!("{}: {}", status_code, message))
        }
        DockerError::DockerStreamError { error } if is_missing_image(&error) => BackendError::NotFound(error),
        DockerError::DockerStreamError { error } => BackendError::Engine(error),
        other => BackendError::EngineUnavailable(other.to_string()),
    }
}

fn is_missing_image(message: &str) -> bool {
    let message = message.to_lowercase();
    ["not found", "manifest unknown", "pull access denied", "does not exist"]
        .iter()
        .any(|needle| message.contains(needle))
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn ping(&self) -> Result<EngineInfo, BackendError> {
        debug!("DockerEngine::ping: called");
        let client = self.client()?;
        let version = match tokio::time::timeout(self.probe_timeout, client.version()).await {
            Ok(result) => result.map_err(classify)?,
            Err(_) => {
                debug!(timeout = ?self.probe_timeout, "DockerEngine::ping: timed out");
                return Err(BackendError::EngineUnavailable(format!(
                    "no response from engine within {}s",
                    self.probe_timeout.as_secs()
                )));
            }
        };
        Ok(EngineInfo {
            version: version.version.unwrap_or_else(|| "unknown".to_string()),
            api_version: version.api_version.unwrap_or_else(|| "unknown".to_string()),
        })
    }

    async fn inspect_image(&self, image: &str) -> Result<ImageDetails, BackendError> {
        debug!(%image, "DockerEngine::inspect_image: called");
        let inspect = self.client()?.inspect_image(image).await.map_err(classify)?;
        let config = inspect.config.unwrap_or_default();
        Ok(ImageDetails {
            entrypoint: config.entrypoint.unwrap_or_default(),
            cmd: config.cmd.unwrap_or_default(),
            labels: config.labels.unwrap_or_default(),
        })
    }

    async fn pull_image(&self, image: &str) -> Result<(), BackendError> {
        debug!(%image, "DockerEngine::pull_image: called");
        let options = CreateImageOptions::<String> {
            from_image: image.to_string(),
            ..Default::default()
        };
        let mut progress = self.client()?.create_image(Some(options), None, None);
        while let Some(item) = progress.next().await {
            let info = item.map_err(classify)?;
            if let Some(error) = info.error {
                debug!(%error, "DockerEngine::pull_image: pull reported error");
                return Err(if is_missing_image(&error) {
                    BackendError::NotFound(error)
                } else {
                    BackendError::Engine(error)
                });
            }
            if let Some(status) = info.status {
                debug!(%status, "DockerEngine::pull_image: progress");
            }
        }
        info!(%image, "Pulled image");
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, BackendError> {
        debug!(name = %spec.name, image = %spec.image, "DockerEngine::create_container: called");
        let options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        };
        let host_config = HostConfig {
            binds: Some(spec.binds.clone()),
            ..Default::default()
        };
        let config = ContainerConfig {
            image: Some(spec.image.clone()),
            cmd: if spec.args.is_empty() {
                None
            } else {
                Some(spec.args.clone())
            },
            working_dir: Some(spec.working_dir.clone()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(false),
            host_config: Some(host_config),
            ..Default::default()
        };

        let response = self
            .client()?
            .create_container(Some(options), config)
            .await
            .map_err(classify)?;
        for warning in &response.warnings {
            debug!(%warning, "DockerEngine::create_container: engine warning");
        }
        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> Result<(), BackendError> {
        debug!(%id, "DockerEngine::start_container: called");
        self.client()?
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(classify)
    }

    fn logs<'a>(&'a self, id: &str) -> LogStream<'a> {
        debug!(%id, "DockerEngine::logs: called");
        let client = match self.client() {
            Ok(client) => client,
            Err(e) => return stream::once(async move { Err(e) }).boxed(),
        };
        let options = LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: true,
            ..Default::default()
        };
        client
            .logs(id, Some(options))
            .filter_map(|item| async move {
                match item {
                    Ok(LogOutput::StdOut { message }) | Ok(LogOutput::Console { message }) => {
                        Some(Ok(LogChunk::Stdout(message.to_vec())))
                    }
                    Ok(LogOutput::StdErr { message }) => Some(Ok(LogChunk::Stderr(message.to_vec()))),
                    Ok(LogOutput::StdIn { .. }) => None,
                    Err(e) => Some(Err(classify(e))),
                }
            })
            .boxed()
    }

    async fn wait_container(&self, id: &str) -> Result<i64, BackendError> {
        debug!(%id, "DockerEngine::wait_container: called");
        let options = WaitContainerOptions {
            condition: "not-running".to_string(),
        };
        let mut waiter = self.client()?.wait_container(id, Some(options));
        match waiter.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // bollard reports nonzero exits as an error carrying the code
            Some(Err(DockerError::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(classify(e)),
            None => Err(BackendError::Engine(format!("container {} exited without a status", id))),
        }
    }

    async fn remove_container(&self, id: &str) -> Result<(), BackendError> {
        debug!(%id, "DockerEngine::remove_container: called");
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        self.client()?
            .remove_container(id, Some(options))
            .await
            .map_err(classify)
    }
}
