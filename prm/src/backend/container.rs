//! Container backend
//!
//! Runs each tool in a throwaway container. One backend instance drives one
//! tool through Created -> Fetched -> Validated -> Completed; any step can
//! land in Failed. Once a container exists it is removed on every exit path,
//! including SIGINT/SIGTERM while the tool is running.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::StreamExt;
use futures::future::BoxFuture;
use semver::Version;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::engine::{ContainerEngine, ContainerSpec, ImageDetails, LogChunk};
use super::{Backend, BackendStatus};
use crate::config::Config;
use crate::error::BackendError;
use crate::tool::{DirectoryPaths, Tool, ToolExitCode};

/// Image label declaring the Puppet version a tool image targets
pub const PUPPET_VERSION_LABEL: &str = "com.puppetlabs.prm.puppet-version";

/// Mount point of the code directory inside the container
pub const CODE_MOUNT: &str = "/code";

/// Mount point of the cache directory inside the container
pub const CACHE_MOUNT: &str = "/cache";

/// Produces a future that resolves when the run should be abandoned
pub type Interrupt = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

type Output = Box<dyn Write + Send + Sync>;

/// Resolves on SIGINT or (on unix) SIGTERM
pub fn ctrl_c_or_term() -> BoxFuture<'static, ()> {
    async {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut term) => {
                    tokio::select! {
                        _ = ctrl_c() => debug!("ctrl_c_or_term: received SIGINT"),
                        _ = term.recv() => debug!("ctrl_c_or_term: received SIGTERM"),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "ctrl_c_or_term: cannot listen for SIGTERM");
                    ctrl_c().await;
                }
            }
        }
        #[cfg(not(unix))]
        ctrl_c().await;
    }
    .boxed()
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "ctrl_c: cannot listen for SIGINT");
        std::future::pending::<()>().await;
    }
}

/// Where a backend is in its per-invocation lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Created,
    Fetched { image: String, puppet_version: Version },
    Validated { image: String },
    Completed { exit_code: ToolExitCode },
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Created => write!(f, "created"),
            Stage::Fetched { image, .. } => write!(f, "fetched ({})", image),
            Stage::Validated { image } => write!(f, "validated ({})", image),
            Stage::Completed { exit_code } => write!(f, "completed (exit {})", exit_code),
            Stage::Failed => write!(f, "failed"),
        }
    }
}

/// Image reference for a tool under a Puppet version
pub fn image_name(tool: &Tool, config: &Config) -> String {
    let tag = config.puppet_version.to_string().replace('+', "_");
    let base = format!(
        "{}/{}:puppet-{}",
        tool.author.to_lowercase(),
        tool.id.to_lowercase(),
        tag
    );
    match &config.docker.registry {
        Some(registry) => format!("{}/{}", registry.trim_end_matches('/'), base),
        None => base,
    }
}

fn container_name(tool: &Tool) -> String {
    let clean = |s: &str| -> String {
        s.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '.' { c } else { '-' })
            .collect()
    };
    format!("prm-{}-{}-{}", clean(&tool.author), clean(&tool.id), Uuid::now_v7().simple())
}

/// Reason a fetched image cannot run under the configured Puppet version
fn incompatibility(details: &ImageDetails, puppet_version: &Version) -> Option<String> {
    if !details.is_runnable() {
        return Some("image defines no entrypoint or command".to_string());
    }
    let label = details.labels.get(PUPPET_VERSION_LABEL)?;
    match Version::parse(label.trim_start_matches('v')) {
        Ok(wanted) if wanted.major == puppet_version.major => None,
        Ok(wanted) => Some(format!(
            "tool targets Puppet {} but Puppet {} is configured",
            wanted, puppet_version
        )),
        Err(e) => Some(format!("invalid {} label '{}': {}", PUPPET_VERSION_LABEL, label, e)),
    }
}

/// A created container that must be handed back to the engine
///
/// Callers release it explicitly after the run settles. Dropping an
/// unreleased lease only logs, since removal is async.
struct ContainerLease {
    id: String,
    released: bool,
}

impl ContainerLease {
    fn new(id: String) -> Self {
        debug!(%id, "ContainerLease::new: acquired");
        Self { id, released: false }
    }

    fn id(&self) -> &str {
        &self.id
    }

    async fn release<E: ContainerEngine + ?Sized>(mut self, engine: &E) -> Result<(), BackendError> {
        debug!(id = %self.id, "ContainerLease::release: called");
        self.released = true;
        engine.remove_container(&self.id).await
    }
}

impl Drop for ContainerLease {
    fn drop(&mut self) {
        if !self.released {
            warn!(container = %self.id, "Container lease dropped without release, container may be leaked");
        }
    }
}

/// Start a container, stream its output and wait for it to exit
async fn run_container<E: ContainerEngine + ?Sized>(
    engine: &E,
    id: &str,
    stdout: &mut (dyn Write + Send + Sync),
    stderr: &mut (dyn Write + Send + Sync),
) -> Result<ToolExitCode, BackendError> {
    debug!(%id, "run_container: called");
    engine.start_container(id).await?;

    let mut logs = engine.logs(id);
    while let Some(chunk) = logs.next().await {
        match chunk? {
            LogChunk::Stdout(bytes) => {
                stdout.write_all(&bytes)?;
                stdout.flush()?;
            }
            LogChunk::Stderr(bytes) => {
                stderr.write_all(&bytes)?;
                stderr.flush()?;
            }
        }
    }

    let code = engine.wait_container(id).await?;
    debug!(%id, code, "run_container: container exited");
    Ok(ToolExitCode::from(code))
}

/// Backend running tools in containers on a [`ContainerEngine`]
pub struct ContainerBackend<E: ContainerEngine> {
    engine: Arc<E>,
    stage: Stage,
    interrupt: Interrupt,
    stdout: Output,
    stderr: Output,
}

impl<E: ContainerEngine> ContainerBackend<E> {
    pub fn new(engine: Arc<E>) -> Self {
        Self {
            engine,
            stage: Stage::Created,
            interrupt: Arc::new(ctrl_c_or_term),
            stdout: Box::new(std::io::stdout()),
            stderr: Box::new(std::io::stderr()),
        }
    }

    /// Replace the interrupt source (SIGINT/SIGTERM by default)
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Redirect streamed tool output
    pub fn with_output(mut self, stdout: Output, stderr: Output) -> Self {
        self.stdout = stdout;
        self.stderr = stderr;
        self
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    fn invalid_stage(&self, operation: &'static str) -> BackendError {
        debug!(operation, stage = %self.stage, "ContainerBackend: invalid stage");
        BackendError::InvalidStage {
            operation,
            stage: self.stage.to_string(),
        }
    }

    async fn fetch(&self, tool: &Tool, image: &str) -> Result<(), BackendError> {
        match self.engine.inspect_image(image).await {
            Ok(_) => {
                debug!(%image, "ContainerBackend::fetch: image present locally");
                Ok(())
            }
            Err(BackendError::NotFound(_)) => {
                info!(%image, "Pulling tool image");
                self.engine.pull_image(image).await.map_err(|e| match e {
                    BackendError::NotFound(_) => BackendError::ToolNotFound {
                        tool: tool.to_string(),
                        image: image.to_string(),
                    },
                    other => other,
                })
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl<E: ContainerEngine + 'static> Backend for ContainerBackend<E> {
    async fn get_tool(&mut self, tool: &Tool, config: &Config) -> Result<(), BackendError> {
        debug!(%tool, "ContainerBackend::get_tool: called");
        if self.stage != Stage::Created {
            return Err(self.invalid_stage("get_tool"));
        }

        let image = image_name(tool, config);
        match self.fetch(tool, &image).await {
            Ok(()) => {
                self.stage = Stage::Fetched {
                    image,
                    puppet_version: config.puppet_version.clone(),
                };
                Ok(())
            }
            Err(e) => {
                debug!(error = %e, "ContainerBackend::get_tool: fetch failed");
                self.stage = Stage::Failed;
                Err(e)
            }
        }
    }

    async fn validate(&mut self, tool: &Tool) -> Result<ToolExitCode, BackendError> {
        debug!(%tool, "ContainerBackend::validate: called");
        let (image, puppet_version) = match &self.stage {
            Stage::Fetched { image, puppet_version } => (image.clone(), puppet_version.clone()),
            _ => return Err(self.invalid_stage("validate")),
        };

        let details = match self.engine.inspect_image(&image).await {
            Ok(details) => details,
            Err(e) => {
                self.stage = Stage::Failed;
                return Err(e);
            }
        };

        match incompatibility(&details, &puppet_version) {
            None => {
                debug!(%image, "ContainerBackend::validate: compatible");
                self.stage = Stage::Validated { image };
                Ok(ToolExitCode::SUCCESS)
            }
            Some(reason) => {
                info!(%tool, %reason, "Tool failed validation");
                writeln!(self.stderr, "Tool {} failed validation: {}", tool, reason)?;
                Ok(ToolExitCode::FAILURE)
            }
        }
    }

    async fn exec(
        &mut self,
        tool: &Tool,
        args: &[String],
        config: &Config,
        paths: &DirectoryPaths,
    ) -> Result<ToolExitCode, BackendError> {
        debug!(%tool, ?args, ?paths, "ContainerBackend::exec: called");
        let image = match &self.stage {
            Stage::Validated { image } if *image == image_name(tool, config) => image.clone(),
            _ => return Err(self.invalid_stage("exec")),
        };

        let spec = ContainerSpec {
            name: container_name(tool),
            image,
            args: args.to_vec(),
            binds: vec![
                format!("{}:{}:rw", paths.code_dir.display(), CODE_MOUNT),
                format!("{}:{}:rw", paths.cache_dir.display(), CACHE_MOUNT),
            ],
            working_dir: CODE_MOUNT.to_string(),
        };

        let engine = Arc::clone(&self.engine);
        let id = match engine.create_container(&spec).await {
            Ok(id) => id,
            Err(e) => {
                self.stage = Stage::Failed;
                return Err(e);
            }
        };
        let lease = ContainerLease::new(id);
        info!(container = %lease.id(), name = %spec.name, "Running tool container");

        let interrupted = (self.interrupt)();
        let outcome = tokio::select! {
            result = run_container(&*engine, lease.id(), &mut *self.stdout, &mut *self.stderr) => result,
            _ = interrupted => {
                info!(container = %lease.id(), "Interrupted, removing container");
                Err(BackendError::Interrupted { container: lease.id().to_string() })
            }
        };

        let container = lease.id().to_string();
        if let Err(e) = lease.release(&*engine).await {
            warn!(%container, error = %e, "Failed to remove container");
            writeln!(self.stderr, "Warning: failed to remove container {}: {}", container, e)?;
        }

        match outcome {
            Ok(exit_code) => {
                debug!(%exit_code, "ContainerBackend::exec: completed");
                self.stage = Stage::Completed { exit_code };
                Ok(exit_code)
            }
            Err(e) => {
                self.stage = Stage::Failed;
                Err(e)
            }
        }
    }

    async fn status(&self) -> BackendStatus {
        debug!("ContainerBackend::status: called");
        match self.engine.ping().await {
            Ok(info) => BackendStatus::available(format!("Docker {} (API {})", info.version, info.api_version)),
            Err(e) => {
                debug!(error = %e, "ContainerBackend::status: engine unavailable");
                BackendStatus::unavailable(e.to_string())
            }
        }
    }
}
