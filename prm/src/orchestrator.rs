//! Execution pipeline
//!
//! [`Prm`] owns the active configuration and the one backend selected for this
//! run. Tools go through fetch, validate and exec in that order; the first
//! backend error stops the pipeline, while a nonzero tool exit code is passed
//! back untouched.

use tracing::{debug, info};

use crate::backend::{Backend, create_backend};
use crate::config::Config;
use crate::error::PrmError;
use crate::status::Status;
use crate::tool::{DirectoryPaths, Tool, ToolExitCode};

/// Run context: configuration plus the active backend
pub struct Prm {
    pub config: Config,
    pub backend: Box<dyn Backend>,
}

impl Prm {
    pub fn new(config: Config, backend: Box<dyn Backend>) -> Self {
        Self { config, backend }
    }

    /// Build a run context with the backend named by the config
    pub fn from_config(config: Config) -> Result<Self, PrmError> {
        let backend = create_backend(&config)?;
        Ok(Self::new(config, backend))
    }

    /// Fetch, validate and run a tool
    ///
    /// A failed validation returns its exit code without running the tool.
    pub async fn exec_tool(
        &mut self,
        tool: &Tool,
        args: &[String],
        paths: &DirectoryPaths,
    ) -> Result<ToolExitCode, PrmError> {
        debug!(%tool, ?args, "Prm::exec_tool: called");

        self.backend.get_tool(tool, &self.config).await?;
        debug!(%tool, "Prm::exec_tool: tool fetched");

        let validation = self.backend.validate(tool).await?;
        if !validation.is_success() {
            info!(%tool, code = %validation, "Validation failed, not running tool");
            return Ok(validation);
        }

        let exit_code = self.backend.exec(tool, args, &self.config, paths).await?;
        info!(%tool, code = %exit_code, "Tool finished");
        Ok(exit_code)
    }

    /// Aggregate config and a fresh backend probe
    pub async fn get_status(&self) -> Status {
        debug!("Prm::get_status: called");
        Status {
            puppet_version: self.config.puppet_version.clone(),
            backend: self.config.backend,
            backend_status: self.backend.status().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendStatus;
    use crate::backend::mock::{MockBackend, MockOutcome};
    use crate::error::BackendError;
    use semver::Version;

    fn prm(mock: &MockBackend) -> Prm {
        Prm::new(Config::default(), Box::new(mock.clone()))
    }

    async fn run(mock: &MockBackend) -> Result<ToolExitCode, PrmError> {
        let tool = Tool::parse("author/templateId").unwrap();
        let paths = DirectoryPaths::new("/code", "/cache");
        prm(mock).exec_tool(&tool, &["--verbose".to_string()], &paths).await
    }

    #[tokio::test]
    async fn test_pipeline_order() {
        let mock = MockBackend::default();
        assert_eq!(run(&mock).await.unwrap(), ToolExitCode::SUCCESS);
        assert_eq!(mock.calls(), vec!["get_tool", "validate", "exec"]);
    }

    #[tokio::test]
    async fn test_exec_exit_code_forwarded() {
        let mock = MockBackend {
            exec: MockOutcome::Code(3),
            ..Default::default()
        };
        assert_eq!(run(&mock).await.unwrap(), ToolExitCode(3));
    }

    #[tokio::test]
    async fn test_get_tool_error_stops_pipeline() {
        let mock = MockBackend {
            get_tool: MockOutcome::NotFound,
            ..Default::default()
        };
        let err = run(&mock).await.unwrap_err();
        assert!(matches!(err, PrmError::Backend(BackendError::ToolNotFound { .. })));
        assert_eq!(mock.calls(), vec!["get_tool"]);
    }

    #[tokio::test]
    async fn test_validate_error_stops_pipeline() {
        let mock = MockBackend {
            validate: MockOutcome::Unavailable,
            ..Default::default()
        };
        assert!(run(&mock).await.is_err());
        assert_eq!(mock.calls(), vec!["get_tool", "validate"]);
    }

    #[tokio::test]
    async fn test_validate_failure_skips_exec() {
        let mock = MockBackend {
            validate: MockOutcome::Code(2),
            ..Default::default()
        };
        assert_eq!(run(&mock).await.unwrap(), ToolExitCode(2));
        assert_eq!(mock.calls(), vec!["get_tool", "validate"]);
    }

    #[tokio::test]
    async fn test_exec_error_surfaces() {
        let mock = MockBackend {
            exec: MockOutcome::Unavailable,
            ..Default::default()
        };
        let err = run(&mock).await.unwrap_err();
        assert!(matches!(err, PrmError::Backend(BackendError::EngineUnavailable(_))));
    }

    #[tokio::test]
    async fn test_get_status() {
        let mock = MockBackend {
            status: BackendStatus::available("Running just fine!"),
            ..Default::default()
        };
        let status = prm(&mock).get_status().await;
        assert_eq!(status.puppet_version, Version::new(7, 0, 0));
        assert_eq!(status.backend, crate::backend::BackendType::Docker);
        assert_eq!(status.backend_status, BackendStatus::available("Running just fine!"));
        assert_eq!(mock.calls(), vec!["status"]);
    }
}
