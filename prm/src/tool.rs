//! Tool identity, exit codes and host directories
//!
//! A tool is addressed on the command line as `AUTHOR/ID`. Parsing happens
//! before any backend is touched so malformed input never reaches the engine.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::debug;

use crate::error::PrmError;

/// Identity of a runnable tool
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tool {
    pub author: String,
    pub id: String,
}

impl Tool {
    /// Parse an `AUTHOR/ID` reference
    ///
    /// Exactly two non-empty segments separated by a single `/` are accepted.
    pub fn parse(reference: &str) -> Result<Self, PrmError> {
        debug!(%reference, "Tool::parse: called");
        let mut segments = reference.split('/');
        match (segments.next(), segments.next(), segments.next()) {
            (Some(author), Some(id), None) if !author.is_empty() && !id.is_empty() => {
                debug!(%author, %id, "Tool::parse: valid reference");
                Ok(Self {
                    author: author.to_string(),
                    id: id.to_string(),
                })
            }
            _ => {
                debug!(%reference, "Tool::parse: rejected reference");
                Err(PrmError::InvalidToolRef(reference.to_string()))
            }
        }
    }
}

impl FromStr for Tool {
    type Err = PrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.author, self.id)
    }
}

/// Exit status of a tool's own run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ToolExitCode(pub i32);

impl ToolExitCode {
    pub const SUCCESS: ToolExitCode = ToolExitCode(0);
    pub const FAILURE: ToolExitCode = ToolExitCode(1);

    pub fn is_success(self) -> bool {
        self.0 == 0
    }

    pub fn code(self) -> i32 {
        self.0
    }
}

impl From<i64> for ToolExitCode {
    /// Engine exit codes are i64; anything outside i32 is reported as a generic failure
    fn from(code: i64) -> Self {
        ToolExitCode(i32::try_from(code).unwrap_or(1))
    }
}

impl fmt::Display for ToolExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Host directories mapped into the execution context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryPaths {
    pub code_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl DirectoryPaths {
    pub fn new(code_dir: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            code_dir: code_dir.into(),
            cache_dir: cache_dir.into(),
        }
    }

    /// Resolve paths for a tool run
    ///
    /// The code dir falls back to the current working directory and the cache
    /// dir to `<cache_root>/<author>/<id>`. The cache dir is created if missing.
    /// Both come back absolute, since the engine reads a relative bind source
    /// as a volume name.
    pub fn resolve(
        tool: &Tool,
        code_dir: Option<&Path>,
        cache_dir: Option<&Path>,
        cache_root: &Path,
    ) -> Result<Self, PrmError> {
        debug!(%tool, ?code_dir, ?cache_dir, ?cache_root, "DirectoryPaths::resolve: called");
        let code_dir = match code_dir {
            Some(dir) => dir.to_path_buf(),
            None => std::env::current_dir()?,
        };
        let cache_dir = match cache_dir {
            Some(dir) => dir.to_path_buf(),
            None => cache_root.join(&tool.author).join(&tool.id),
        };

        if !cache_dir.exists() {
            debug!(?cache_dir, "DirectoryPaths::resolve: creating cache dir");
            std::fs::create_dir_all(&cache_dir)?;
        }

        let paths = Self {
            code_dir: std::path::absolute(&code_dir)?,
            cache_dir: std::path::absolute(&cache_dir)?,
        };
        debug!(?paths, "DirectoryPaths::resolve: resolved");
        Ok(paths)
    }
}
