//! prm - Puppet Runtime Manager
//!
//! Runs Puppet content tools (linters, validators, generators) inside an
//! isolated backend pinned to a configured Puppet version. A tool is named by
//! an `AUTHOR/ID` reference and goes through three stages on the backend:
//! fetch, validate and exec.
//!
//! # Modules
//!
//! - [`backend`] - Backend trait, Docker implementation and registry
//! - [`orchestrator`] - The fetch/validate/exec pipeline and status aggregation
//! - [`status`] - Status rendering (human, json)
//! - [`tool`] - Tool references, exit codes and mounted directories
//! - [`config`] - Configuration types and loading
//! - [`app`] - Command dispatch
//! - [`cli`] - Command-line interface

pub mod app;
pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod status;
pub mod tool;

pub use backend::{Backend, BackendStatus, BackendType, create_backend};
pub use config::Config;
pub use error::{BackendError, PrmError};
pub use orchestrator::Prm;
pub use status::{OutputFormat, Status, format_status};
pub use tool::{DirectoryPaths, Tool, ToolExitCode};
