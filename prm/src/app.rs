//! Command dispatch
//!
//! Each subcommand writes user-facing output to the supplied writers and
//! returns the process exit code. Backends are built through a factory so
//! callers can substitute their own.

use std::io::Write;
use std::path::Path;

use tracing::{debug, warn};

use crate::backend::Backend;
use crate::cli::{Cli, Command, GetCommand, SetCommand};
use crate::config::Config;
use crate::error::PrmError;
use crate::orchestrator::Prm;
use crate::status::{OutputFormat, format_status};
use crate::tool::{DirectoryPaths, Tool};

/// Builds the backend named by a config
pub type BackendFactory = dyn Fn(&Config) -> Result<Box<dyn Backend>, PrmError>;

/// Run a parsed command line and return the process exit code
///
/// Errors are reported on `err` as `Error: <message>`.
pub async fn run(cli: Cli, config: Config, factory: &BackendFactory, out: &mut dyn Write, err: &mut dyn Write) -> i32 {
    debug!(command = ?cli.command, "run: called");
    match dispatch(cli, config, factory, out).await {
        Ok(code) => code,
        Err(e) => {
            debug!(error = %e, "run: command failed");
            if let Err(write_err) = writeln!(err, "Error: {}", e) {
                warn!(error = %write_err, "run: failed to report error on stderr");
            }
            e.exit_code()
        }
    }
}

/// Reject malformed arguments that need no config or backend
///
/// Run before the config is loaded, so a bad tool reference is reported as
/// such even when the config file is broken.
pub fn check_args(cli: &Cli) -> Result<(), PrmError> {
    debug!("check_args: called");
    match &cli.command {
        Command::Exec { tool, .. } => Tool::parse(tool).map(|_| ()),
        Command::Status { format } => format.parse::<OutputFormat>().map(|_| ()),
        Command::Set { .. } | Command::Get { .. } => Ok(()),
    }
}

async fn dispatch(cli: Cli, config: Config, factory: &BackendFactory, out: &mut dyn Write) -> Result<i32, PrmError> {
    match cli.command {
        Command::Exec {
            tool,
            codedir,
            cachedir,
            args,
        } => {
            debug!(%tool, "dispatch: matched Exec command");
            cmd_exec(config, factory, &tool, codedir.as_deref(), cachedir.as_deref(), &args).await
        }
        Command::Status { format } => {
            debug!(%format, "dispatch: matched Status command");
            cmd_status(config, factory, &format, out).await
        }
        Command::Set { setting } => {
            debug!(?setting, "dispatch: matched Set command");
            cmd_set(config, &Config::save_path(cli.config.as_ref()), setting, out)
        }
        Command::Get { setting } => {
            debug!(?setting, "dispatch: matched Get command");
            cmd_get(&config, setting, out)
        }
    }
}

/// Resolve a tool reference and run it through the backend pipeline
///
/// The reference is parsed before the backend is created, so malformed input
/// never touches the engine.
async fn cmd_exec(
    config: Config,
    factory: &BackendFactory,
    tool_ref: &str,
    codedir: Option<&Path>,
    cachedir: Option<&Path>,
    args: &[String],
) -> Result<i32, PrmError> {
    let tool = Tool::parse(tool_ref)?;
    let paths = DirectoryPaths::resolve(&tool, codedir, cachedir, &config.cache_root())?;
    let backend = factory(&config)?;

    let mut prm = Prm::new(config, backend);
    let exit_code = prm.exec_tool(&tool, args, &paths).await?;
    Ok(exit_code.code())
}

async fn cmd_status(
    config: Config,
    factory: &BackendFactory,
    format: &str,
    out: &mut dyn Write,
) -> Result<i32, PrmError> {
    // reject unknown formats before probing the engine
    format.parse::<OutputFormat>()?;

    let backend = factory(&config)?;
    let prm = Prm::new(config, backend);
    let status = prm.get_status().await;
    writeln!(out, "{}", format_status(&status, format)?)?;
    Ok(0)
}

fn cmd_set(mut config: Config, save_path: &Path, setting: SetCommand, out: &mut dyn Write) -> Result<i32, PrmError> {
    match setting {
        SetCommand::Puppet { version } => {
            config.set_puppet_version(&version)?;
            config.save(save_path)?;
            writeln!(out, "Puppet version set to {}", config.puppet_version)?;
        }
        SetCommand::Backend { backend } => {
            config.set_backend(&backend)?;
            config.save(save_path)?;
            writeln!(out, "Backend set to {}", config.backend)?;
        }
    }
    debug!(?save_path, "cmd_set: config saved");
    Ok(0)
}

fn cmd_get(config: &Config, setting: GetCommand, out: &mut dyn Write) -> Result<i32, PrmError> {
    match setting {
        GetCommand::Puppet => writeln!(out, "{}", config.puppet_version)?,
        GetCommand::Backend => writeln!(out, "{}", config.backend)?,
    }
    Ok(0)
}
