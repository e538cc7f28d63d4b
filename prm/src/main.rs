//! prm - Puppet Runtime Manager
//!
//! CLI entry point.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use eyre::{Context, Result};
use tracing::{debug, info};

use prm::cli::{Cli, Command};
use prm::config::Config;
use prm::create_backend;

/// Overrides the log directory
const LOG_DIR_ENV: &str = "PRM_LOG_DIR";

fn log_dir() -> PathBuf {
    match std::env::var_os(LOG_DIR_ENV) {
        Some(dir) => PathBuf::from(dir),
        None => dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("prm")
            .join("logs"),
    }
}

/// Setup logging to file
///
/// Output goes to a log file so the terminal only carries tool output and
/// user-facing errors.
fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_dir = log_dir();
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("prm.log"))
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Log level comes from the config file before the full load
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    // Malformed arguments are reported before the config is read
    if let Err(e) = prm::app::check_args(&cli) {
        debug!(error = %e, "main: arguments rejected");
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }

    let config = match cli.command {
        Command::Set { .. } => Config::load_for_update(cli.config.as_ref()),
        _ => Config::load(cli.config.as_ref()),
    }
    .context("Failed to load configuration")?;
    info!(
        puppet_version = %config.puppet_version,
        backend = %config.backend,
        "prm loaded config"
    );

    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let code = prm::app::run(cli, config, &create_backend, &mut stdout, &mut stderr).await;
    stdout.flush().context("Failed to flush stdout")?;

    debug!(code, "main: exiting");
    std::process::exit(code);
}
