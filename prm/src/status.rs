//! Status aggregation and rendering

use std::fmt;
use std::str::FromStr;

use semver::Version;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::{BackendStatus, BackendType};
use crate::error::PrmError;

/// Snapshot of the active configuration and backend health
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    #[serde(rename = "PuppetVersion")]
    pub puppet_version: Version,
    #[serde(rename = "Backend")]
    pub backend: BackendType,
    #[serde(flatten)]
    pub backend_status: BackendStatus,
}

/// Output format for the status command
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
}

impl FromStr for OutputFormat {
    type Err = PrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            _ => {
                debug!(%s, "OutputFormat::from_str: unknown format");
                Err(PrmError::UnsupportedFormat(s.to_string()))
            }
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Human => write!(f, "human"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Render a status in the named output format
pub fn format_status(status: &Status, output_type: &str) -> Result<String, PrmError> {
    debug!(%output_type, "format_status: called");
    match output_type.parse::<OutputFormat>()? {
        OutputFormat::Human => {
            let state = if status.backend_status.is_available {
                "running"
            } else {
                "error"
            };
            let mut lines = vec![
                format!("> Puppet version: {}", status.puppet_version),
                format!("> Backend: {} ({})", status.backend, state),
            ];
            if !status.backend_status.is_available {
                lines.push(format!("> {}", status.backend_status.status_msg));
            }
            Ok(lines.join("\n"))
        }
        OutputFormat::Json => Ok(serde_json::to_string(status)?),
    }
}
