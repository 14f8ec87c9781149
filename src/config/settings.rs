//! Workflow settings loaded from `config.toml`.
//!
//! Every field has a default, so an absent file or an absent `[workflow]` table
//! yields [`WorkflowSettings::default`].
//!
//! ```toml
//! [workflow]
//! hold_duration_seconds = 1800
//! sweep_interval_seconds = 60
//! conflict_retry_limit = 3
//! ```

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const DEFAULT_HOLD_DURATION_SECONDS: i64 = 30 * 60;
const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 60;
const DEFAULT_CONFLICT_RETRY_LIMIT: u32 = 3;

/// Tunables for the itinerary workflow.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WorkflowSettings {
    /// How long a fare hold is kept before it lapses
    pub hold_duration_seconds: i64,
    /// Period of the background expiry sweep
    pub sweep_interval_seconds: u64,
    /// Attempts made when an optimistic lock on an event loses a race
    pub conflict_retry_limit: u32,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            hold_duration_seconds: DEFAULT_HOLD_DURATION_SECONDS,
            sweep_interval_seconds: DEFAULT_SWEEP_INTERVAL_SECONDS,
            conflict_retry_limit: DEFAULT_CONFLICT_RETRY_LIMIT,
        }
    }
}

impl WorkflowSettings {
    /// Rejects values the workflow cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.hold_duration_seconds <= 0 {
            return Err(Error::Config {
                message: format!(
                    "hold_duration_seconds must be positive, got {}",
                    self.hold_duration_seconds
                ),
            });
        }
        if self.sweep_interval_seconds == 0 {
            return Err(Error::Config {
                message: "sweep_interval_seconds must be positive".to_string(),
            });
        }
        if self.conflict_retry_limit == 0 {
            return Err(Error::Config {
                message: "conflict_retry_limit must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Sweep period as a [`Duration`].
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    workflow: WorkflowSettings,
}

/// Parses settings from TOML text.
pub fn parse_settings(contents: &str) -> Result<WorkflowSettings> {
    let file: ConfigFile = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    file.workflow.validate()?;
    Ok(file.workflow)
}

/// Loads settings from a TOML file.
///
/// # Errors
/// Returns an error if the file cannot be read, the TOML is invalid, or a value
/// fails [`WorkflowSettings::validate`].
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<WorkflowSettings> {
    let path_ref = path.as_ref();
    tracing::debug!("Loading workflow settings from {}", path_ref.display());
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;
    parse_settings(&contents)
}

/// Loads settings from `./config.toml`, using defaults when the file is absent.
pub fn load_default_settings() -> Result<WorkflowSettings> {
    let path = Path::new("config.toml");
    if path.exists() {
        load_settings(path)
    } else {
        tracing::info!("No config.toml found, using default workflow settings");
        Ok(WorkflowSettings::default())
    }
}
