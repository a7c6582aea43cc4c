//! Global configuration parsing and validation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// Container engine settings used by the readiness state machine.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct EngineConfig {
    /// Engine CLI binary.
    pub binary: String,
    /// Tag of the scan image.
    pub image_tag: String,
    /// Build context directory for the scan image.
    pub build_context: PathBuf,
    /// Readiness polls after a start command before giving up.
    pub start_attempts: u32,
    /// Delay between readiness polls.
    pub poll_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: "docker".into(),
            image_tag: "inferno-sandbox:latest".into(),
            build_context: PathBuf::from("."),
            start_attempts: 30,
            poll_interval_ms: 1000,
        }
    }
}

impl EngineConfig {
    /// Delay between readiness polls as a [`Duration`].
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// External scan process settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct ScanProcessConfig {
    /// Program to execute.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Working directory for the child; inherits ours when unset.
    pub working_dir: Option<PathBuf>,
    /// Time allowed between the termination signal and a forced kill.
    pub stop_grace_ms: u64,
}

impl Default for ScanProcessConfig {
    fn default() -> Self {
        Self {
            program: "python3".into(),
            args: vec!["inferno_cli.py".into()],
            working_dir: None,
            stop_grace_ms: 2000,
        }
    }
}

impl ScanProcessConfig {
    /// Grace period after `stop()` as a [`Duration`].
    #[must_use]
    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }
}

/// Presentation settings for the event log.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct DisplayConfig {
    /// Number of most recent events kept in the display window.
    pub window: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { window: 15 }
    }
}

/// Global configuration parsed from `config.toml`.
///
/// Every table is optional; an empty document yields [`GlobalConfig::default`].
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct GlobalConfig {
    /// Container engine settings.
    pub engine: EngineConfig,
    /// Scan process settings.
    pub scan: ScanProcessConfig,
    /// Event log presentation settings.
    pub display: DisplayConfig,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate semantic constraints not expressible in serde.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.engine.binary.trim().is_empty() {
            return Err(AppError::Config("engine.binary must not be empty".into()));
        }
        if self.engine.image_tag.trim().is_empty() {
            return Err(AppError::Config("engine.image_tag must not be empty".into()));
        }
        if self.engine.start_attempts == 0 {
            return Err(AppError::Config(
                "engine.start_attempts must be greater than zero".into(),
            ));
        }
        if self.scan.program.trim().is_empty() {
            return Err(AppError::Config("scan.program must not be empty".into()));
        }
        if self.display.window == 0 {
            return Err(AppError::Config(
                "display.window must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
