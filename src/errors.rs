//! Error types shared across the application.

use std::fmt::{Display, Formatter};

use crate::models::engine::BootstrapStage;

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// A readiness stage of the container engine could not be satisfied.
    Environment {
        /// Stage that failed.
        stage: BootstrapStage,
        /// Underlying cause reported by the remediation step.
        cause: String,
    },
    /// Scan process bridge failure (spawn, pipe capture, wait).
    Bridge(String),
    /// Input rejected at the session boundary (e.g. an empty scan target).
    Validation(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl AppError {
    /// Build an [`AppError::Environment`] for `stage`.
    pub fn environment(stage: BootstrapStage, cause: impl Into<String>) -> Self {
        Self::Environment {
            stage,
            cause: cause.into(),
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Environment { stage, cause } => write!(f, "environment ({stage}): {cause}"),
            Self::Bridge(msg) => write!(f, "bridge: {msg}"),
            Self::Validation(msg) => write!(f, "validation: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
