//! Container engine readiness model.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Observed readiness of the local container engine.
///
/// Produced by [`EngineProbe`](crate::engine::probe::EngineProbe) and
/// advanced by [`EngineBootstrapper`](crate::engine::bootstrap::EngineBootstrapper).
/// Dependent fields are never `true` while their prerequisite is `false`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    /// The engine CLI answers a version query.
    pub installed: bool,
    /// The engine daemon answers a live-container listing.
    pub running: bool,
    /// The scan image exists locally.
    pub image_built: bool,
}

impl EngineStatus {
    /// Whether every readiness stage is satisfied.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.installed && self.running && self.image_built
    }

    /// First stage that still needs remediation, if any.
    #[must_use]
    pub fn pending_stage(&self) -> Option<BootstrapStage> {
        if !self.installed {
            Some(BootstrapStage::Install)
        } else if !self.running {
            Some(BootstrapStage::Start)
        } else if !self.image_built {
            Some(BootstrapStage::Build)
        } else {
            None
        }
    }
}

/// Stages of the readiness state machine, in execution order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapStage {
    /// Engine installation.
    Install,
    /// Engine daemon start.
    Start,
    /// Scan image build.
    Build,
}

impl BootstrapStage {
    /// Lowercase stage name used in logs and error messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Start => "start",
            Self::Build => "build",
        }
    }
}

impl Display for BootstrapStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
