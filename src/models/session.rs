//! Session phase model and lifecycle helpers.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::models::event::ScanSummary;

/// Lifecycle phase of one scan session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Waiting for the container engine to become ready.
    AwaitingEnvironment,
    /// Engine ready; waiting for the scan configuration.
    AwaitingConfig,
    /// Scan process running and streaming events.
    Scanning,
    /// Scan completed successfully.
    Complete,
    /// Session failed at some stage.
    Failed,
}

impl SessionPhase {
    /// Whether the phase ends the session.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// Determine whether a lifecycle transition is permitted.
    ///
    /// Phases only move forward one step at a time; `Failed` is reachable
    /// from every non-terminal phase.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::AwaitingEnvironment, Self::AwaitingConfig)
                | (Self::AwaitingConfig, Self::Scanning)
                | (Self::Scanning, Self::Complete)
                | (
                    Self::AwaitingEnvironment | Self::AwaitingConfig | Self::Scanning,
                    Self::Failed
                )
        )
    }
}

impl Display for SessionPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::AwaitingEnvironment => "awaiting_environment",
            Self::AwaitingConfig => "awaiting_config",
            Self::Scanning => "scanning",
            Self::Complete => "complete",
            Self::Failed => "failed",
        })
    }
}

/// Terminal notification delivered when a session reaches `Complete` or `Failed`.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutcome {
    /// Session identifier used in logs.
    pub session_id: String,
    /// Final phase.
    pub phase: SessionPhase,
    /// Failure description when `phase` is `Failed`.
    pub reason: Option<String>,
    /// Producer summary when `phase` is `Complete`.
    pub summary: Option<ScanSummary>,
}
