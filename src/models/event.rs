//! Scan events emitted by the external scan process.
//!
//! Each inbound protocol line is one JSON object discriminated by its
//! `type` field:
//!
//! | `type`         | Variant                        |
//! |----------------|--------------------------------|
//! | `progress`     | [`ScanEvent::Progress`]        |
//! | `agent_action` | [`ScanEvent::AgentAction`]     |
//! | `vulnerability`| [`ScanEvent::Vulnerability`]   |
//! | `complete`     | [`ScanEvent::Complete`]        |
//! | `error`        | [`ScanEvent::Error`]           |
//!
//! Timestamps are seconds since the epoch. Producers do not guarantee they
//! are monotonic.

use std::fmt::{Display, Formatter};

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Severity attached to a reported vulnerability.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Immediate compromise.
    Critical,
    /// Serious impact.
    High,
    /// Moderate impact.
    Medium,
    /// Minor impact.
    Low,
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        })
    }
}

/// Agent inside the scan process that performed an action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Coordinating agent.
    Main,
    /// Agent executing commands inside the container sandbox.
    Sandbox,
    /// Agent confirming candidate findings.
    Validator,
}

impl AgentRole {
    /// Lowercase wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Sandbox => "sandbox",
            Self::Validator => "validator",
        }
    }
}

/// Final figures reported with a `complete` event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanSummary {
    /// Number of confirmed vulnerabilities.
    pub vulnerabilities: u64,
    /// Wall-clock scan duration in seconds.
    pub time: f64,
    /// Provider cost, preformatted by the producer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<String>,
}

/// One structured event from the scan process output stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScanEvent {
    /// Free-form progress report.
    Progress {
        /// Producer-defined step name (`reasoning`, `scanning`, ...).
        step: String,
        /// Human-readable message.
        message: String,
        /// Untruncated reasoning text for `reasoning` steps.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        full_reasoning: Option<String>,
        /// Seconds since the epoch.
        timestamp: f64,
    },
    /// An agent performed an action.
    AgentAction {
        /// Acting agent.
        agent: AgentRole,
        /// Short action description.
        action: String,
        /// Command line the action ran, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        command: Option<String>,
        /// Command result excerpt, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
        /// Seconds since the epoch.
        timestamp: f64,
    },
    /// A vulnerability was found.
    Vulnerability {
        /// Assessed severity.
        severity: Severity,
        /// Finding title.
        title: String,
        /// Affected endpoint.
        endpoint: String,
        /// Supporting evidence.
        evidence: String,
        /// Seconds since the epoch.
        timestamp: f64,
    },
    /// The scan finished.
    Complete {
        /// Final figures.
        summary: ScanSummary,
        /// Seconds since the epoch.
        timestamp: f64,
    },
    /// The scan failed.
    Error {
        /// Failure description.
        message: String,
        /// Producer-side stack trace.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stack: Option<String>,
        /// Seconds since the epoch.
        timestamp: f64,
    },
}

impl ScanEvent {
    /// Build an `error` event stamped with the current time.
    ///
    /// Used when the bridge has to report a failure the producer never did.
    #[must_use]
    pub fn synthesized_error(message: impl Into<String>) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let timestamp = Utc::now().timestamp() as f64;
        Self::Error {
            message: message.into(),
            stack: None,
            timestamp,
        }
    }

    /// Wire discriminator of this event.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Progress { .. } => "progress",
            Self::AgentAction { .. } => "agent_action",
            Self::Vulnerability { .. } => "vulnerability",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
        }
    }

    /// Seconds since the epoch carried by the event.
    #[must_use]
    pub fn timestamp(&self) -> f64 {
        match self {
            Self::Progress { timestamp, .. }
            | Self::AgentAction { timestamp, .. }
            | Self::Vulnerability { timestamp, .. }
            | Self::Complete { timestamp, .. }
            | Self::Error { timestamp, .. } => *timestamp,
        }
    }

    /// Whether this event ends a session's stream (`complete` or `error`).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }

    /// Main human-readable text of the event.
    #[must_use]
    pub fn primary_text(&self) -> String {
        match self {
            Self::Progress { message, .. } | Self::Error { message, .. } => message.clone(),
            Self::AgentAction { agent, action, .. } => format!("{}: {action}", agent.as_str()),
            Self::Vulnerability {
                title, endpoint, ..
            } => format!("{title} @ {endpoint}"),
            Self::Complete { summary, .. } => format!(
                "{} vulnerabilities in {:.0}s",
                summary.vulnerabilities, summary.time
            ),
        }
    }
}

/// Treat an empty optional string from the wire as absent.
#[must_use]
pub fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.trim().is_empty())
}
