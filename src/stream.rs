//! Event history, de-duplication and the display window.
//!
//! [`EventStreamModel`] is plain owned state: it performs no I/O and is
//! constructed fresh for every session. Presentation labels are derived on
//! demand by [`EventLabel::classify`] and never stored.

use std::collections::{BTreeMap, HashSet};
use std::fmt::{Display, Formatter};

use chrono::{DateTime, Local, Utc};

use crate::models::event::{non_empty, ScanEvent, Severity};

/// Default number of events in the display window.
pub const DEFAULT_WINDOW: usize = 15;

/// Presentation label for a displayable event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventLabel {
    /// Model reasoning (`progress` with step `reasoning`).
    Think,
    /// Tool invocation (`Executing:` progress).
    Tool,
    /// Shell command (`Running:` progress).
    Cmd,
    /// Agent speech (`Agent says:` progress).
    Agent,
    /// Any other progress message.
    Info,
    /// Agent action.
    Action,
    /// Vulnerability finding.
    Vuln,
    /// Scan error.
    Error,
    /// Scan completion.
    Done,
}

impl EventLabel {
    /// Label for `event`. A pure function of the event.
    #[must_use]
    pub fn classify(event: &ScanEvent) -> Self {
        match event {
            ScanEvent::Progress { step, message, .. } => Self::classify_progress(step, message),
            ScanEvent::AgentAction { .. } => Self::Action,
            ScanEvent::Vulnerability { .. } => Self::Vuln,
            ScanEvent::Error { .. } => Self::Error,
            ScanEvent::Complete { .. } => Self::Done,
        }
    }

    /// Label for a `progress` event with the given step and message.
    #[must_use]
    pub fn classify_progress(step: &str, message: &str) -> Self {
        if step == "reasoning" {
            Self::Think
        } else if message.starts_with("Executing:") {
            Self::Tool
        } else if message.starts_with("Running:") {
            Self::Cmd
        } else if message.starts_with("Agent says:") {
            Self::Agent
        } else {
            Self::Info
        }
    }

    /// Short uppercase tag.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Think => "THINK",
            Self::Tool => "TOOL",
            Self::Cmd => "CMD",
            Self::Agent => "AGENT",
            Self::Info => "INFO",
            Self::Action => "ACTION",
            Self::Vuln => "VULN",
            Self::Error => "ERROR",
            Self::Done => "DONE",
        }
    }
}

impl Display for EventLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// De-duplication identity of an event: `type|timestamp|primary text`.
#[must_use]
pub fn dedup_key(event: &ScanEvent) -> String {
    let text = match event {
        ScanEvent::Progress { message, .. } | ScanEvent::Error { message, .. } => message.clone(),
        ScanEvent::AgentAction { agent, action, .. } => format!("{}|{action}", agent.as_str()),
        ScanEvent::Vulnerability {
            title, endpoint, ..
        } => format!("{title}|{endpoint}"),
        ScanEvent::Complete { .. } => String::new(),
    };
    format!("{}|{}|{text}", event.kind(), event.timestamp())
}

/// Whether `event` is a line in the event log.
///
/// `complete` only drives the session phase.
#[must_use]
pub fn is_displayable(event: &ScanEvent) -> bool {
    !matches!(event, ScanEvent::Complete { .. })
}

/// One log line for `event`: `HH:MM:SS [LABEL] text`, in local time.
#[must_use]
pub fn render_line(event: &ScanEvent) -> String {
    #[allow(clippy::cast_possible_truncation)]
    let time = DateTime::<Utc>::from_timestamp(event.timestamp() as i64, 0).map_or_else(
        || "--:--:--".to_owned(),
        |t| t.with_timezone(&Local).format("%H:%M:%S").to_string(),
    );

    let text = match event {
        ScanEvent::Vulnerability {
            severity,
            title,
            endpoint,
            ..
        } => format!("{severity} {title} @ {endpoint}"),
        ScanEvent::AgentAction {
            agent,
            action,
            command,
            ..
        } => match non_empty(command.as_ref()) {
            Some(cmd) => format!("{}: {action} ({cmd})", agent.as_str()),
            None => format!("{}: {action}", agent.as_str()),
        },
        other => other.primary_text(),
    };

    format!("{time} [{}] {text}", EventLabel::classify(event))
}

/// Counters over the accepted history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Events accepted into the history.
    pub accepted: usize,
    /// Events dropped as duplicates.
    pub duplicates: usize,
    /// Accepted vulnerabilities per severity.
    pub vulnerabilities: BTreeMap<Severity, usize>,
}

/// Per-session event history with de-duplication and windowing.
#[derive(Debug, Clone)]
pub struct EventStreamModel {
    seen_keys: HashSet<String>,
    events: Vec<ScanEvent>,
    window: usize,
    duplicates: usize,
}

impl Default for EventStreamModel {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStreamModel {
    /// Empty model with the default window of [`DEFAULT_WINDOW`] events.
    #[must_use]
    pub fn new() -> Self {
        Self::with_window(DEFAULT_WINDOW)
    }

    /// Empty model with a custom window size (at least one).
    #[must_use]
    pub fn with_window(window: usize) -> Self {
        Self {
            seen_keys: HashSet::new(),
            events: Vec::new(),
            window: window.max(1),
            duplicates: 0,
        }
    }

    /// Record an event; returns `false` if it was a duplicate and dropped.
    pub fn record(&mut self, event: ScanEvent) -> bool {
        if !self.seen_keys.insert(dedup_key(&event)) {
            self.duplicates += 1;
            return false;
        }
        self.events.push(event);
        true
    }

    /// Most recent displayable events, oldest first, at most `window` long.
    #[must_use]
    pub fn displayable(&self) -> Vec<&ScanEvent> {
        let mut recent: Vec<&ScanEvent> = self
            .events
            .iter()
            .rev()
            .filter(|event| is_displayable(event))
            .take(self.window)
            .collect();
        recent.reverse();
        recent
    }

    /// [`displayable`](Self::displayable) rendered with [`render_line`].
    #[must_use]
    pub fn render_window(&self) -> Vec<String> {
        self.displayable().into_iter().map(render_line).collect()
    }

    /// Full accepted history in arrival order.
    #[must_use]
    pub fn history(&self) -> &[ScanEvent] {
        &self.events
    }

    /// Configured window size.
    #[must_use]
    pub fn window(&self) -> usize {
        self.window
    }

    /// Counters over the accepted history.
    #[must_use]
    pub fn stats(&self) -> StreamStats {
        let mut vulnerabilities = BTreeMap::new();
        for event in &self.events {
            if let ScanEvent::Vulnerability { severity, .. } = event {
                *vulnerabilities.entry(*severity).or_insert(0) += 1;
            }
        }
        StreamStats {
            accepted: self.events.len(),
            duplicates: self.duplicates,
            vulnerabilities,
        }
    }
}
