//! Shared helpers for tests that run real scan processes through `sh`.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use inferno_bridge::bridge::{ProcessSpec, ScanProcessBridge};
use inferno_bridge::models::event::ScanEvent;
use inferno_bridge::models::session::SessionOutcome;
use inferno_bridge::orchestrator::SessionObserver;
use inferno_bridge::stream::EventStreamModel;

/// Upper bound for any single scan in these tests.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(15);

pub const PROGRESS_LINE: &str =
    r#"{"type":"progress","step":"init","message":"Starting","timestamp":1}"#;
pub const COMPLETE_LINE: &str =
    r#"{"type":"complete","summary":{"vulnerabilities":0,"time":1.0},"timestamp":2}"#;
pub const ERROR_LINE: &str =
    r#"{"type":"error","message":"target unreachable","timestamp":3}"#;

/// Process spec running `script` under `sh -c`, with `extra` as `$0`, `$1`, ...
pub fn shell_spec(script: &str, extra: &[&str]) -> ProcessSpec {
    let mut args = vec!["-c".to_owned(), script.to_owned()];
    args.extend(extra.iter().map(|s| (*s).to_owned()));
    let mut spec = ProcessSpec::new("sh", args);
    spec.stop_grace = Duration::from_millis(500);
    spec
}

/// Script that consumes the configuration line, then prints `lines`.
pub fn emit_script(lines: &[&str]) -> String {
    let mut script = String::from("read -r config\n");
    for line in lines {
        script.push_str("printf '%s\\n' '");
        script.push_str(line);
        script.push_str("'\n");
    }
    script
}

pub fn shell_bridge(script: &str) -> ScanProcessBridge {
    ScanProcessBridge::new(shell_spec(script, &[]))
}

/// Observer recording every notification it receives.
#[derive(Default)]
pub struct RecordingObserver {
    pub progress: Vec<String>,
    pub events: Vec<ScanEvent>,
    pub finished: Vec<SessionOutcome>,
    /// Stopped as soon as the first event arrives.
    pub stop_on_first_event: Option<Arc<ScanProcessBridge>>,
}

impl SessionObserver for RecordingObserver {
    fn on_environment_progress(&mut self, message: &str) {
        self.progress.push(message.to_owned());
    }

    fn on_event(&mut self, event: &ScanEvent, _stream: &EventStreamModel) {
        self.events.push(event.clone());
        if let Some(bridge) = &self.stop_on_first_event {
            bridge.stop();
        }
    }

    fn on_finished(&mut self, outcome: &SessionOutcome) {
        self.finished.push(outcome.clone());
    }
}
