//! Session lifecycle controller.
//!
//! Composes the engine bootstrapper, the scan process bridge and the event
//! stream model into one session:
//!
//! ```text
//! AwaitingEnvironment ──ready──▶ AwaitingConfig ──submit──▶ Scanning ──complete──▶ Complete
//!          │                           │                       │
//!          └───────────────────────────┴───────────────────────┴──▶ Failed
//! ```
//!
//! `Complete` and `Failed` are terminal: later events are ignored and the
//! bridge is stopped on every exit path.

use std::sync::Arc;

use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::bridge::ScanProcessBridge;
use crate::engine::bootstrap::{EngineBootstrapper, INTERRUPTED};
use crate::models::engine::EngineStatus;
use crate::models::event::{ScanEvent, ScanSummary};
use crate::models::scan::ScanConfig;
use crate::models::session::{SessionOutcome, SessionPhase};
use crate::stream::EventStreamModel;
use crate::{AppError, Result};

/// Receives session notifications.
///
/// All methods default to no-ops so consumers implement only what they
/// render.
pub trait SessionObserver {
    /// Human-readable environment readiness progress.
    fn on_environment_progress(&mut self, _message: &str) {}

    /// An event was accepted into the session stream.
    fn on_event(&mut self, _event: &ScanEvent, _stream: &EventStreamModel) {}

    /// The session reached `Complete` or `Failed`.
    fn on_finished(&mut self, _outcome: &SessionOutcome) {}
}

/// Drives one scan session from environment check to a terminal phase.
pub struct SessionController {
    session_id: String,
    phase: SessionPhase,
    stream: EventStreamModel,
    bridge: Arc<ScanProcessBridge>,
    config: Option<ScanConfig>,
    environment: Option<EngineStatus>,
    failure: Option<String>,
    summary: Option<ScanSummary>,
}

impl SessionController {
    /// New session in `AwaitingEnvironment` owning `bridge` and `stream`.
    #[must_use]
    pub fn new(bridge: ScanProcessBridge, stream: EventStreamModel) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            phase: SessionPhase::AwaitingEnvironment,
            stream,
            bridge: Arc::new(bridge),
            config: None,
            environment: None,
            failure: None,
            summary: None,
        }
    }

    /// Session identifier used in logs.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Event stream state for presentation.
    #[must_use]
    pub fn stream(&self) -> &EventStreamModel {
        &self.stream
    }

    /// Engine status reported by the last successful readiness check.
    #[must_use]
    pub fn environment(&self) -> Option<EngineStatus> {
        self.environment
    }

    /// Shared handle to the bridge, for stopping it from elsewhere
    /// (e.g. a signal handler) while a scan is running.
    #[must_use]
    pub fn bridge_handle(&self) -> Arc<ScanProcessBridge> {
        Arc::clone(&self.bridge)
    }

    /// Failure description once the session has failed.
    #[must_use]
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Wait for the container engine to become ready.
    ///
    /// On success the session moves to `AwaitingConfig`; on failure it
    /// moves to `Failed` and the environment error is returned. Stopping the
    /// bridge meanwhile abandons the remaining stages and fails the session
    /// as interrupted.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Environment` from the bootstrapper, or
    /// `AppError::Validation` if the session is not awaiting the environment.
    pub async fn prepare_environment(
        &mut self,
        bootstrapper: &EngineBootstrapper,
        on_progress: impl FnMut(&str),
    ) -> Result<EngineStatus> {
        self.expect_phase(SessionPhase::AwaitingEnvironment)?;

        let bridge = Arc::clone(&self.bridge);
        match bootstrapper
            .ensure_ready_until(bridge.stop_token(), on_progress)
            .await
        {
            Ok(status) => {
                self.environment = Some(status);
                self.transition(SessionPhase::AwaitingConfig);
                Ok(status)
            }
            Err(err) => {
                warn!(session_id = self.session_id, %err, "environment not ready");
                let reason = if bridge.is_stopped() {
                    INTERRUPTED.to_owned()
                } else {
                    err.to_string()
                };
                self.fail(reason);
                self.teardown();
                Err(err)
            }
        }
    }

    /// Move to `AwaitingConfig` without checking the engine.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` if the session is not awaiting the environment.
    pub fn skip_environment(&mut self) -> Result<()> {
        self.expect_phase(SessionPhase::AwaitingEnvironment)?;
        info!(session_id = self.session_id, "environment check skipped");
        self.transition(SessionPhase::AwaitingConfig);
        Ok(())
    }

    /// Accept the scan configuration and move to `Scanning`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` if the session is not awaiting its
    /// configuration.
    pub fn submit_config(&mut self, config: ScanConfig) -> Result<()> {
        self.expect_phase(SessionPhase::AwaitingConfig)?;
        info!(
            session_id = self.session_id,
            target = config.target(),
            "scan configuration submitted"
        );
        self.config = Some(config);
        self.transition(SessionPhase::Scanning);
        Ok(())
    }

    /// Run the scan process until a terminal phase is reached.
    ///
    /// Every accepted event is passed to `observer`. The bridge is stopped
    /// before returning, whatever the outcome.
    pub async fn run_scan<O>(&mut self, observer: &mut O) -> SessionOutcome
    where
        O: SessionObserver + ?Sized,
    {
        let Some(config) = self.config.clone() else {
            self.fail("scan started without a configuration".into());
            return self.finish(observer);
        };
        if self.phase != SessionPhase::Scanning {
            self.fail(format!("scan started in phase {}", self.phase));
            return self.finish(observer);
        }

        let bridge = Arc::clone(&self.bridge);
        let span = info_span!("scan", session_id = %self.session_id);
        let result = bridge
            .run(&config, |event| {
                if self.handle_event(&event) {
                    observer.on_event(&event, &self.stream);
                }
            })
            .instrument(span)
            .await;

        if let Err(err) = result {
            self.fail(err.to_string());
        }
        if self.phase == SessionPhase::Scanning {
            let reason = if bridge.is_stopped() {
                INTERRUPTED
            } else {
                "scan process ended without a terminal event"
            };
            self.fail(reason.into());
        }

        self.finish(observer)
    }

    /// Full lifecycle: readiness (unless `bootstrapper` is `None`), config
    /// submission, scan.
    pub async fn run<O>(
        &mut self,
        bootstrapper: Option<&EngineBootstrapper>,
        config: ScanConfig,
        observer: &mut O,
    ) -> SessionOutcome
    where
        O: SessionObserver + ?Sized,
    {
        let prepared = match bootstrapper {
            Some(bootstrapper) => self
                .prepare_environment(bootstrapper, |message| {
                    observer.on_environment_progress(message);
                })
                .await
                .map(|_| ()),
            None => self.skip_environment(),
        };
        if prepared.is_err() {
            return self.finish(observer);
        }
        if self.bridge.is_stopped() {
            self.fail(INTERRUPTED.into());
            return self.finish(observer);
        }

        if let Err(err) = self.submit_config(config) {
            self.fail(err.to_string());
            return self.finish(observer);
        }

        self.run_scan(observer).await
    }

    /// Apply one event to the session.
    ///
    /// Returns `true` if the event was accepted into the stream. Events are
    /// rejected outside `Scanning` (in particular after a terminal event)
    /// and when they duplicate an earlier event.
    pub fn handle_event(&mut self, event: &ScanEvent) -> bool {
        if self.phase != SessionPhase::Scanning {
            debug!(
                session_id = self.session_id,
                kind = event.kind(),
                phase = %self.phase,
                "event ignored outside scanning phase"
            );
            return false;
        }
        if !self.stream.record(event.clone()) {
            debug!(session_id = self.session_id, kind = event.kind(), "duplicate event dropped");
            return false;
        }

        match event {
            ScanEvent::Complete { summary, .. } => {
                self.summary = Some(summary.clone());
                self.transition(SessionPhase::Complete);
            }
            ScanEvent::Error { message, .. } => self.fail(message.clone()),
            _ => {}
        }
        true
    }

    /// Stop the bridge and fail the session unless it already ended.
    pub fn interrupt(&mut self) {
        self.teardown();
        self.fail(INTERRUPTED.into());
    }

    /// Stop the bridge. Safe to call repeatedly.
    pub fn teardown(&self) {
        self.bridge.stop();
    }

    /// Terminal notification, once the session has ended.
    #[must_use]
    pub fn outcome(&self) -> Option<SessionOutcome> {
        self.phase.is_terminal().then(|| self.snapshot())
    }

    fn snapshot(&self) -> SessionOutcome {
        SessionOutcome {
            session_id: self.session_id.clone(),
            phase: self.phase,
            reason: self.failure.clone(),
            summary: self.summary.clone(),
        }
    }

    fn finish<O>(&mut self, observer: &mut O) -> SessionOutcome
    where
        O: SessionObserver + ?Sized,
    {
        self.teardown();
        if !self.phase.is_terminal() {
            self.fail("session ended before reaching a terminal phase".into());
        }
        let outcome = self.snapshot();
        info!(
            session_id = self.session_id,
            phase = %outcome.phase,
            reason = outcome.reason.as_deref().unwrap_or(""),
            "session finished"
        );
        observer.on_finished(&outcome);
        outcome
    }

    fn expect_phase(&self, expected: SessionPhase) -> Result<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(AppError::Validation(format!(
                "session is {}, expected {expected}",
                self.phase
            )))
        }
    }

    fn transition(&mut self, next: SessionPhase) {
        if self.phase.can_transition_to(next) {
            info!(session_id = self.session_id, from = %self.phase, to = %next, "session phase changed");
            self.phase = next;
        } else {
            warn!(session_id = self.session_id, from = %self.phase, to = %next, "rejected phase transition");
        }
    }

    fn fail(&mut self, reason: String) {
        if self.phase.is_terminal() {
            return;
        }
        warn!(session_id = self.session_id, reason, "session failed");
        self.failure = Some(reason);
        self.transition(SessionPhase::Failed);
    }
}
