//! Container engine readiness state machine.
//!
//! Brings the engine to the ready state in three strictly sequential
//! stages, each entered only when the previous one is satisfied:
//!
//! 1. **Install** the engine if the version query fails.
//! 2. **Start** the daemon if the live listing fails, then poll until it
//!    answers (bounded by `start_attempts` polls, one per interval).
//! 3. **Build** the scan image if the tag lookup comes back empty.
//!
//! Progress is reported through a caller-supplied callback before and
//! after each remediation step.
//!
//! A stop token is checked before every stage and raced against each poll
//! sleep. A remediation command already running is left to finish.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use crate::config::EngineConfig;
use crate::engine::commands::{EngineCommands, MANUAL_INSTALL_URL};
use crate::engine::probe::EngineProbe;
use crate::engine::runner::{CommandRunner, EngineCommand, Sleeper, TokioSleeper};
use crate::models::engine::{BootstrapStage, EngineStatus};
use crate::{AppError, Result};

/// Cause reported when the stop token fires during bootstrap.
pub const INTERRUPTED: &str = "interrupted";

/// Drives the install → start → build readiness sequence.
#[derive(Clone)]
pub struct EngineBootstrapper {
    probe: EngineProbe,
    runner: Arc<dyn CommandRunner>,
    sleeper: Arc<dyn Sleeper>,
    commands: Arc<EngineCommands>,
    start_attempts: u32,
    poll_interval: Duration,
}

impl EngineBootstrapper {
    /// Create a bootstrapper with explicit seams.
    #[must_use]
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        sleeper: Arc<dyn Sleeper>,
        commands: EngineCommands,
        start_attempts: u32,
        poll_interval: Duration,
    ) -> Self {
        let commands = Arc::new(commands);
        Self {
            probe: EngineProbe::new(Arc::clone(&runner), Arc::clone(&commands)),
            runner,
            sleeper,
            commands,
            start_attempts,
            poll_interval,
        }
    }

    /// Create a bootstrapper for the running host from engine settings.
    #[must_use]
    pub fn from_config(config: &EngineConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self::new(
            runner,
            Arc::new(TokioSleeper),
            EngineCommands::for_current_platform(config),
            config.start_attempts,
            config.poll_interval(),
        )
    }

    /// Probe used for status queries.
    #[must_use]
    pub fn probe(&self) -> &EngineProbe {
        &self.probe
    }

    /// Bring the engine to the ready state.
    ///
    /// When the engine is already ready this only probes and returns.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Environment` naming the stage that could not be
    /// satisfied. A failed stage stops the sequence; later stages are not
    /// attempted.
    pub async fn ensure_ready(&self, on_progress: impl FnMut(&str)) -> Result<EngineStatus> {
        self.ensure_ready_until(&CancellationToken::new(), on_progress).await
    }

    /// [`ensure_ready`](Self::ensure_ready), abandoned once `stop` fires.
    ///
    /// # Errors
    ///
    /// As `ensure_ready`; a fired `stop` yields `AppError::Environment` for
    /// the stage about to run, with cause [`INTERRUPTED`].
    pub async fn ensure_ready_until(
        &self,
        stop: &CancellationToken,
        mut on_progress: impl FnMut(&str),
    ) -> Result<EngineStatus> {
        let span = info_span!("ensure_ready", platform = %self.commands.platform);
        async move {
            on_progress("Checking Docker status...");
            let mut status = self.probe.status().await;
            info!(
                installed = status.installed,
                running = status.running,
                image_built = status.image_built,
                "engine status probed"
            );

            if status.is_ready() {
                on_progress("Docker environment ready");
                return Ok(status);
            }

            if !status.installed {
                check_stop(stop, BootstrapStage::Install)?;
                on_progress("Docker not found. Installing Docker...");
                self.install().await?;
                status.installed = true;
                on_progress("Docker installed");
            }

            if !status.running {
                check_stop(stop, BootstrapStage::Start)?;
                on_progress("Starting Docker...");
                let polled = self.start(stop).await?;
                status.running = true;
                status.image_built = polled.image_built;
                on_progress("Docker is running");
            }

            if !status.image_built {
                check_stop(stop, BootstrapStage::Build)?;
                on_progress("Building scan image (this may take a few minutes)...");
                self.build().await?;
                status.image_built = true;
                on_progress("Scan image built");
            }

            on_progress("Docker environment ready");
            Ok(status)
        }
        .instrument(span)
        .await
    }

    async fn install(&self) -> Result<()> {
        let Some(command) = &self.commands.install else {
            return Err(AppError::environment(
                BootstrapStage::Install,
                format!(
                    "automatic installation is not supported on {}; install Docker manually from {MANUAL_INSTALL_URL}",
                    self.commands.platform
                ),
            ));
        };
        info!(command = %command, "installing container engine");
        self.remediate(BootstrapStage::Install, command).await
    }

    /// Issue the start command, then poll until the daemon answers.
    ///
    /// Returns the first status that reports `running`.
    async fn start(&self, stop: &CancellationToken) -> Result<EngineStatus> {
        let Some(command) = &self.commands.start else {
            return Err(AppError::environment(
                BootstrapStage::Start,
                format!(
                    "no start procedure for {}; start Docker manually",
                    self.commands.platform
                ),
            ));
        };
        info!(command = %command, "starting container engine");
        self.remediate(BootstrapStage::Start, command).await?;

        for attempt in 1..=self.start_attempts {
            tokio::select! {
                biased;
                () = stop.cancelled() => {
                    info!(attempt, "start polling stopped");
                    return Err(AppError::environment(BootstrapStage::Start, INTERRUPTED));
                }
                () = self.sleeper.sleep(self.poll_interval) => {}
            }
            let status = self.probe.status().await;
            if status.running {
                info!(attempt, "container engine is running");
                return Ok(status);
            }
        }

        warn!(
            attempts = self.start_attempts,
            "container engine did not start in time"
        );
        Err(AppError::environment(BootstrapStage::Start, "timeout"))
    }

    async fn build(&self) -> Result<()> {
        info!(command = %self.commands.build, "building scan image");
        self.remediate(BootstrapStage::Build, &self.commands.build).await
    }

    /// Run a remediation command; anything but a zero exit fails `stage`.
    async fn remediate(&self, stage: BootstrapStage, command: &EngineCommand) -> Result<()> {
        let output = self
            .runner
            .run(command)
            .await
            .map_err(|err| AppError::environment(stage, err.to_string()))?;

        if output.success {
            Ok(())
        } else {
            warn!(%stage, command = %command, detail = %output.failure_detail(), "remediation command failed");
            Err(AppError::environment(stage, output.failure_detail()))
        }
    }
}

fn check_stop(stop: &CancellationToken, stage: BootstrapStage) -> Result<()> {
    if stop.is_cancelled() {
        info!(%stage, "bootstrap stopped before stage");
        Err(AppError::environment(stage, INTERRUPTED))
    } else {
        Ok(())
    }
}
