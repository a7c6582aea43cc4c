//! Scan process supervisor.
//!
//! [`ScanProcessBridge`] owns exactly one external scan process for its
//! whole lifetime:
//!
//! 1. Spawn the child with piped stdio and `kill_on_drop(true)`.
//! 2. Write the serialized [`ScanConfig`] as one newline-terminated line to
//!    its stdin while (3) is already running. The pipe is left open
//!    afterwards.
//! 3. Pump parsed events from its stdout to the consumer, in order.
//! 4. When the child goes away without having reported `complete` or
//!    `error`, deliver a synthesized `error` event carrying the failure
//!    detail, so every run ends with exactly one terminal event.
//!
//! [`ScanProcessBridge::stop`] may be called at any time, any number of
//! times. It signals the child, clears the recorded pid and guarantees no
//! further events reach the consumer.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bridge::reader::{pump_events, StreamEnd};
use crate::config::ScanProcessConfig;
use crate::models::event::ScanEvent;
use crate::models::scan::ScanConfig;
use crate::{AppError, Result};

/// Environment variable carrying the configured LLM provider.
pub const PROVIDER_ENV: &str = "LLM_PROVIDER";

/// Environment variable carrying the configured LLM model.
pub const MODEL_ENV: &str = "LLM_MODEL";

/// How to launch the scan process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    /// Program to execute.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Working directory; inherited when `None`.
    pub working_dir: Option<PathBuf>,
    /// Time between the termination signal and a forced kill.
    pub stop_grace: Duration,
}

impl ProcessSpec {
    /// Launch `program` with `args` and the default grace period.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            working_dir: None,
            stop_grace: ScanProcessConfig::default().stop_grace(),
        }
    }

    /// Build a spec from scan process settings.
    #[must_use]
    pub fn from_config(config: &ScanProcessConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            working_dir: config.working_dir.clone(),
            stop_grace: config.stop_grace(),
        }
    }
}

/// Supervises one external scan process and streams its events.
#[derive(Debug)]
pub struct ScanProcessBridge {
    spec: ProcessSpec,
    cancel: CancellationToken,
    pid: Mutex<Option<u32>>,
    used: AtomicBool,
}

impl ScanProcessBridge {
    /// Create a bridge that will launch `spec` on [`run`](Self::run).
    #[must_use]
    pub fn new(spec: ProcessSpec) -> Self {
        Self {
            spec,
            cancel: CancellationToken::new(),
            pid: Mutex::new(None),
            used: AtomicBool::new(false),
        }
    }

    /// Pid of the running child, if one is currently recorded.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        *self.pid.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether [`stop`](Self::stop) has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token cancelled by [`stop`](Self::stop).
    ///
    /// Lets work that precedes the scan (engine readiness) observe a stop
    /// requested before the process exists.
    #[must_use]
    pub fn stop_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run the scan process to completion, delivering events to `on_event`.
    ///
    /// Returns once the child has exited (or was stopped). Process failures
    /// are reported only as a synthesized `error` event, never as `Err`.
    /// When [`stop`](Self::stop) was called before `run`, nothing is spawned.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Bridge` if this bridge has already run; a new
    /// session must construct a new bridge.
    pub async fn run<F>(&self, config: &ScanConfig, mut on_event: F) -> Result<()>
    where
        F: FnMut(ScanEvent),
    {
        if self.used.swap(true, Ordering::SeqCst) {
            return Err(AppError::Bridge("scan process bridge already ran".into()));
        }
        if self.cancel.is_cancelled() {
            debug!("scan bridge stopped before run, not spawning");
            return Ok(());
        }

        let payload = match config.to_wire_line() {
            Ok(line) => line,
            Err(err) => {
                on_event(ScanEvent::synthesized_error(err.to_string()));
                return Ok(());
            }
        };

        let mut child = match self.spawn(config) {
            Ok(child) => child,
            Err(err) => {
                warn!(%err, program = self.spec.program, "scan process spawn failed");
                on_event(ScanEvent::synthesized_error(format!(
                    "failed to start scan process: {err}"
                )));
                return Ok(());
            }
        };

        let pid = child.id();
        self.set_pid(pid);
        info!(pid = pid.unwrap_or(0), program = self.spec.program, "scan process spawned");

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            child.kill().await.ok();
            self.set_pid(None);
            on_event(ScanEvent::synthesized_error("failed to capture scan process stdio"));
            return Ok(());
        };
        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(drain_stderr(stderr)));

        // The child may write before it reads, so the config goes out while
        // stdout is being pumped. The pipe is held open until the child exits.
        let write = async {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => (None, None),
                (stdin, failure) = send_config(stdin, &payload) => (Some(stdin), failure),
            }
        };
        let ((_stdin, write_failure), report) =
            tokio::join!(write, pump_events(stdout, &mut on_event, &self.cancel));

        let exit = match &report.end {
            StreamEnd::Cancelled => None,
            StreamEnd::Eof | StreamEnd::Failed(_) => {
                tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => None,
                    status = child.wait() => Some(status),
                }
            }
        };
        if exit.is_none() {
            self.terminate(&mut child).await;
        }

        self.set_pid(None);
        if let Some(task) = stderr_task {
            task.abort();
        }

        let Some(exit) = exit else {
            info!(delivered = report.delivered, "scan process stopped");
            return Ok(());
        };

        info!(
            delivered = report.delivered,
            terminal = report.terminal_delivered,
            exit = %exit.as_ref().map_or_else(ToString::to_string, describe_exit),
            "scan process finished"
        );

        if !report.terminal_delivered && !self.cancel.is_cancelled() {
            let detail = failure_detail(&report.end, &exit, write_failure.as_deref());
            warn!(%detail, "scan process ended without a terminal event");
            on_event(ScanEvent::synthesized_error(detail));
        }

        Ok(())
    }

    /// Terminate the scan process and stop event delivery.
    ///
    /// Idempotent; safe to call before, during or after [`run`](Self::run).
    pub fn stop(&self) {
        let pid = self
            .pid
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(pid) = pid {
            debug!(pid, "signalling scan process");
            send_terminate(pid);
        }
        self.cancel.cancel();
    }

    fn spawn(&self, config: &ScanConfig) -> std::io::Result<Child> {
        let mut cmd = Command::new(&self.spec.program);
        cmd.args(&self.spec.args);
        if let Some(dir) = &self.spec.working_dir {
            cmd.current_dir(dir);
        }
        if let Some(provider) = config.provider() {
            cmd.env(PROVIDER_ENV, provider);
        }
        if let Some(model) = config.model() {
            cmd.env(MODEL_ENV, model);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
    }

    fn set_pid(&self, pid: Option<u32>) {
        *self.pid.lock().unwrap_or_else(PoisonError::into_inner) = pid;
    }

    /// Give the child the grace period to exit, then kill it.
    async fn terminate(&self, child: &mut Child) {
        match tokio::time::timeout(self.spec.stop_grace, child.wait()).await {
            Ok(Ok(status)) => debug!(exit = %describe_exit(&status), "scan process exited after stop"),
            Ok(Err(err)) => warn!(%err, "failed waiting for stopped scan process"),
            Err(_elapsed) => {
                debug!("scan process ignored termination signal, killing");
                if let Err(err) = child.kill().await {
                    warn!(%err, "failed to kill scan process");
                }
            }
        }
    }
}

impl Drop for ScanProcessBridge {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Write the configuration line; returns the pipe and any write failure.
async fn send_config(mut stdin: ChildStdin, payload: &str) -> (ChildStdin, Option<String>) {
    let result = async {
        stdin.write_all(payload.as_bytes()).await?;
        stdin.flush().await
    }
    .await;

    match result {
        Ok(()) => (stdin, None),
        Err(err) => {
            warn!(error = %err, "failed to write scan configuration");
            (stdin, Some(err.to_string()))
        }
    }
}

async fn drain_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => debug!(line = %line, "scan process stderr"),
            Ok(None) => break,
            Err(err) => {
                debug!(%err, "scan process stderr closed");
                break;
            }
        }
    }
}

#[cfg(unix)]
fn send_terminate(pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    if let Err(err) = kill(Pid::from_raw(raw), Signal::SIGTERM) {
        debug!(pid, %err, "SIGTERM delivery failed");
    }
}

#[cfg(not(unix))]
fn send_terminate(_pid: u32) {
    // The run loop kills the child once the grace period elapses.
}

fn describe_exit(status: &ExitStatus) -> String {
    status.code().map_or_else(
        || "terminated by signal".to_owned(),
        |c| format!("exited with code {c}"),
    )
}

/// Error text for a run that never produced a terminal event.
fn failure_detail(
    end: &StreamEnd,
    exit: &std::io::Result<ExitStatus>,
    write_failure: Option<&str>,
) -> String {
    let exit_text = match exit {
        Ok(status) => format!("scan process {}", describe_exit(status)),
        Err(err) => format!("failed to wait for scan process: {err}"),
    };

    let detail = match end {
        StreamEnd::Failed(err) => format!("{exit_text} after output read failure: {err}"),
        StreamEnd::Eof | StreamEnd::Cancelled => {
            format!("{exit_text} without reporting a result")
        }
    };
    match write_failure {
        Some(write_err) => format!("{detail} (failed to send scan configuration: {write_err})"),
        None => detail,
    }
}
