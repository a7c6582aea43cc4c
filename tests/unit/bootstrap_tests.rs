//! Unit tests for the install → start → build readiness sequence.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use inferno_bridge::engine::bootstrap::{EngineBootstrapper, INTERRUPTED};
use inferno_bridge::engine::commands::{EngineCommands, MANUAL_INSTALL_URL};
use inferno_bridge::engine::runner::{CommandOutput, Sleeper};
use inferno_bridge::models::engine::{BootstrapStage, EngineStatus};
use inferno_bridge::AppError;

use crate::common::{
    linux_commands, unsupported_commands, InstantSleeper, ScriptedRunner, BUILD, IMAGE_LOOKUP,
    LINUX_INSTALL, LINUX_START, LIST, VERSION,
};

const READY: EngineStatus = EngineStatus {
    installed: true,
    running: true,
    image_built: true,
};

fn bootstrapper(
    runner: &Arc<ScriptedRunner>,
    sleeper: &Arc<InstantSleeper>,
    commands: EngineCommands,
) -> EngineBootstrapper {
    EngineBootstrapper::new(
        runner.clone(),
        sleeper.clone(),
        commands,
        30,
        Duration::from_secs(1),
    )
}

async fn ensure_ready(
    bootstrapper: &EngineBootstrapper,
) -> (inferno_bridge::Result<EngineStatus>, Vec<String>) {
    let mut progress = Vec::new();
    let result = bootstrapper
        .ensure_ready(|message| progress.push(message.to_owned()))
        .await;
    (result, progress)
}

fn stage_of(err: &AppError) -> Option<BootstrapStage> {
    match err {
        AppError::Environment { stage, .. } => Some(*stage),
        _ => None,
    }
}

#[tokio::test]
async fn ready_engine_only_probes() {
    let runner = Arc::new(ScriptedRunner::ready());
    let sleeper = Arc::new(InstantSleeper::default());
    let bootstrapper = bootstrapper(&runner, &sleeper, linux_commands());

    let (result, progress) = ensure_ready(&bootstrapper).await;

    assert_eq!(result.expect("ready"), READY);
    assert_eq!(progress, ["Checking Docker status...", "Docker environment ready"]);
    assert_eq!(runner.calls(), [VERSION, LIST, IMAGE_LOOKUP]);
    assert_eq!(sleeper.count(), 0);
}

#[tokio::test]
async fn ensure_ready_is_idempotent_once_ready() {
    let runner = Arc::new(ScriptedRunner::ready());
    let sleeper = Arc::new(InstantSleeper::default());
    let bootstrapper = bootstrapper(&runner, &sleeper, linux_commands());

    let (first, _) = ensure_ready(&bootstrapper).await;
    let (second, _) = ensure_ready(&bootstrapper).await;

    assert_eq!(first.expect("first"), READY);
    assert_eq!(second.expect("second"), READY);
    assert_eq!(runner.count(LINUX_INSTALL), 0);
    assert_eq!(runner.count(LINUX_START), 0);
    assert_eq!(runner.count(BUILD), 0);
}

#[tokio::test]
async fn fresh_linux_host_runs_every_stage_in_order() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .on(
                VERSION,
                vec![
                    CommandOutput::failed(127, "docker: command not found"),
                    CommandOutput::ok("Docker version 27.0.3"),
                ],
            )
            .on(
                LIST,
                vec![
                    CommandOutput::failed(1, "Cannot connect to the Docker daemon"),
                    CommandOutput::ok("CONTAINER ID"),
                ],
            )
            .on(IMAGE_LOOKUP, vec![CommandOutput::ok("")])
            .on(LINUX_INSTALL, vec![CommandOutput::ok("")])
            .on(LINUX_START, vec![CommandOutput::ok("")])
            .on(BUILD, vec![CommandOutput::ok("Successfully built")]),
    );
    let sleeper = Arc::new(InstantSleeper::default());
    let bootstrapper = bootstrapper(&runner, &sleeper, linux_commands());

    let (result, progress) = ensure_ready(&bootstrapper).await;

    assert_eq!(result.expect("ready"), READY);
    assert_eq!(
        progress,
        [
            "Checking Docker status...",
            "Docker not found. Installing Docker...",
            "Docker installed",
            "Starting Docker...",
            "Docker is running",
            "Building scan image (this may take a few minutes)...",
            "Scan image built",
            "Docker environment ready",
        ]
    );
    assert_eq!(runner.count(LINUX_INSTALL), 1);
    assert_eq!(runner.count(LINUX_START), 1);
    assert_eq!(runner.count(BUILD), 1);
    assert_eq!(sleeper.count(), 2, "running on the second poll");

    let calls = runner.calls();
    let position = |cmd: &str| calls.iter().position(|c| c == cmd).expect("called");
    assert!(position(LINUX_INSTALL) < position(LINUX_START));
    assert!(position(LINUX_START) < position(BUILD));
}

#[tokio::test]
async fn start_times_out_after_thirty_polls() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .on(VERSION, vec![CommandOutput::ok("Docker version 27.0.3")])
            .on(LIST, vec![CommandOutput::failed(1, "daemon not running")])
            .on(LINUX_START, vec![CommandOutput::ok("")]),
    );
    let sleeper = Arc::new(InstantSleeper::default());
    let bootstrapper = bootstrapper(&runner, &sleeper, linux_commands());

    let (result, progress) = ensure_ready(&bootstrapper).await;

    let err = result.expect_err("start must time out");
    assert_eq!(err, AppError::environment(BootstrapStage::Start, "timeout"));
    assert_eq!(sleeper.count(), 30);
    assert_eq!(runner.count(LIST), 31, "initial probe plus one per poll");
    assert_eq!(runner.count(BUILD), 0);
    assert_eq!(progress.last().map(String::as_str), Some("Starting Docker..."));
}

#[tokio::test]
async fn start_succeeds_on_third_poll_and_skips_build_when_image_present() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .on(VERSION, vec![CommandOutput::ok("Docker version 27.0.3")])
            .on(
                LIST,
                vec![
                    CommandOutput::failed(1, "down"),
                    CommandOutput::failed(1, "down"),
                    CommandOutput::failed(1, "down"),
                    CommandOutput::ok("CONTAINER ID"),
                ],
            )
            .on(IMAGE_LOOKUP, vec![CommandOutput::ok("3f9a1c2b\n")])
            .on(LINUX_START, vec![CommandOutput::ok("")]),
    );
    let sleeper = Arc::new(InstantSleeper::default());
    let bootstrapper = bootstrapper(&runner, &sleeper, linux_commands());

    let (result, progress) = ensure_ready(&bootstrapper).await;

    assert_eq!(result.expect("ready"), READY);
    assert_eq!(sleeper.count(), 3);
    assert_eq!(runner.count(BUILD), 0);
    assert!(!progress.iter().any(|p| p.starts_with("Building")));
}

#[tokio::test]
async fn failing_start_command_fails_without_polling() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .on(VERSION, vec![CommandOutput::ok("Docker version 27.0.3")])
            .on(LIST, vec![CommandOutput::failed(1, "down")])
            .on(LINUX_START, vec![CommandOutput::failed(1, "sudo: a password is required")]),
    );
    let sleeper = Arc::new(InstantSleeper::default());
    let bootstrapper = bootstrapper(&runner, &sleeper, linux_commands());

    let (result, _) = ensure_ready(&bootstrapper).await;

    assert_eq!(
        result.expect_err("start fails"),
        AppError::environment(
            BootstrapStage::Start,
            "exited with code 1: sudo: a password is required"
        )
    );
    assert_eq!(sleeper.count(), 0);
}

#[tokio::test]
async fn install_failure_stops_the_sequence() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .on(VERSION, vec![CommandOutput::failed(127, "")])
            .on(LINUX_INSTALL, vec![CommandOutput::failed(1, "curl: not found")]),
    );
    let sleeper = Arc::new(InstantSleeper::default());
    let bootstrapper = bootstrapper(&runner, &sleeper, linux_commands());

    let (result, progress) = ensure_ready(&bootstrapper).await;

    let err = result.expect_err("install fails");
    assert_eq!(stage_of(&err), Some(BootstrapStage::Install));
    assert!(err.to_string().contains("curl: not found"));
    assert_eq!(runner.count(LINUX_START), 0);
    assert_eq!(runner.count(BUILD), 0);
    assert!(!progress.iter().any(|p| p == "Docker installed"));
}

#[tokio::test]
async fn install_command_that_cannot_run_is_an_install_failure() {
    let runner = Arc::new(ScriptedRunner::new().on(VERSION, vec![CommandOutput::failed(127, "")]));
    let sleeper = Arc::new(InstantSleeper::default());
    let bootstrapper = bootstrapper(&runner, &sleeper, linux_commands());

    let (result, _) = ensure_ready(&bootstrapper).await;

    let err = result.expect_err("install cannot run");
    assert_eq!(stage_of(&err), Some(BootstrapStage::Install));
    assert!(err.to_string().contains("not found"));
}

#[tokio::test]
async fn build_failure_reports_build_stage() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .on(VERSION, vec![CommandOutput::ok("Docker version 27.0.3")])
            .on(LIST, vec![CommandOutput::ok("CONTAINER ID")])
            .on(IMAGE_LOOKUP, vec![CommandOutput::ok("")])
            .on(BUILD, vec![CommandOutput::failed(1, "no Dockerfile")]),
    );
    let sleeper = Arc::new(InstantSleeper::default());
    let bootstrapper = bootstrapper(&runner, &sleeper, linux_commands());

    let (result, progress) = ensure_ready(&bootstrapper).await;

    assert_eq!(
        result.expect_err("build fails"),
        AppError::environment(BootstrapStage::Build, "exited with code 1: no Dockerfile")
    );
    assert_eq!(
        progress.last().map(String::as_str),
        Some("Building scan image (this may take a few minutes)...")
    );
}

#[tokio::test]
async fn unsupported_platform_cannot_install() {
    let runner = Arc::new(ScriptedRunner::new().on(VERSION, vec![CommandOutput::failed(127, "")]));
    let sleeper = Arc::new(InstantSleeper::default());
    let bootstrapper = bootstrapper(&runner, &sleeper, unsupported_commands());

    let (result, _) = ensure_ready(&bootstrapper).await;

    let err = result.expect_err("no installer");
    assert_eq!(stage_of(&err), Some(BootstrapStage::Install));
    assert!(err.to_string().contains(MANUAL_INSTALL_URL));
    assert_eq!(runner.calls(), [VERSION]);
}

#[tokio::test]
async fn unsupported_platform_cannot_start() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .on(VERSION, vec![CommandOutput::ok("Docker version 27.0.3")])
            .on(LIST, vec![CommandOutput::failed(1, "down")]),
    );
    let sleeper = Arc::new(InstantSleeper::default());
    let bootstrapper = bootstrapper(&runner, &sleeper, unsupported_commands());

    let (result, _) = ensure_ready(&bootstrapper).await;

    let err = result.expect_err("no start procedure");
    assert_eq!(stage_of(&err), Some(BootstrapStage::Start));
    assert!(err.to_string().contains("start Docker manually"));
    assert_eq!(sleeper.count(), 0);
}

/// Sleeper that fires a stop token the first time it is asked to sleep.
struct StoppingSleeper {
    stop: CancellationToken,
    sleeps: AtomicUsize,
}

impl Sleeper for StoppingSleeper {
    fn sleep(&self, _duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        self.sleeps.fetch_add(1, Ordering::SeqCst);
        self.stop.cancel();
        Box::pin(std::future::ready(()))
    }
}

fn stalled_start_runner() -> ScriptedRunner {
    ScriptedRunner::new()
        .on(VERSION, vec![CommandOutput::ok("Docker version 27.0.3")])
        .on(
            LIST,
            vec![
                CommandOutput::failed(1, "down"),
                CommandOutput::ok("CONTAINER ID"),
            ],
        )
        .on(IMAGE_LOOKUP, vec![CommandOutput::ok("")])
        .on(LINUX_START, vec![CommandOutput::ok("")])
        .on(BUILD, vec![CommandOutput::ok("Successfully built")])
}

#[tokio::test]
async fn stop_during_start_polling_skips_remaining_stages() {
    let stop = CancellationToken::new();
    let runner = Arc::new(stalled_start_runner());
    let sleeper = Arc::new(StoppingSleeper {
        stop: stop.clone(),
        sleeps: AtomicUsize::new(0),
    });
    let bootstrapper = EngineBootstrapper::new(
        runner.clone(),
        sleeper.clone(),
        linux_commands(),
        30,
        Duration::from_secs(1),
    );

    let result = bootstrapper.ensure_ready_until(&stop, |_| {}).await;

    assert_eq!(
        result.expect_err("stopped"),
        AppError::environment(BootstrapStage::Start, INTERRUPTED)
    );
    assert_eq!(sleeper.sleeps.load(Ordering::SeqCst), 1);
    assert_eq!(runner.count(LIST), 1, "no poll after the stop");
    assert_eq!(runner.count(BUILD), 0);
}

#[tokio::test]
async fn stop_before_bootstrap_runs_no_remediation() {
    let stop = CancellationToken::new();
    stop.cancel();
    let runner = Arc::new(stalled_start_runner());
    let sleeper = Arc::new(InstantSleeper::default());
    let bootstrapper = bootstrapper(&runner, &sleeper, linux_commands());

    let result = bootstrapper.ensure_ready_until(&stop, |_| {}).await;

    assert_eq!(
        result.expect_err("stopped"),
        AppError::environment(BootstrapStage::Start, INTERRUPTED)
    );
    assert_eq!(runner.count(LINUX_START), 0);
    assert_eq!(sleeper.count(), 0);
}
