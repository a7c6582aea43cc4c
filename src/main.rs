#![forbid(unsafe_code)]

//! `inferno-bridge`: runs one scan session from the terminal.
//!
//! Checks the container engine, launches the scan process with the given
//! target and prints its events as they arrive.

use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, EnvFilter};

use inferno_bridge::bridge::{ProcessSpec, ScanProcessBridge};
use inferno_bridge::config::GlobalConfig;
use inferno_bridge::engine::bootstrap::EngineBootstrapper;
use inferno_bridge::engine::runner::SystemRunner;
use inferno_bridge::models::event::{non_empty, ScanEvent};
use inferno_bridge::models::scan::ScanConfig;
use inferno_bridge::models::session::{SessionOutcome, SessionPhase};
use inferno_bridge::orchestrator::{SessionController, SessionObserver};
use inferno_bridge::stream::{is_displayable, render_line, EventStreamModel};
use inferno_bridge::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "inferno-bridge", about = "Run an Inferno scan session", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file; built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Scan target (URL or host).
    #[arg(long)]
    target: String,

    /// Optional focus objective for the scan.
    #[arg(long)]
    objective: Option<String>,

    /// LLM provider passed to the scan process.
    #[arg(long)]
    provider: Option<String>,

    /// LLM model passed to the scan process.
    #[arg(long)]
    model: Option<String>,

    /// Skip the container engine readiness check.
    #[arg(long)]
    skip_environment: bool,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> ExitCode {
    let args = Cli::parse();
    if let Err(err) = init_tracing(args.log_format) {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(%err, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(args)) {
        Ok(SessionPhase::Complete) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Cli) -> Result<SessionPhase> {
    let config = match &args.config {
        Some(path) => GlobalConfig::load_from_path(path)?,
        None => GlobalConfig::default(),
    };
    info!("configuration loaded");

    // Rejected here, before anything is spawned.
    let scan_config = ScanConfig::new(
        &args.target,
        args.objective.as_deref(),
        args.provider.as_deref(),
        args.model.as_deref(),
    )?;

    let bootstrapper = EngineBootstrapper::from_config(&config.engine, Arc::new(SystemRunner));
    let bridge = ScanProcessBridge::new(ProcessSpec::from_config(&config.scan));
    let mut controller =
        SessionController::new(bridge, EventStreamModel::with_window(config.display.window));
    info!(session_id = controller.session_id(), "session created");

    let bridge_handle = controller.bridge_handle();
    let signal_task = tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received, stopping scan");
        bridge_handle.stop();
    });

    let mut console = Console::new();
    let environment = (!args.skip_environment).then_some(&bootstrapper);
    let outcome = controller.run(environment, scan_config, &mut console).await;
    signal_task.abort();

    let stats = controller.stream().stats();
    println!(
        "{} events, {} duplicates dropped",
        stats.accepted, stats.duplicates
    );
    for (severity, count) in &stats.vulnerabilities {
        println!("  {severity}: {count}");
    }

    Ok(outcome.phase)
}

/// Terminal renderer.
///
/// On a terminal the event window is redrawn in place; piped output gets
/// one line per event.
struct Console {
    interactive: bool,
    drawn: usize,
}

impl Console {
    fn new() -> Self {
        Self {
            interactive: std::io::stdout().is_terminal(),
            drawn: 0,
        }
    }

    fn redraw(&mut self, stream: &EventStreamModel) {
        let lines = stream.render_window();
        match draw_window(&mut std::io::stdout().lock(), self.drawn, &lines) {
            Ok(()) => self.drawn = lines.len(),
            Err(err) => debug!(%err, "failed to redraw event window"),
        }
    }
}

/// Replace the `drawn` lines printed last with `lines`.
fn draw_window(out: &mut impl Write, drawn: usize, lines: &[String]) -> std::io::Result<()> {
    if drawn > 0 {
        // Cursor to the start of the first drawn line, then clear below.
        write!(out, "\x1b[{drawn}F\x1b[J")?;
    }
    for line in lines {
        writeln!(out, "{line}")?;
    }
    out.flush()
}

impl SessionObserver for Console {
    fn on_environment_progress(&mut self, message: &str) {
        println!("==> {message}");
    }

    fn on_event(&mut self, event: &ScanEvent, stream: &EventStreamModel) {
        if !is_displayable(event) {
            return;
        }
        if self.interactive {
            self.redraw(stream);
        } else {
            println!("{}", render_line(event));
        }
    }

    fn on_finished(&mut self, outcome: &SessionOutcome) {
        match (&outcome.phase, &outcome.summary, &outcome.reason) {
            (SessionPhase::Complete, Some(summary), _) => {
                let cost = non_empty(summary.cost.as_ref())
                    .map_or_else(String::new, |c| format!(", cost {c}"));
                println!(
                    "Scan complete: {} vulnerabilities in {:.0}s{cost}",
                    summary.vulnerabilities, summary.time
                );
            }
            (_, _, Some(reason)) => println!("Scan failed: {reason}"),
            _ => println!("Scan ended: {}", outcome.phase),
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                if let Err(err) = ctrl_c.await {
                    tracing::error!(%err, "ctrl-c signal handler failed");
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
