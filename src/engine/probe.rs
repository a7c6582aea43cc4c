//! Read-only container engine status queries.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::engine::commands::EngineCommands;
use crate::engine::runner::{CommandOutput, CommandRunner, EngineCommand};
use crate::models::engine::EngineStatus;

/// Upper bound on a single status query.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Queries installed / running / image-built status of the engine.
///
/// Query failures never surface as errors: a non-zero exit, a timeout or a
/// missing binary reads as `false` for that field, and every field that
/// depends on it is reported `false` without being queried.
#[derive(Clone)]
pub struct EngineProbe {
    runner: Arc<dyn CommandRunner>,
    commands: Arc<EngineCommands>,
}

impl EngineProbe {
    /// Create a probe issuing `commands` through `runner`.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, commands: Arc<EngineCommands>) -> Self {
        Self { runner, commands }
    }

    /// Current engine status.
    pub async fn status(&self) -> EngineStatus {
        let installed = self.query(&self.commands.version).await.is_some();
        if !installed {
            return EngineStatus::default();
        }

        let running = self.query(&self.commands.list).await.is_some();
        if !running {
            return EngineStatus {
                installed,
                ..EngineStatus::default()
            };
        }

        let image_built = self
            .query(&self.commands.image_lookup)
            .await
            .is_some_and(|out| !out.stdout.trim().is_empty());

        EngineStatus {
            installed,
            running,
            image_built,
        }
    }

    /// Run one query, folding every failure into `None`.
    async fn query(&self, command: &EngineCommand) -> Option<CommandOutput> {
        match tokio::time::timeout(PROBE_TIMEOUT, self.runner.run(command)).await {
            Ok(Ok(out)) if out.success => Some(out),
            Ok(Ok(out)) => {
                debug!(command = %command, detail = %out.failure_detail(), "engine probe query failed");
                None
            }
            Ok(Err(err)) => {
                debug!(command = %command, %err, "engine probe query could not run");
                None
            }
            Err(_elapsed) => {
                debug!(command = %command, timeout = ?PROBE_TIMEOUT, "engine probe query timed out");
                None
            }
        }
    }
}
