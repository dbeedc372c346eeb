//! Sequences one deployment: stage the new revision, install its
//! dependencies, drain the supervisor, swap code directories, then start
//! the servers the new code's manifest asks for.
//!
//! Draining always completes before any swap command is queued, and start
//! commands are only queued once the swap has run.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::{DeployError, Result};
use crate::models::{
    AppConfig, CodeLayout, CommandOptions, DeployPhase, DeploySettings, DeploymentReport,
    StartedProcess,
};

use super::command_runner::CommandRunner;
use super::config_loader;
use super::shell::{quote_path, shell_quote, ShellExecutor};
use super::supervisor::Supervisor;

pub const EXPORT_LABEL: &str = "exporting current code";
pub const RECORD_REVISION_LABEL: &str = "extract current sha";
pub const INSTALL_LABEL: &str = "update dependencies";
pub const DELETE_ARCHIVE_LABEL: &str = "delete ancient code";
pub const ARCHIVE_ACTIVE_LABEL: &str = "move old code out of the way";
pub const ACTIVATE_LABEL: &str = "move new code into place";

pub struct DeploymentOrchestrator<E, S> {
    settings: DeploySettings,
    runner: CommandRunner<E>,
    supervisor: S,
    phase: DeployPhase,
}

impl<E: ShellExecutor, S: Supervisor> DeploymentOrchestrator<E, S> {
    pub fn new(settings: DeploySettings, executor: E, supervisor: S) -> Self {
        Self {
            settings,
            runner: CommandRunner::new(executor),
            supervisor,
            phase: DeployPhase::Init,
        }
    }

    pub fn phase(&self) -> DeployPhase {
        self.phase
    }

    pub fn runner(&self) -> &CommandRunner<E> {
        &self.runner
    }

    pub fn supervisor(&self) -> &S {
        &self.supervisor
    }

    /// Run the whole deployment. Any error leaves the orchestrator in
    /// [`DeployPhase::Failed`]; nothing is retried or rolled back.
    pub async fn run(&mut self) -> Result<DeploymentReport> {
        let started_at = Utc::now();
        match self.run_phases().await {
            Ok((layout, revision, drained, started)) => {
                self.transition(DeployPhase::Done);
                tracing::info!(">> all done");
                Ok(DeploymentReport {
                    layout,
                    revision,
                    drained,
                    started,
                    started_at,
                    finished_at: Utc::now(),
                })
            }
            Err(e) => {
                tracing::error!(phase = %self.phase, "deployment failed: {e}");
                self.phase = DeployPhase::Failed;
                Err(e)
            }
        }
    }

    async fn run_phases(
        &mut self,
    ) -> Result<(CodeLayout, Option<String>, usize, Vec<StartedProcess>)> {
        let app_config = config_loader::load_app_config(&self.settings.app_config_path())?;
        tracing::info!(public_url = %app_config.public_url, "application config loaded");

        let staging = self.stage()?;
        let revision = self.install(&staging).await?;
        let drained = self.drain().await?;
        let layout = self.swap(staging).await?;
        let started = self.start_servers(&app_config, &layout.active).await?;
        Ok((layout, revision, drained, started))
    }

    fn transition(&mut self, next: DeployPhase) {
        tracing::info!(from = %self.phase, to = %next, "phase transition");
        self.phase = next;
    }

    fn git_options(&self) -> CommandOptions {
        match &self.settings.repository {
            Some(repo) => CommandOptions::default().current_dir(repo),
            None => CommandOptions::default(),
        }
    }

    fn stage(&mut self) -> Result<PathBuf> {
        self.transition(DeployPhase::Staging);

        let root = self.settings.staging_root();
        let staging = tempfile::Builder::new()
            .prefix("deploy")
            .tempdir_in(&root)
            .map_err(|e| {
                DeployError::Staging(format!(
                    "failed to create staging dir in {}: {e}",
                    root.display()
                ))
            })?
            .keep();
        tracing::info!(">> staging code to {}", staging.display());

        let revision = shell_quote(&self.settings.revision);
        let export = format!(
            "git archive --format=tar {revision} | tar -x -C {}",
            quote_path(&staging)
        );
        let record = format!(
            "git log -1 --oneline {revision} > {}",
            quote_path(&self.settings.revision_file_path())
        );
        let options = self.git_options();
        self.runner.enqueue(EXPORT_LABEL, export, options.clone());
        self.runner.enqueue(RECORD_REVISION_LABEL, record, options);
        Ok(staging)
    }

    /// Install production dependencies into `staging`, forwarding only
    /// `HOME` and `PATH` to the installer.
    async fn install(&mut self, staging: &Path) -> Result<Option<String>> {
        self.transition(DeployPhase::Installing);

        let mut options = CommandOptions::default()
            .current_dir(staging)
            .clear_env()
            .env("HOME", self.settings.home.to_string_lossy());
        if let Ok(path) = std::env::var("PATH") {
            options = options.env("PATH", path);
        }
        self.runner
            .enqueue(INSTALL_LABEL, self.settings.install_command.clone(), options);
        self.runner.run_all().await?;

        let revision = std::fs::read_to_string(self.settings.revision_file_path())
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        if let Some(rev) = &revision {
            tracing::info!(revision = %rev, "staged revision");
        }
        Ok(revision)
    }

    /// Stop everything the supervisor runs. Returns how many processes were running.
    async fn drain(&mut self) -> Result<usize> {
        self.transition(DeployPhase::Draining);

        let running = self.supervisor.list_running().await?;
        if running.is_empty() {
            tracing::info!("no running servers, nothing to stop");
            return Ok(0);
        }
        tracing::info!(count = running.len(), ">> stopping running servers");
        for process in &running {
            tracing::debug!(uid = %process.uid, script = %process.script, pid = process.pid, "stopping");
        }
        self.supervisor.stop_all().await?;
        Ok(running.len())
    }

    async fn swap(&mut self, staging: PathBuf) -> Result<CodeLayout> {
        self.transition(DeployPhase::Swapping);

        let active = self.settings.active_dir();
        let archive = self.settings.archive_dir();

        self.runner.enqueue(
            DELETE_ARCHIVE_LABEL,
            format!("rm -rf {}", quote_path(&archive)),
            CommandOptions::default(),
        );
        if tokio::fs::try_exists(&active).await? {
            self.runner.enqueue(
                ARCHIVE_ACTIVE_LABEL,
                format!("mv {} {}", quote_path(&active), quote_path(&archive)),
                CommandOptions::default(),
            );
        }
        self.runner.enqueue(
            ACTIVATE_LABEL,
            format!("mv {} {}", quote_path(&staging), quote_path(&active)),
            CommandOptions::default(),
        );
        self.runner.run_all().await?;

        Ok(CodeLayout {
            staging,
            active,
            archive,
        })
    }

    /// Start each manifest process in order, one flushed command at a time.
    ///
    /// Only the first process gets the well-known port; later ones have
    /// `PORT` removed so they fall back to their own default.
    async fn start_servers(
        &mut self,
        app_config: &AppConfig,
        active: &Path,
    ) -> Result<Vec<StartedProcess>> {
        self.transition(DeployPhase::Starting);

        let mut manifest = config_loader::load_manifest(active, &self.settings.manifest)?;
        tracing::info!(count = manifest.remaining(), "starting servers");

        let log_dir = self.settings.log_dir_path();
        tokio::fs::create_dir_all(&log_dir).await?;

        let mut well_known_port = Some(self.settings.well_known_port);
        let mut started = Vec::new();
        while let Some(script) = manifest.next_process() {
            let script_path = active.join(&script);
            let log_file = self.settings.log_path_for(&script);
            tracing::info!(">> {script} logs at {}", log_file.display());

            let port = well_known_port.take();
            let options = CommandOptions::default().env("PUBLIC_URL", &app_config.public_url);
            let options = match port {
                Some(port) => options.env("PORT", port.to_string()),
                None => options.remove_env("PORT"),
            };

            self.supervisor
                .start(&mut self.runner, &script, &script_path, &log_file, options);
            self.runner.run_all().await?;
            tracing::debug!(remaining = manifest.remaining(), "started {script}");

            started.push(StartedProcess {
                script,
                log_file,
                port,
            });
        }
        Ok(started)
    }
}

/// Convenience wrapper: build an orchestrator and run it once.
pub async fn deploy<E: ShellExecutor, S: Supervisor>(
    settings: DeploySettings,
    executor: E,
    supervisor: S,
) -> Result<DeploymentReport> {
    DeploymentOrchestrator::new(settings, executor, supervisor)
        .run()
        .await
}
