use std::future::Future;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tokio::process::Command;

use crate::error::{DeployError, Result};
use crate::models::{CommandOptions, ProcessDescriptor};

use super::command_runner::CommandRunner;
use super::shell::{quote_path, shell_quote, ShellExecutor};

static PROCESS_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^data:\s+\[(\d+)\]\s+(\S+)\s+(\S+)\s+(.+?)\s+(\d+)\s+(\d+)\s+(?:\S+\s+)?(\S+)\s+(\S+)\s*$",
    )
    .unwrap()
});

/// Long-running process supervisor.
pub trait Supervisor {
    fn list_running(&self) -> impl Future<Output = Result<Vec<ProcessDescriptor>>> + Send;

    /// Stop every supervised process, resolving once the supervisor reports
    /// that all of them have stopped.
    fn stop_all(&self) -> impl Future<Output = Result<()>> + Send;

    fn start_command(&self, script_path: &Path, log_file: &Path) -> String;

    /// Queue a start of `script_path` so it runs in order with the other
    /// queued shell commands.
    fn start<E: ShellExecutor>(
        &self,
        runner: &mut CommandRunner<E>,
        script: &str,
        script_path: &Path,
        log_file: &Path,
        options: CommandOptions,
    ) {
        runner.enqueue(
            format!("start {script}"),
            self.start_command(script_path, log_file),
            options,
        );
    }
}

/// Supervisor backed by the `forever` CLI.
#[derive(Debug, Clone)]
pub struct ForeverSupervisor {
    binary: String,
}

impl ForeverSupervisor {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run_forever(&self, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|e| {
                DeployError::Supervisor(format!("failed to run {}: {e}", self.binary))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DeployError::Supervisor(format!(
                "{} {} failed (exit {}): {stderr}",
                self.binary,
                args.join(" "),
                output.status.code().unwrap_or(-1)
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for ForeverSupervisor {
    fn default() -> Self {
        Self::new("forever")
    }
}

impl Supervisor for ForeverSupervisor {
    /// Every process forever tracks, stopped ones included: a stopped entry
    /// still has a monitor that `stopall` has to clear.
    async fn list_running(&self) -> Result<Vec<ProcessDescriptor>> {
        let output = self.run_forever(&["list", "--plain"]).await?;
        Ok(parse_process_list(&output))
    }

    async fn stop_all(&self) -> Result<()> {
        // `stopall` only exits once every child has been stopped.
        let output = self.run_forever(&["stopall", "--plain"]).await?;
        tracing::debug!(output = %output.trim(), "forever stopall finished");
        Ok(())
    }

    fn start_command(&self, script_path: &Path, log_file: &Path) -> String {
        format!(
            "{} -a -l {} start {}",
            shell_quote(&self.binary),
            quote_path(log_file),
            quote_path(script_path)
        )
    }
}

/// Parse `forever list --plain` output. Header and info lines are skipped.
pub fn parse_process_list(output: &str) -> Vec<ProcessDescriptor> {
    output
        .lines()
        .filter_map(|line| {
            let caps = PROCESS_LINE_RE.captures(line.trim_end())?;
            Some(ProcessDescriptor {
                index: caps[1].parse().ok()?,
                uid: caps[2].to_string(),
                command: caps[3].to_string(),
                script: caps[4].to_string(),
                forever_pid: caps[5].parse().ok()?,
                pid: caps[6].parse().ok()?,
                log_file: caps[7].to_string(),
                uptime: caps[8].to_string(),
            })
        })
        .collect()
}
