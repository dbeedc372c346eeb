use std::future::Future;
use std::path::Path;

use tokio::process::Command;

use crate::models::{CommandOutput, QueuedCommand};

/// Runs one shell-level command to completion.
pub trait ShellExecutor {
    fn execute(
        &self,
        command: &QueuedCommand,
    ) -> impl Future<Output = std::io::Result<CommandOutput>> + Send;
}

/// Executes commands through `sh -c`, waiting for the child to exit.
#[derive(Debug, Clone, Default)]
pub struct SystemShell;

impl ShellExecutor for SystemShell {
    async fn execute(&self, queued: &QueuedCommand) -> std::io::Result<CommandOutput> {
        let options = &queued.options;
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&queued.command);
        if let Some(dir) = &options.current_dir {
            cmd.current_dir(dir);
        }
        if options.clear_env {
            cmd.env_clear();
        }
        for key in &options.remove_env {
            cmd.env_remove(key);
        }
        cmd.envs(&options.env);

        let output = cmd.output().await?;
        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Single-quote a value for interpolation into an `sh` command line.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

pub fn quote_path(path: &Path) -> String {
    shell_quote(&path.to_string_lossy())
}
