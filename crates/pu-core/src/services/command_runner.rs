use std::collections::VecDeque;

use crate::error::{DeployError, Result};
use crate::models::{CommandOptions, QueuedCommand};

use super::shell::ShellExecutor;

/// FIFO queue of labelled shell commands, drained one at a time.
///
/// A single runner spans every phase of a deployment; later phases append
/// to the same queue after earlier ones have drained it.
pub struct CommandRunner<E> {
    executor: E,
    queue: VecDeque<QueuedCommand>,
    executed: usize,
}

impl<E: ShellExecutor> CommandRunner<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            queue: VecDeque::new(),
            executed: 0,
        }
    }

    pub fn enqueue(
        &mut self,
        label: impl Into<String>,
        command: impl Into<String>,
        options: CommandOptions,
    ) {
        self.queue.push_back(QueuedCommand {
            label: label.into(),
            command: command.into(),
            options,
        });
    }

    /// Run every queued command in order, stopping at the first failure.
    ///
    /// The failed command is consumed; anything queued behind it is left in place.
    pub async fn run_all(&mut self) -> Result<()> {
        while let Some(queued) = self.queue.pop_front() {
            tracing::info!(">> {}", queued.label);
            tracing::debug!(command = %queued.command, "executing");

            let output = self.executor.execute(&queued).await.map_err(|e| {
                tracing::error!(label = %queued.label, "failed to execute: {e}");
                DeployError::Command {
                    label: queued.label.clone(),
                    reason: format!("failed to execute: {e}"),
                }
            })?;

            for line in output.stdout.lines().chain(output.stderr.lines()) {
                if !line.trim().is_empty() {
                    tracing::info!("   {line}");
                }
            }

            if !output.success {
                let reason = format!(
                    "exit {}: {}",
                    output.code.unwrap_or(-1),
                    output.stderr.trim()
                );
                tracing::error!(label = %queued.label, "{reason}");
                return Err(DeployError::Command {
                    label: queued.label,
                    reason,
                });
            }
            self.executed += 1;
        }
        Ok(())
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn pending_labels(&self) -> Vec<&str> {
        self.queue.iter().map(|c| c.label.as_str()).collect()
    }

    /// Number of commands that have completed successfully.
    pub fn executed(&self) -> usize {
        self.executed
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CommandOutput;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingShell {
        seen: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        fail_on: Option<&'static str>,
        io_error_on: Option<&'static str>,
    }

    impl ShellExecutor for RecordingShell {
        async fn execute(&self, command: &QueuedCommand) -> std::io::Result<CommandOutput> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.seen.lock().unwrap().push(command.label.clone());
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.io_error_on == Some(command.label.as_str()) {
                return Err(std::io::Error::new(std::io::ErrorKind::NotFound, "sh: not found"));
            }
            if self.fail_on == Some(command.label.as_str()) {
                return Ok(CommandOutput::failed(2, "boom"));
            }
            Ok(CommandOutput::ok())
        }
    }

    #[tokio::test]
    async fn runs_in_fifo_order_one_at_a_time() {
        let mut runner = CommandRunner::new(RecordingShell::default());
        for label in ["one", "two", "three"] {
            runner.enqueue(label, format!("echo {label}"), CommandOptions::default());
        }
        runner.run_all().await.unwrap();

        let shell = runner.executor();
        assert_eq!(*shell.seen.lock().unwrap(), ["one", "two", "three"]);
        assert_eq!(shell.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(runner.pending(), 0);
        assert_eq!(runner.executed(), 3);
    }

    #[tokio::test]
    async fn queue_can_be_extended_after_draining() {
        let mut runner = CommandRunner::new(RecordingShell::default());
        runner.enqueue("first", "true", CommandOptions::default());
        runner.run_all().await.unwrap();
        runner.enqueue("second", "true", CommandOptions::default());
        runner.run_all().await.unwrap();
        assert_eq!(*runner.executor().seen.lock().unwrap(), ["first", "second"]);
    }

    #[tokio::test]
    async fn stops_at_first_failure() {
        let shell = RecordingShell {
            fail_on: Some("two"),
            ..Default::default()
        };
        let mut runner = CommandRunner::new(shell);
        for label in ["one", "two", "three"] {
            runner.enqueue(label, "true", CommandOptions::default());
        }
        let err = runner.run_all().await.unwrap_err();

        assert!(matches!(err, DeployError::Command { ref label, .. } if label == "two"));
        assert_eq!(*runner.executor().seen.lock().unwrap(), ["one", "two"]);
        assert_eq!(runner.pending_labels(), ["three"]);
        assert_eq!(runner.executed(), 1);
    }

    #[tokio::test]
    async fn spawn_failure_is_a_command_error() {
        let shell = RecordingShell {
            io_error_on: Some("one"),
            ..Default::default()
        };
        let mut runner = CommandRunner::new(shell);
        runner.enqueue("one", "true", CommandOptions::default());
        let err = runner.run_all().await.unwrap_err();
        assert!(
            matches!(err, DeployError::Command { ref reason, .. } if reason.contains("not found"))
        );
    }
}
