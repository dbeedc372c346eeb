// Each test binary compiles this module independently and uses a different
// subset of helpers, so unused-function warnings are expected.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use tempfile::TempDir;

use pu_core::error::{DeployError, Result};
use pu_core::models::{CommandOutput, DeploySettings, ProcessDescriptor, QueuedCommand};
use pu_core::services::orchestrator::{
    ACTIVATE_LABEL, ARCHIVE_ACTIVE_LABEL, DELETE_ARCHIVE_LABEL, INSTALL_LABEL,
};
use pu_core::services::shell::{ShellExecutor, SystemShell};
use pu_core::services::supervisor::Supervisor;

/// Records every command. The install step writes `fixture` files into the
/// staging directory; swap commands really run so the directories move.
#[derive(Default)]
pub struct FakeShell {
    commands: Mutex<Vec<QueuedCommand>>,
    pub fixture: Vec<(String, String)>,
    pub fail_label: Option<String>,
}

impl FakeShell {
    pub fn with_fixture(fixture: Vec<(String, String)>) -> Self {
        Self {
            fixture,
            ..Self::default()
        }
    }

    pub fn failing_at(mut self, label: &str) -> Self {
        self.fail_label = Some(label.to_string());
        self
    }

    pub fn commands(&self) -> Vec<QueuedCommand> {
        self.commands.lock().unwrap().clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.commands().into_iter().map(|c| c.label).collect()
    }

    pub fn command(&self, label: &str) -> QueuedCommand {
        self.commands()
            .into_iter()
            .find(|c| c.label == label)
            .unwrap_or_else(|| panic!("no command labelled {label}"))
    }

    fn write_fixture(&self, dir: &Path) -> std::io::Result<()> {
        for (name, contents) in &self.fixture {
            let path = dir.join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, contents)?;
        }
        Ok(())
    }
}

impl ShellExecutor for FakeShell {
    async fn execute(&self, command: &QueuedCommand) -> std::io::Result<CommandOutput> {
        self.commands.lock().unwrap().push(command.clone());

        if self.fail_label.as_deref() == Some(command.label.as_str()) {
            return Ok(CommandOutput::failed(1, "simulated failure"));
        }
        match command.label.as_str() {
            INSTALL_LABEL => {
                if let Some(dir) = &command.options.current_dir {
                    self.write_fixture(dir)?;
                }
                Ok(CommandOutput::ok())
            }
            DELETE_ARCHIVE_LABEL | ARCHIVE_ACTIVE_LABEL | ACTIVATE_LABEL => {
                SystemShell.execute(command).await
            }
            _ => Ok(CommandOutput::ok()),
        }
    }
}

#[derive(Default)]
pub struct FakeSupervisor {
    pub running: Vec<ProcessDescriptor>,
    pub stop_error: Option<String>,
    pub list_calls: AtomicUsize,
    pub stop_calls: AtomicUsize,
}

impl FakeSupervisor {
    pub fn with_running(scripts: &[&str]) -> Self {
        let running = scripts
            .iter()
            .enumerate()
            .map(|(index, script)| ProcessDescriptor {
                index,
                uid: format!("uid{index}"),
                command: "/usr/bin/node".into(),
                script: script.to_string(),
                forever_pid: 1000 + index as u32,
                pid: 2000 + index as u32,
                log_file: format!("/home/app/.forever/uid{index}.log"),
                uptime: "0:0:5:1.2".into(),
            })
            .collect();
        Self {
            running,
            ..Self::default()
        }
    }

    pub fn failing_stop(mut self, message: &str) -> Self {
        self.stop_error = Some(message.to_string());
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

impl Supervisor for FakeSupervisor {
    async fn list_running(&self) -> Result<Vec<ProcessDescriptor>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.running.clone())
    }

    async fn stop_all(&self) -> Result<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        match &self.stop_error {
            Some(message) => Err(DeployError::Supervisor(message.clone())),
            None => Ok(()),
        }
    }

    fn start_command(&self, script_path: &Path, log_file: &Path) -> String {
        format!(
            "forever -a -l {} start {}",
            log_file.display(),
            script_path.display()
        )
    }
}

/// A throwaway home directory plus a separate staging root.
pub struct Harness {
    pub home: TempDir,
    pub staging_root: TempDir,
}

impl Harness {
    pub fn new(app_config: &str) -> Self {
        let home = tempfile::tempdir().unwrap();
        std::fs::write(home.path().join("config.json"), app_config).unwrap();
        Self {
            home,
            staging_root: tempfile::tempdir().unwrap(),
        }
    }

    pub fn with_public_url() -> Self {
        Self::new(r#"{"public_url": "https://x.test"}"#)
    }

    pub fn settings(&self) -> DeploySettings {
        let mut settings = DeploySettings::for_home(self.home.path());
        settings.staging_root = Some(self.staging_root.path().to_path_buf());
        settings
    }

    pub fn active_dir(&self) -> PathBuf {
        self.settings().active_dir()
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.settings().archive_dir()
    }

    pub fn staging_entries(&self) -> usize {
        std::fs::read_dir(self.staging_root.path()).unwrap().count()
    }
}

pub fn manifest_fixture(processes: &[&str]) -> Vec<(String, String)> {
    let manifest = serde_json::json!({ "processes": processes }).to_string();
    let mut files = vec![(".awsbox.json".to_string(), manifest)];
    for script in processes {
        files.push((script.to_string(), "require('http').createServer();\n".to_string()));
    }
    files
}

pub fn env_var<'a>(command: &'a QueuedCommand, key: &str) -> Option<&'a str> {
    command.options.env.get(key).map(String::as_str)
}
