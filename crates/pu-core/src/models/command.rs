use std::collections::BTreeMap;
use std::path::PathBuf;

/// How a queued command's child process is set up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOptions {
    pub current_dir: Option<PathBuf>,
    /// Start from an empty environment instead of inheriting ours.
    pub clear_env: bool,
    pub env: BTreeMap<String, String>,
    pub remove_env: Vec<String>,
}

impl CommandOptions {
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn clear_env(mut self) -> Self {
        self.clear_env = true;
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn remove_env(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.env.remove(&key);
        self.remove_env.push(key);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedCommand {
    pub label: String,
    pub command: String,
    pub options: CommandOptions,
}

#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok() -> Self {
        Self {
            success: true,
            code: Some(0),
            ..Self::default()
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}
