use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DeployPhase {
    Init,
    Staging,
    Installing,
    Draining,
    Swapping,
    Starting,
    Done,
    Failed,
}

impl DeployPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for DeployPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Staging => "staging",
            Self::Installing => "installing",
            Self::Draining => "draining",
            Self::Swapping => "swapping",
            Self::Starting => "starting",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// The three code directories a deployment moves between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeLayout {
    pub staging: PathBuf,
    pub active: PathBuf,
    pub archive: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedProcess {
    pub script: String,
    pub log_file: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentReport {
    pub layout: CodeLayout,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    pub drained: usize,
    pub started: Vec<StartedProcess>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_done_and_failed_are_terminal() {
        assert!(DeployPhase::Done.is_terminal());
        assert!(DeployPhase::Failed.is_terminal());
        assert!(!DeployPhase::Swapping.is_terminal());
        assert_eq!(DeployPhase::Draining.to_string(), "draining");
    }
}
