use std::collections::VecDeque;

use serde::Deserialize;

/// Per-deployment manifest shipped inside the code itself.
///
/// `processes` is consumed from the front as each server is started.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DeploymentManifest {
    pub processes: VecDeque<String>,
}

impl DeploymentManifest {
    pub fn next_process(&mut self) -> Option<String> {
        self.processes.pop_front()
    }

    pub fn remaining(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}
