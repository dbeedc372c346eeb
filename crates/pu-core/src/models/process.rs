use serde::Serialize;

/// One entry of the supervisor's process list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessDescriptor {
    pub index: usize,
    pub uid: String,
    pub command: String,
    pub script: String,
    pub forever_pid: u32,
    pub pid: u32,
    pub log_file: String,
    pub uptime: String,
}

impl ProcessDescriptor {
    pub fn is_running(&self) -> bool {
        self.uptime != "STOPPED"
    }
}
