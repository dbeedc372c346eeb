pub mod command;
pub mod config;
pub mod deployment;
pub mod manifest;
pub mod process;

pub use command::{CommandOptions, CommandOutput, QueuedCommand};
pub use config::{AppConfig, DeploySettings};
pub use deployment::{CodeLayout, DeployPhase, DeploymentReport, StartedProcess};
pub use manifest::DeploymentManifest;
pub use process::ProcessDescriptor;
