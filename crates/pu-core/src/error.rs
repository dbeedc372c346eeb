use std::path::PathBuf;

/// Coarse failure classes. Every class is fatal to the deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Command,
    Supervisor,
    Io,
}

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("config file not found at {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("manifest not found at {0}")]
    ManifestNotFound(PathBuf),

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("while {label}: {reason}")]
    Command { label: String, reason: String },

    #[error("supervisor operation failed: {0}")]
    Supervisor(String),

    #[error("staging failed: {0}")]
    Staging(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DeployError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigNotFound(_)
            | Self::InvalidConfig(_)
            | Self::ManifestNotFound(_)
            | Self::InvalidManifest(_) => ErrorKind::Config,
            Self::Command { .. } => ErrorKind::Command,
            Self::Supervisor(_) => ErrorKind::Supervisor,
            Self::Staging(_) | Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Process exit code for this failure. All classes share one code.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;
