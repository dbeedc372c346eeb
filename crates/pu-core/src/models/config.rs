use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Global application config, read from `~/config.json`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default)]
    pub public_url: String,
}

/// Tunables for the hook itself, read from the optional `~/.post-update.yaml`.
///
/// Relative paths are resolved against `home`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeploySettings {
    #[serde(skip)]
    pub home: PathBuf,
    pub revision: String,
    pub repository: Option<PathBuf>,
    pub code_dir: PathBuf,
    pub log_dir: PathBuf,
    pub app_config: PathBuf,
    pub manifest: String,
    pub revision_file: PathBuf,
    pub install_command: String,
    pub supervisor: String,
    pub well_known_port: u16,
    pub staging_root: Option<PathBuf>,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            home: PathBuf::new(),
            revision: "master".into(),
            repository: None,
            code_dir: PathBuf::from("code"),
            log_dir: PathBuf::from("var/log"),
            app_config: PathBuf::from("config.json"),
            manifest: ".awsbox.json".into(),
            revision_file: PathBuf::from("ver.txt"),
            install_command: "npm install --production".into(),
            supervisor: "forever".into(),
            well_known_port: 10000,
            staging_root: None,
        }
    }
}

impl DeploySettings {
    pub fn for_home(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            ..Self::default()
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.home.join(path)
        }
    }

    pub fn app_config_path(&self) -> PathBuf {
        self.resolve(&self.app_config)
    }

    /// The directory actually served by running processes.
    pub fn active_dir(&self) -> PathBuf {
        self.resolve(&self.code_dir)
    }

    /// The previous active directory, `<active>.old`.
    pub fn archive_dir(&self) -> PathBuf {
        let mut archive: OsString = self.active_dir().into_os_string();
        archive.push(".old");
        PathBuf::from(archive)
    }

    pub fn log_dir_path(&self) -> PathBuf {
        self.resolve(&self.log_dir)
    }

    pub fn revision_file_path(&self) -> PathBuf {
        self.resolve(&self.revision_file)
    }

    pub fn staging_root(&self) -> PathBuf {
        self.staging_root
            .as_deref()
            .map(|p| self.resolve(p))
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Log file for a started script, named after the script's base name.
    pub fn log_path_for(&self, script: &str) -> PathBuf {
        let base = Path::new(script)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| script.to_string());
        self.log_dir_path().join(format!("{base}.log"))
    }
}
