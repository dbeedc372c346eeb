use std::collections::VecDeque;
use std::path::{Component, Path};

use serde::Deserialize;

use crate::error::{DeployError, Result};
use crate::models::{AppConfig, DeploySettings, DeploymentManifest};

pub const SETTINGS_FILENAME: &str = ".post-update.yaml";

#[derive(Deserialize)]
struct RawManifest {
    #[serde(default)]
    processes: Option<VecDeque<String>>,
}

pub fn load_app_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Err(DeployError::ConfigNotFound(path.to_path_buf()));
    }
    let contents = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&contents)
        .map_err(|e| DeployError::InvalidConfig(e.to_string()))?;
    if config.public_url.is_empty() {
        return Err(DeployError::InvalidConfig(
            "missing 'public_url' property".into(),
        ));
    }
    Ok(config)
}

/// Read the process manifest that ships inside `code_dir`.
pub fn load_manifest(code_dir: &Path, filename: &str) -> Result<DeploymentManifest> {
    let manifest_path = code_dir.join(filename);
    if !manifest_path.exists() {
        return Err(DeployError::ManifestNotFound(manifest_path));
    }
    let contents = std::fs::read_to_string(&manifest_path)?;
    let raw: RawManifest = serde_json::from_str(&contents)
        .map_err(|e| DeployError::InvalidManifest(e.to_string()))?;
    let processes = raw.processes.ok_or_else(|| {
        DeployError::InvalidManifest("missing 'processes' property".into())
    })?;
    for script in &processes {
        if !is_inside_code_dir(script) {
            return Err(DeployError::InvalidManifest(format!(
                "process '{script}' must be a relative path inside the code directory"
            )));
        }
    }
    Ok(DeploymentManifest { processes })
}

fn is_inside_code_dir(script: &str) -> bool {
    let path = Path::new(script);
    !script.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Load hook settings. A missing default settings file means defaults;
/// an explicitly named file must exist.
pub fn load_settings(home: &Path, explicit: Option<&Path>) -> Result<DeploySettings> {
    let settings_path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(DeployError::ConfigNotFound(path.to_path_buf()));
            }
            path.to_path_buf()
        }
        None => home.join(SETTINGS_FILENAME),
    };

    let mut settings = if settings_path.exists() {
        let contents = std::fs::read_to_string(&settings_path)?;
        if contents.trim().is_empty() {
            DeploySettings::default()
        } else {
            serde_yaml::from_str(&contents)
                .map_err(|e| DeployError::InvalidConfig(e.to_string()))?
        }
    } else {
        DeploySettings::default()
    };
    settings.home = home.to_path_buf();
    validate_settings(&settings)?;
    Ok(settings)
}

fn validate_settings(settings: &DeploySettings) -> Result<()> {
    for (field, value) in [
        ("revision", &settings.revision),
        ("supervisor", &settings.supervisor),
        ("install_command", &settings.install_command),
        ("manifest", &settings.manifest),
    ] {
        if value.trim().is_empty() {
            return Err(DeployError::InvalidConfig(format!(
                "{field} must not be empty"
            )));
        }
    }
    if settings.well_known_port == 0 {
        return Err(DeployError::InvalidConfig(
            "well_known_port must be non-zero".into(),
        ));
    }
    Ok(())
}
