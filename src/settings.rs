// Persistent player-facing settings: the global override for the dashless maneuver.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name the override is shown under in settings menus.
pub const SETTING_NAME: &str = "DASHLESSDREAMBLOCKS_OVERRIDE";
pub const DEFAULT_SETTINGS_PATH: &str = "settings/dashless_dream.yaml";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl SettingsError {
    fn io(path: &Path, source: io::Error) -> Self {
        SettingsError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn is_missing_file(&self) -> bool {
        matches!(self, SettingsError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

#[derive(Resource, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManeuverSettings {
    /// Allow the maneuver everywhere, regardless of the level.
    #[serde(rename = "Enabled", default)]
    pub enabled: bool,
}

impl ManeuverSettings {
    pub fn from_yaml(text: &str) -> Result<Self, SettingsError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn to_yaml(&self) -> Result<String, SettingsError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = fs::read_to_string(path).map_err(|e| SettingsError::io(path, e))?;
        Self::from_yaml(&text)
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| SettingsError::io(parent, e))?;
        }
        fs::write(path, self.to_yaml()?).map_err(|e| SettingsError::io(path, e))
    }

    /// Settings from `path`, or defaults when the file is missing or unreadable.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(settings) => {
                info!(path = %path.display(), enabled = settings.enabled, "loaded settings");
                settings
            }
            Err(e) if e.is_missing_file() => {
                debug!(path = %path.display(), "no settings file, using defaults");
                Self::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable settings");
                Self::default()
            }
        }
    }
}

/// Where [`ManeuverSettings`] is persisted.
#[derive(Resource, Clone, Debug)]
pub struct SettingsPath(pub PathBuf);

pub struct SettingsPlugin {
    pub path: PathBuf,
}

impl Default for SettingsPlugin {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_SETTINGS_PATH),
        }
    }
}

impl Plugin for SettingsPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(ManeuverSettings::load_or_default(&self.path))
            .insert_resource(SettingsPath(self.path.clone()))
            .add_systems(
                Last,
                save_settings.run_if(
                    resource_changed::<ManeuverSettings>
                        .and(not(resource_added::<ManeuverSettings>)),
                ),
            );
    }
}

fn save_settings(settings: Res<ManeuverSettings>, path: Res<SettingsPath>) {
    match settings.save(&path.0) {
        Ok(()) => info!(setting = SETTING_NAME, enabled = settings.enabled, "saved settings"),
        Err(e) => error!(error = %e, "failed to save settings"),
    }
}
