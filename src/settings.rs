use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::analysis::DetectorParams;
use crate::session::Session;
use crate::waveform::MAX_DISPLAY_POINTS;

/// Returns the path to the settings file: `~/.config/wavemark/settings.json`
fn settings_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("wavemark");
    path.push("settings.json");
    path
}

/// Persisted application settings.
///
/// Serialized as JSON to the platform config directory.
/// Fields use `#[serde(default)]` so that adding new settings
/// won't break existing config files.
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    // Analysis
    pub auto_analysis: bool,
    pub detector: DetectorParams,

    // Display
    pub max_display_points: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            auto_analysis: false,
            detector: DetectorParams::default(),

            max_display_points: MAX_DISPLAY_POINTS,
        }
    }
}

impl AppSettings {
    /// Load settings from disk, falling back to defaults on any error.
    pub fn load() -> Self {
        Self::load_from(&settings_path())
    }

    fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(settings) => {
                    log::info!("Loaded settings from {}", path.display());
                    settings
                }
                Err(e) => {
                    log::warn!("Failed to parse settings ({}), using defaults", e);
                    Self::default()
                }
            },
            Err(e) => {
                log::info!("No settings file found ({}), using defaults", e);
                Self::default()
            }
        }
    }

    /// Save settings to disk as pretty JSON.
    pub fn save(&self) {
        self.save_to(&settings_path());
    }

    fn save_to(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::warn!("Failed to create config directory: {}", e);
                return;
            }
        }
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    log::warn!("Failed to write settings: {}", e);
                }
            }
            Err(e) => {
                log::warn!("Failed to serialize settings: {}", e);
            }
        }
    }

    /// Extract current settings from a running session.
    pub fn from_session(session: &Session) -> Self {
        Self {
            auto_analysis: session.auto_analysis(),
            detector: session.detector_params().clone(),

            max_display_points: session.max_display_points(),
        }
    }
}
