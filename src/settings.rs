//! Shared settings for the calibration library and CLI.
//! Persisted in the platform-specific config directory via `directories::ProjectDirs`.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::calibration::WorkflowConfig;
use crate::store::{CalibrationStore, FileBackend, CALIBRATION_SCALE_KEY};

/// Application settings that can be saved and loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Directory holding the calibration record (empty: platform data dir)
    pub data_dir: String,
    /// Storage key of the calibration record
    pub storage_key: String,
    /// Language code ("cn" or "en")
    pub lang: String,
    /// Physical unit shown in the dialog placeholder
    pub unit: String,
    /// Reject zero-length calibration lines instead of producing non-finite scales.
    /// Off unless explicitly enabled.
    pub reject_degenerate_lines: bool,
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            data_dir: String::new(),
            storage_key: CALIBRATION_SCALE_KEY.to_string(),
            lang: "en".to_string(),
            unit: "mm".to_string(),
            reject_degenerate_lines: false,
            log_level: "info".to_string(),
        }
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("org", "ohif", "spacing-calibration")
}

impl AppSettings {
    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the settings file path.
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("settings.json"))
    }

    /// Get the default data directory path.
    pub fn default_data_dir() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
    }

    /// Load settings from the config file.
    pub fn load() -> Self {
        let loaded = Self::settings_path()
            .and_then(|path| fs::read_to_string(&path).ok())
            .map(|content| Self::from_json(&content))
            .unwrap_or_default();
        loaded.backfilled()
    }

    /// Parse settings JSON, falling back to defaults when it is unreadable.
    pub fn from_json(content: &str) -> Self {
        match serde_json::from_str(content) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Ignoring unreadable settings file: {}", e);
                Self::default()
            }
        }
    }

    /// Save settings to the config file, returning its path.
    pub fn save(&self) -> Result<PathBuf, String> {
        let path = Self::settings_path().ok_or("Cannot determine config directory")?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save settings as pretty JSON at `path`.
    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;

        fs::write(path, content).map_err(|e| format!("Failed to write settings file: {}", e))?;

        tracing::info!("Settings saved to {}", path.display());
        Ok(())
    }

    /// Apply `CALIBRATION_*` environment overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = env::var("CALIBRATION_DATA_DIR") {
            self.data_dir = dir;
        }
        if let Ok(key) = env::var("CALIBRATION_STORAGE_KEY") {
            self.storage_key = key;
        }
        if let Ok(lang) = env::var("CALIBRATION_LANG") {
            self.lang = lang;
        }
        if let Ok(unit) = env::var("CALIBRATION_UNIT") {
            self.unit = unit;
        }
        if let Ok(reject) = env::var("CALIBRATION_REJECT_DEGENERATE") {
            self.reject_degenerate_lines = reject == "1" || reject.to_lowercase() == "true";
        }
        self.backfilled()
    }

    /// Directory the calibration record is stored in.
    pub fn resolved_data_dir(&self) -> Option<PathBuf> {
        if self.data_dir.is_empty() {
            Self::default_data_dir()
        } else {
            Some(PathBuf::from(&self.data_dir))
        }
    }

    /// File-backed calibration store described by these settings.
    pub fn open_store(&self) -> Result<CalibrationStore, String> {
        let dir = self
            .resolved_data_dir()
            .ok_or("Cannot determine data directory")?;
        Ok(CalibrationStore::new(Arc::new(FileBackend::new(dir))).with_key(&self.storage_key))
    }

    /// Workflow configuration described by these settings.
    pub fn workflow_config(&self) -> WorkflowConfig {
        WorkflowConfig::localized(&self.lang, &self.unit)
            .with_reject_degenerate_lines(self.reject_degenerate_lines)
    }

    // Backfill fields left empty by older or hand-edited config files
    fn backfilled(mut self) -> Self {
        let defaults = Self::default();
        if self.storage_key.is_empty() {
            self.storage_key = defaults.storage_key;
        }
        if self.lang.is_empty() {
            self.lang = defaults.lang;
        }
        if self.unit.is_empty() {
            self.unit = defaults.unit;
        }
        if self.log_level.is_empty() {
            self.log_level = defaults.log_level;
        }
        self
    }
}
