// Session settings
//
// Stored as RON in the user's config directory. Every field has a default,
// so a partial file only overrides what it names.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Errors raised while reading or writing settings
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed settings file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Cannot encode settings: {0}")]
    Encode(String),
}

/// Processing elements a project pipeline cannot be built without
pub const REQUIRED_PLUGINS: &[&str] = &[
    "pipeline",
    "adder",
    "audioconvert",
    "level",
    "volume",
    "audiopanorama",
    "gnlcomposition",
    "gnlfilesource",
    "autoaudiosink",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Factories checked before a project pipeline is built
    pub required_plugins: Vec<String>,
    /// Keep graveyard instruments and events wired into the media graph
    pub wire_graveyard: bool,
    /// Directory scanned for instrument icons
    pub icon_dir: Option<PathBuf>,
    /// Waveform resolution used when levels are regenerated
    pub levels_per_second: u32,
    /// Undo actions kept before the oldest are dropped
    pub max_undo_history: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            required_plugins: REQUIRED_PLUGINS.iter().map(|p| p.to_string()).collect(),
            wire_graveyard: false,
            icon_dir: None,
            levels_per_second: 10,
            max_undo_history: crate::command::manager::DEFAULT_MAX_HISTORY,
        }
    }
}

impl Settings {
    /// Default settings location, `<config dir>/daw-session/settings.ron`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("daw-session").join("settings.ron"))
    }

    /// Load settings from a file; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No settings at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        ron::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Load from the default location, or defaults if there is none
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let text = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::Encode(e.to_string()))?;
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        std::fs::write(path, text).map_err(io_error)
    }
}
