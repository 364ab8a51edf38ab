//! Save settings
//!
//! Slot count, autosave timing and the save directory, readable from a
//! game's own settings file.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Save slot and autosave settings
///
/// Missing entries fall back to their defaults when read from a settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveConfig {
    pub save_directory: PathBuf,
    pub max_slots: u8,
    pub autosave_interval: Duration,
    /// Autosaves kept per slot when an autosave is written
    pub autosave_keep: usize,
}

impl SaveConfig {
    /// Default settings with a different save directory
    pub fn with_directory(save_directory: impl Into<PathBuf>) -> Self {
        SaveConfig {
            save_directory: save_directory.into(),
            ..Self::default()
        }
    }
}

impl Default for SaveConfig {
    fn default() -> Self {
        SaveConfig {
            save_directory: default_save_directory(),
            max_slots: 5,
            autosave_interval: Duration::from_secs(300), // 5 minutes
            autosave_keep: 3,
        }
    }
}

fn default_save_directory() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("ludos").join("saves"))
        .unwrap_or_else(|| PathBuf::from("saves"))
}
