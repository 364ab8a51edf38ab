//! Save manager for slot-based save files
//!
//! This module provides the SaveManager struct which handles:
//! - Saving a game state into a numbered slot
//! - Loading a slot back into a fresh state
//! - Autosave timing
//! - Save file management (listing, cleanup)

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};

use super::config::SaveConfig;
use super::store::{Persistence, SaveHeader};
use super::types::Result;
use crate::state::GameState;

const AUTOSAVE_PREFIX: &str = "autosave_slot";

/// How a save was triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveType {
    Manual,
    Auto,
    QuickSave,
}

/// A save file found in the save directory
#[derive(Debug, Clone)]
pub struct SaveFileInfo {
    pub filename: String,
    pub slot: Option<u8>,
    pub save_type: SaveType,
    pub modified: DateTime<Local>,
    pub header: SaveHeader,
}

pub struct SaveManager {
    config: SaveConfig,
    persistence: Persistence,
    current_save_slot: u8,
    last_autosave: Option<SystemTime>,
}

impl SaveManager {
    /// Creates a new SaveManager
    ///
    /// The save directory will be created if it doesn't exist.
    pub fn new(config: SaveConfig, persistence: Persistence) -> Result<Self> {
        if !config.save_directory.exists() {
            fs::create_dir_all(&config.save_directory)?;
        }

        Ok(SaveManager {
            config,
            persistence,
            current_save_slot: 1,
            last_autosave: None,
        })
    }

    pub fn config(&self) -> &SaveConfig {
        &self.config
    }

    pub fn persistence(&self) -> &Persistence {
        &self.persistence
    }

    pub fn save_directory(&self) -> &Path {
        &self.config.save_directory
    }

    /// Sets the current save slot, clamped to `1..=max_slots`
    pub fn set_save_slot(&mut self, slot: u8) {
        self.current_save_slot = slot.clamp(1, self.config.max_slots.max(1));
    }

    /// Gets the current save slot
    pub fn save_slot(&self) -> u8 {
        self.current_save_slot
    }

    /// Saves the state into the current slot
    ///
    /// Autosaves also prune the slot's older autosaves down to
    /// `autosave_keep`.
    pub fn save_game<S: GameState>(&mut self, state: &S, save_type: SaveType) -> Result<PathBuf> {
        let filename = generate_filename(save_type, self.current_save_slot);
        let filepath = self.config.save_directory.join(filename);

        self.persistence.save(state, &filepath)?;

        if save_type == SaveType::Auto {
            self.last_autosave = Some(SystemTime::now());
            self.prune_autosaves(self.current_save_slot, self.config.autosave_keep)?;
        }
        Ok(filepath)
    }

    /// Loads the manual save of a specific slot
    pub fn load_game<S: GameState>(&self, slot: u8) -> Result<S> {
        self.load_game_by_filename(&slot_filename(slot))
    }

    /// Loads a save file by filename
    pub fn load_game_by_filename<S: GameState>(&self, filename: &str) -> Result<S> {
        self.persistence.load(self.config.save_directory.join(filename))
    }

    /// Checks if a manual save exists for a given slot
    pub fn save_exists(&self, slot: u8) -> bool {
        self.config.save_directory.join(slot_filename(slot)).exists()
    }

    /// Checks if autosave is needed
    pub fn should_autosave(&self) -> bool {
        match self.last_autosave {
            Some(last_save) => SystemTime::now()
                .duration_since(last_save)
                .map(|elapsed| elapsed >= self.config.autosave_interval)
                .unwrap_or(true),
            None => true, // Save if we've never autosaved
        }
    }

    /// Lists all save files, newest first
    ///
    /// Files that cannot be read as saves are skipped.
    pub fn list_saves(&self) -> Result<Vec<SaveFileInfo>> {
        let mut saves = Vec::new();

        for entry in fs::read_dir(&self.config.save_directory)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let Some(filename) = path.file_name().and_then(|f| f.to_str()) else {
                continue;
            };

            let header = match Persistence::peek(&path) {
                Ok(header) => header,
                Err(e) => {
                    log::warn!("Skipping unreadable save {}: {}", filename, e);
                    continue;
                }
            };
            let modified = fs::metadata(&path)?.modified()?;
            let (slot, save_type) = parse_filename(filename);

            saves.push(SaveFileInfo {
                filename: filename.to_string(),
                slot,
                save_type,
                modified: DateTime::from(modified),
                header,
            });
        }

        saves.sort_by(|a, b| b.modified.cmp(&a.modified));
        Ok(saves)
    }

    /// Deletes old autosaves, keeping only the `keep_count` most recent per slot
    pub fn cleanup_autosaves(&self, keep_count: usize) -> Result<()> {
        for slot in 1..=self.config.max_slots {
            self.prune_autosaves(slot, keep_count)?;
        }
        Ok(())
    }

    /// Deletes old autosaves, keeping as many per slot as the config allows
    pub fn cleanup_autosaves_by_config(&self) -> Result<()> {
        self.cleanup_autosaves(self.config.autosave_keep)
    }

    fn prune_autosaves(&self, slot: u8, keep_count: usize) -> Result<()> {
        let prefix = format!("{}{}_", AUTOSAVE_PREFIX, slot);

        let mut autosaves: Vec<_> = fs::read_dir(&self.config.save_directory)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|s| s.starts_with(&prefix))
            })
            .collect();

        // Newest first
        autosaves.sort_by_key(|entry| {
            entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .map(std::cmp::Reverse)
        });

        for entry in autosaves.iter().skip(keep_count) {
            log::debug!("Removing old autosave {}", entry.path().display());
            fs::remove_file(entry.path())?;
        }
        Ok(())
    }
}

fn slot_filename(slot: u8) -> String {
    format!("slot_{}.json", slot)
}

fn generate_filename(save_type: SaveType, slot: u8) -> String {
    match save_type {
        SaveType::Manual | SaveType::QuickSave => slot_filename(slot),
        SaveType::Auto => {
            let timestamp = Local::now().format("%Y%m%d_%H%M%S");
            format!("{}{}_{}.json", AUTOSAVE_PREFIX, slot, timestamp)
        }
    }
}

/// Recovers slot and save type from a generated filename
fn parse_filename(filename: &str) -> (Option<u8>, SaveType) {
    let stem = filename.strip_suffix(".json").unwrap_or(filename);

    if let Some(rest) = stem.strip_prefix(AUTOSAVE_PREFIX) {
        let slot = rest.split('_').next().and_then(|n| n.parse().ok());
        return (slot, SaveType::Auto);
    }
    let slot = stem.strip_prefix("slot_").and_then(|n| n.parse().ok());
    (slot, SaveType::Manual)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::save::PersistenceError;
    use crate::state::BaseGameState;
    use std::time::Duration;
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> SaveManager {
        let config = SaveConfig::with_directory(dir.path().join("saves"));
        let persistence = Persistence::for_state::<BaseGameState>().unwrap();
        SaveManager::new(config, persistence).unwrap()
    }

    #[test]
    fn test_new_creates_directory() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        assert!(manager.save_directory().is_dir());
    }

    #[test]
    fn test_slot_is_clamped() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager(&dir);
        manager.set_save_slot(0);
        assert_eq!(manager.save_slot(), 1);
        manager.set_save_slot(9);
        assert_eq!(manager.save_slot(), 5);
        manager.set_save_slot(3);
        assert_eq!(manager.save_slot(), 3);
    }

    #[test]
    fn test_manual_save_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager(&dir);
        manager.set_save_slot(2);

        let mut state = BaseGameState::default();
        state.engine.frame_count = 40;
        let path = manager.save_game(&state, SaveType::Manual).unwrap();

        assert!(path.ends_with("slot_2.json"));
        assert!(manager.save_exists(2));
        assert!(!manager.save_exists(1));

        let loaded: BaseGameState = manager.load_game(2).unwrap();
        assert_eq!(loaded.engine.frame_count, 0);
    }

    #[test]
    fn test_missing_slot_is_not_found() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let result = manager.load_game::<BaseGameState>(4);
        assert!(matches!(result, Err(PersistenceError::NotFound(_))));
    }

    #[test]
    fn test_autosave_timing() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager(&dir);
        assert!(manager.should_autosave());

        let path = manager
            .save_game(&BaseGameState::default(), SaveType::Auto)
            .unwrap();
        let filename = path.file_name().unwrap().to_str().unwrap();
        assert!(filename.starts_with("autosave_slot1_"));
        assert!(!manager.should_autosave());
    }

    #[test]
    fn test_list_saves_skips_foreign_files() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager(&dir);
        manager.save_game(&BaseGameState::default(), SaveType::QuickSave).unwrap();
        fs::write(manager.save_directory().join("notes.txt"), "hello").unwrap();
        fs::write(manager.save_directory().join("broken.json"), "{ nope").unwrap();

        let saves = manager.list_saves().unwrap();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].filename, "slot_1.json");
        assert_eq!(saves[0].slot, Some(1));
        assert_eq!(saves[0].save_type, SaveType::Manual);
        assert_eq!(saves[0].header.type_name.as_deref(), Some("BaseGameState"));
    }

    #[test]
    fn test_cleanup_keeps_newest_autosaves_per_slot() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let saves = manager.save_directory();
        for i in 0..4 {
            fs::write(saves.join(format!("autosave_slot1_2024010{}_120000.json", i)), "{}").unwrap();
        }
        fs::write(saves.join("autosave_slot2_20240101_120000.json"), "{}").unwrap();
        fs::write(saves.join("slot_1.json"), "{}").unwrap();

        manager.cleanup_autosaves(2).unwrap();

        let remaining: Vec<String> = fs::read_dir(saves)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        let slot1 = remaining
            .iter()
            .filter(|name| name.starts_with("autosave_slot1_"))
            .count();
        assert_eq!(slot1, 2);
        assert!(remaining.contains(&"autosave_slot2_20240101_120000.json".to_string()));
        assert!(remaining.contains(&"slot_1.json".to_string()));
    }

    fn backdated_autosave(dir: &Path, name: &str, age_secs: u64) {
        let path = dir.join(name);
        fs::write(&path, "{}").unwrap();
        let file = fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
            .unwrap();
    }

    fn autosaves_for_slot(dir: &Path, slot: u8) -> Vec<String> {
        let prefix = format!("autosave_slot{}_", slot);
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .filter(|name| name.starts_with(&prefix))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_autosave_prunes_to_configured_count() {
        let dir = TempDir::new().unwrap();
        let config = SaveConfig {
            autosave_keep: 2,
            ..SaveConfig::with_directory(dir.path())
        };
        let persistence = Persistence::for_state::<BaseGameState>().unwrap();
        let mut manager = SaveManager::new(config, persistence).unwrap();

        backdated_autosave(dir.path(), "autosave_slot1_20240101_120000.json", 300);
        backdated_autosave(dir.path(), "autosave_slot1_20240102_120000.json", 200);
        backdated_autosave(dir.path(), "autosave_slot1_20240103_120000.json", 100);
        backdated_autosave(dir.path(), "autosave_slot2_20240101_120000.json", 300);

        let path = manager
            .save_game(&BaseGameState::default(), SaveType::Auto)
            .unwrap();
        let newest = path.file_name().unwrap().to_str().unwrap().to_string();

        let remaining = autosaves_for_slot(dir.path(), 1);
        assert_eq!(remaining.len(), 2);
        assert!(remaining.contains(&newest));
        assert!(remaining.contains(&"autosave_slot1_20240103_120000.json".to_string()));
        assert_eq!(autosaves_for_slot(dir.path(), 2).len(), 1);
    }

    #[test]
    fn test_cleanup_by_config_covers_every_slot() {
        let dir = TempDir::new().unwrap();
        let config = SaveConfig {
            autosave_keep: 1,
            ..SaveConfig::with_directory(dir.path())
        };
        let persistence = Persistence::for_state::<BaseGameState>().unwrap();
        let manager = SaveManager::new(config, persistence).unwrap();

        for slot in [1u8, 4] {
            backdated_autosave(dir.path(), &format!("autosave_slot{slot}_20240101_120000.json"), 200);
            backdated_autosave(dir.path(), &format!("autosave_slot{slot}_20240102_120000.json"), 100);
        }

        manager.cleanup_autosaves_by_config().unwrap();

        assert_eq!(
            autosaves_for_slot(dir.path(), 1),
            vec!["autosave_slot1_20240102_120000.json"]
        );
        assert_eq!(
            autosaves_for_slot(dir.path(), 4),
            vec!["autosave_slot4_20240102_120000.json"]
        );
    }

    #[test]
    fn test_parse_filename() {
        assert_eq!(parse_filename("slot_3.json"), (Some(3), SaveType::Manual));
        assert_eq!(
            parse_filename("autosave_slot2_20240101_120000.json"),
            (Some(2), SaveType::Auto)
        );
        assert_eq!(parse_filename("custom.json"), (None, SaveType::Manual));
    }
}
