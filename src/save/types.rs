//! Save format constants and error types
//!
//! The version constant and the engine-owned field set are read by both the
//! serializer and the deserializer and never change at runtime.

use std::path::PathBuf;

use thiserror::Error;

/// Current save file version
///
/// Documents carrying any other value under `__save_version__` are refused.
pub const SAVE_VERSION: u32 = 1;

/// Key under which the version is stored at the document root
pub const VERSION_KEY: &str = "__save_version__";

/// Field names owned by the engine loop rather than by game content
///
/// These are never written and are reset to their defaults after a load,
/// at every record depth.
pub const ENGINE_FIELDS: [&str; 3] = ["is_running", "frame_count", "elapsed_time"];

/// Engine-side field that is persisted, unlike [`ENGINE_FIELDS`]
pub const METADATA_FIELD: &str = "metadata";

/// Returns true if `name` is one of the engine-owned field names
pub fn is_engine_field(name: &str) -> bool {
    ENGINE_FIELDS.contains(&name)
}

pub type Result<T> = std::result::Result<T, PersistenceError>;

/// Error types for save/load operations
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Expected a game state record, got {0}")]
    InvalidRoot(String),

    #[error("Save file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid JSON in save file: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("Unsupported save version {found}, expected {expected}")]
    UnsupportedVersion { found: String, expected: u32 },

    #[error("Cannot resolve enum type for {0:?}")]
    UnresolvedEnum(String),

    #[error("Cannot resolve record type {0:?}")]
    UnresolvedRecord(String),

    #[error("{type_name} has no member {member:?}")]
    UnknownMember { type_name: String, member: String },

    #[error("Type tag {0:?} is already registered by a different type")]
    DuplicateTag(String),

    #[error("expected {expected}, found {found}")]
    Mismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("cannot store non-finite float {0}")]
    NonFiniteFloat(f64),

    #[error("integer {0} does not fit the save format")]
    IntegerOverflow(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to save state: {0}")]
    Save(#[source] Box<PersistenceError>),

    #[error("Failed to load state: {0}")]
    Load(#[source] Box<PersistenceError>),
}

impl PersistenceError {
    /// Shorthand for a shape mismatch between a declared type and a stored value
    pub fn mismatch(expected: &'static str, found: &'static str) -> Self {
        PersistenceError::Mismatch { expected, found }
    }

    /// True for errors that identify a failing stage on their own and
    /// therefore surface to the caller without a save/load wrapper.
    pub fn is_stage_error(&self) -> bool {
        matches!(
            self,
            PersistenceError::InvalidRoot(_)
                | PersistenceError::NotFound(_)
                | PersistenceError::InvalidJson(_)
                | PersistenceError::UnsupportedVersion { .. }
                | PersistenceError::UnresolvedEnum(_)
                | PersistenceError::UnresolvedRecord(_)
                | PersistenceError::Save(_)
                | PersistenceError::Load(_)
        )
    }

    /// Wraps a failure raised while saving, leaving stage errors untouched
    pub fn during_save(self) -> Self {
        if self.is_stage_error() {
            self
        } else {
            PersistenceError::Save(Box::new(self))
        }
    }

    /// Wraps a failure raised while loading, leaving stage errors untouched
    pub fn during_load(self) -> Self {
        if self.is_stage_error() {
            self
        } else {
            PersistenceError::Load(Box::new(self))
        }
    }
}
