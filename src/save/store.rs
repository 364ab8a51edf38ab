//! Save and load entry points
//!
//! [`Persistence`] owns the type registry and performs the file I/O around
//! the serializer and deserializer. It never mutates the state it saves and
//! every load returns a freshly built instance.

use std::fs;
use std::path::Path;

use serde_json::Value as Json;

use super::deserializer::Decoder;
use super::registry::TypeRegistry;
use super::serializer::{self, TYPE_TAG};
use super::types::{PersistenceError, Result, SAVE_VERSION, VERSION_KEY};
use super::value::Value;
use crate::state::GameState;

/// Version and type read from a save without reconstructing it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveHeader {
    pub version: Option<u64>,
    pub type_name: Option<String>,
}

impl SaveHeader {
    /// True if this build can load the save
    pub fn is_compatible(&self) -> bool {
        self.version == Some(u64::from(SAVE_VERSION))
    }
}

/// The save/load component
pub struct Persistence {
    registry: TypeRegistry,
}

impl Persistence {
    pub fn new(registry: TypeRegistry) -> Self {
        Persistence { registry }
    }

    /// Creates a component whose registry knows `S` and every type it reaches
    pub fn for_state<S: GameState>() -> Result<Self> {
        Ok(Self::new(TypeRegistry::with_record::<S>()?))
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut TypeRegistry {
        &mut self.registry
    }

    /// Builds the JSON document for a state root value
    pub fn to_document(&self, root: &Value) -> Result<Json> {
        serializer::document(root)
    }

    /// Saves a game state to `path`
    ///
    /// Engine-owned fields are left out. Parent directories are created if
    /// needed.
    pub fn save<S: GameState>(&self, state: &S, path: impl AsRef<Path>) -> Result<()> {
        let root = state.to_value().map_err(PersistenceError::during_save)?;
        self.save_value(&root, path)
    }

    /// Saves an already converted state root
    ///
    /// Fails before touching the filesystem if `root` is not a record that
    /// declares the engine-owned fields.
    pub fn save_value(&self, root: &Value, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let document = self.to_document(root).map_err(PersistenceError::during_save)?;
        write_document(&document, path).map_err(PersistenceError::during_save)?;

        log::info!("Game saved to: {}", path.display());
        Ok(())
    }

    /// Rebuilds a state from a parsed save document
    ///
    /// The version is checked before any reconstruction. Engine-owned fields
    /// are reset to their defaults whatever the document holds.
    pub fn from_document<S: GameState>(&self, document: Json) -> Result<S> {
        let Json::Object(mut object) = document else {
            return Err(version_error(None));
        };

        let version = object.remove(VERSION_KEY);
        if version.as_ref().and_then(Json::as_u64) != Some(u64::from(SAVE_VERSION)) {
            return Err(version_error(version.as_ref()));
        }

        let decoder = Decoder::new(&self.registry);
        let root = decoder
            .decode_record(&S::record_schema(), object)
            .map_err(PersistenceError::during_load)?;
        let mut state = S::from_value(root).map_err(PersistenceError::during_load)?;

        state.reset_engine_fields();
        Ok(state)
    }

    /// Loads a game state of type `S` from `path`
    pub fn load<S: GameState>(&self, path: impl AsRef<Path>) -> Result<S> {
        let path = path.as_ref();
        let document = read_document(path)?;
        let state = self.from_document(document)?;

        log::info!("Game loaded from: {}", path.display());
        Ok(state)
    }

    /// Reads the version and root type of a save without loading it
    pub fn peek(path: impl AsRef<Path>) -> Result<SaveHeader> {
        let document = read_document(path.as_ref())?;
        Ok(SaveHeader {
            version: document.get(VERSION_KEY).and_then(Json::as_u64),
            type_name: document
                .get(TYPE_TAG)
                .and_then(Json::as_str)
                .map(str::to_string),
        })
    }
}

fn version_error(found: Option<&Json>) -> PersistenceError {
    PersistenceError::UnsupportedVersion {
        found: found.map_or_else(|| "missing".to_string(), Json::to_string),
        expected: SAVE_VERSION,
    }
}

fn write_document(document: &Json, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    // Pretty printing uses two-space indentation and leaves non-ASCII text unescaped
    let text = serde_json::to_string_pretty(document).map_err(std::io::Error::from)?;
    fs::write(path, text)?;
    Ok(())
}

fn read_document(path: &Path) -> Result<Json> {
    if !path.exists() {
        return Err(PersistenceError::NotFound(path.to_path_buf()));
    }

    let text = fs::read_to_string(path).map_err(|e| PersistenceError::from(e).during_load())?;
    serde_json::from_str(&text).map_err(PersistenceError::InvalidJson)
}

/// Saves `state` to `path` using a registry built from its own type
pub fn save_state<S: GameState>(state: &S, path: impl AsRef<Path>) -> Result<()> {
    Persistence::for_state::<S>()?.save(state, path)
}

/// Loads a state of type `S` from `path` using a registry built from its own type
pub fn load_state<S: GameState>(path: impl AsRef<Path>) -> Result<S> {
    Persistence::for_state::<S>()?.load(path)
}
