//! Save/Load system
//!
//! This module turns a game state tree into a versioned JSON document and
//! back:
//! - Human-readable save files (two-space indented, non-ASCII kept literally)
//! - Enums, sets, tuples and nested records survive the round trip
//! - Engine-owned runtime fields are never written
//! - Multiple save slots and timed autosaves via [`SaveManager`]
//!
//! # Architecture
//!
//! - `types`: Version constants and error types
//! - `value`: The intermediate value tree and type schemas
//! - `saveable`: `Persist` traits and impls for std types
//! - `macros`: `persist_enum!`, `persist_record!` and `persist_state!`
//! - `registry`: TypeRegistry for resolving type tags
//! - `serializer` / `deserializer`: Tagged JSON encoding
//! - `store`: Persistence, the save/load component
//! - `config` / `manager`: Slot-based save files
//!
//! # Example Usage
//!
//! ```ignore
//! let persistence = Persistence::for_state::<MyState>()?;
//! persistence.save(&state, "saves/game.json")?;
//!
//! let loaded: MyState = persistence.load("saves/game.json")?;
//! ```

pub mod config;
pub mod deserializer;
pub mod macros;
pub mod manager;
pub mod registry;
pub mod saveable;
pub mod serializer;
pub mod store;
pub mod types;
pub mod value;

// Re-export commonly used types
pub use config::SaveConfig;
pub use deserializer::Decoder;
pub use macros::{field_shape, record_fields};
pub use manager::{SaveFileInfo, SaveManager, SaveType};
pub use registry::TypeRegistry;
pub use saveable::{FrozenSet, Persist, PersistEnum, PersistKey, PersistRecord};
pub use store::{Persistence, SaveHeader, load_state, save_state};
pub use types::*;
pub use value::{
    EnumSchema, EnumValue, FieldSchema, Key, RecordRef, RecordSchema, RecordValue, Shape, Value,
};
