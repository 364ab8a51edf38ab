//! Game state root
//!
//! Every game keeps its persistent data in one root struct. Besides its own
//! fields, the root carries the [`EngineFields`] that the engine loop owns:
//! a running flag, a frame counter, an elapsed-time accumulator and a
//! free-form metadata map.
//!
//! ```ignore
//! #[derive(Debug, Default)]
//! struct MyState {
//!     engine: EngineFields,
//!     score: i64,
//!     player_x: f64,
//! }
//! persist_state!(MyState { score, player_x });
//! ```

use std::collections::BTreeMap;

use crate::save::{
    FieldSchema, METADATA_FIELD, Persist, PersistRecord, RecordValue, Result, Value, field_shape,
};

/// Fields managed by the engine rather than by game content
///
/// `is_running`, `frame_count` and `elapsed_time` are never saved and are
/// reset after every load. `metadata` is saved with the rest of the state.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineFields {
    pub is_running: bool,
    pub frame_count: u64,
    pub elapsed_time: f64,
    pub metadata: BTreeMap<String, Value>,
}

impl Default for EngineFields {
    fn default() -> Self {
        EngineFields {
            is_running: true,
            frame_count: 0,
            elapsed_time: 0.0,
            metadata: BTreeMap::new(),
        }
    }
}

impl EngineFields {
    /// Field schemas the engine fields add to a state record
    pub fn schemas() -> Vec<FieldSchema> {
        vec![
            FieldSchema {
                name: "is_running",
                shape: field_shape(|e: &EngineFields| &e.is_running),
            },
            FieldSchema {
                name: "frame_count",
                shape: field_shape(|e: &EngineFields| &e.frame_count),
            },
            FieldSchema {
                name: "elapsed_time",
                shape: field_shape(|e: &EngineFields| &e.elapsed_time),
            },
            FieldSchema {
                name: METADATA_FIELD,
                shape: field_shape(|e: &EngineFields| &e.metadata),
            },
        ]
    }

    /// Writes the engine fields at the top level of a state record
    pub fn write_into(&self, record: &mut RecordValue) -> Result<()> {
        record.push("is_running", self.is_running.to_value()?);
        record.push("frame_count", self.frame_count.to_value()?);
        record.push("elapsed_time", self.elapsed_time.to_value()?);
        record.push(METADATA_FIELD, self.metadata.to_value()?);
        Ok(())
    }

    /// Reads the engine fields out of a state record
    ///
    /// Missing entries keep their defaults.
    pub fn read_from(record: &mut RecordValue) -> Result<Self> {
        let mut fields = EngineFields::default();
        if let Some(value) = record.take("is_running") {
            fields.is_running = Persist::from_value(value)?;
        }
        if let Some(value) = record.take("frame_count") {
            fields.frame_count = Persist::from_value(value)?;
        }
        if let Some(value) = record.take("elapsed_time") {
            fields.elapsed_time = Persist::from_value(value)?;
        }
        if let Some(value) = record.take(METADATA_FIELD) {
            fields.metadata = Persist::from_value(value)?;
        }
        Ok(fields)
    }

    /// Restores the runtime-only fields to their defaults
    pub fn reset_runtime(&mut self) {
        let defaults = EngineFields::default();
        self.is_running = defaults.is_running;
        self.frame_count = defaults.frame_count;
        self.elapsed_time = defaults.elapsed_time;
    }
}

/// A record type that can be the root of a save
///
/// Implemented by `persist_state!`.
pub trait GameState: PersistRecord {
    fn engine(&self) -> &EngineFields;

    fn engine_mut(&mut self) -> &mut EngineFields;

    /// Resets every engine-owned field to its declared default
    fn reset_engine_fields(&mut self) {
        self.engine_mut().reset_runtime();
    }
}

/// A state with no game fields of its own
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaseGameState {
    pub engine: EngineFields,
}

crate::persist_state!(BaseGameState {});
