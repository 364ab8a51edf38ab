//! Ludos - save/load persistence for game states
//!
//! Core modules:
//! - `state`: The game state root and its engine-owned fields
//! - `save`: Value model, tagged JSON codec, type registry and save slots
//!
//! A state type opts in with `persist_state!` and every enum or struct it
//! reaches with `persist_enum!` / `persist_record!`. Saving walks the state
//! into a JSON document; loading rebuilds a fresh instance of the same type.

pub mod save;
pub mod state;

pub use save::{
    Persistence, PersistenceError, SaveConfig, SaveManager, SaveType, TypeRegistry, load_state,
    save_state,
};
pub use state::{BaseGameState, EngineFields, GameState};
