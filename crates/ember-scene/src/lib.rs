//! Ember Scene - entity lifecycle and scene management
//!
//! The core of the engine: scenes own their entities exclusively, drive their
//! per-frame update and draw cycle, and apply structural changes (inserts,
//! cross-scene moves, removals) only at defined reconciliation points so that
//! entity logic can safely request them mid-frame.

mod entity;
mod error;
mod event;
mod scene;
mod stage;

pub use entity::{Entity, EntityBase, EntityId};
pub use error::SceneError;
pub use event::{Condition, Connection, Effect, EventHandler};
pub use scene::{Scene, UpdateContext};
pub use stage::{SceneId, Stage};
