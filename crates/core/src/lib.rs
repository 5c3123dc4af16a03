//! Shared building blocks for the shop-floor engine.
//!
//! This crate contains **pure** primitives (no IO): the error taxonomy every
//! public operation reports, identifiers, and the entity classes the remote
//! store is partitioned into.

pub mod entity_class;
pub mod error;
pub mod id;

pub use entity_class::EntityClass;
pub use error::{FloorError, FloorResult};
pub use id::{EventId, MachineId};
