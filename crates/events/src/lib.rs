//! Change notification and event mechanics.
//!
//! Pure pub/sub plumbing shared by the store implementations and the realtime
//! synchronization layer. Nothing here knows about ledgers or printing.

pub mod bus;
pub mod event;
pub mod in_memory_bus;
pub mod notification;

pub use bus::{EventBus, Subscription};
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use notification::{ChangeKind, ChangeNotification, ClassScoped};
