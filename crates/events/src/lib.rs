//! `storefront-events`: change signals and in-process pub/sub mechanics.

pub mod bus;
pub mod in_memory_bus;
pub mod signal;

pub use bus::{EventBus, Subscription};
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use signal::{ChangeSignal, EditorAnnouncement, Originated, SignalKind, StorageEvent};
