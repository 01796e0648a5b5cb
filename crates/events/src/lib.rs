//! Notification events emitted by the stock ledger and order placement paths.
//!
//! Delivery (push, voice, dashboards) is done by external subscribers; this crate
//! only provides the publish/subscribe mechanics.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
