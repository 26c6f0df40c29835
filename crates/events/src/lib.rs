//! Domain events and the fire-and-forget notification channel.
//!
//! Aggregates describe what happened with [`Event`]s. Once a transaction has
//! committed, the service layer turns the interesting ones into
//! [`Notification`]s and hands them to a [`NotificationSink`]. Sinks never
//! report failures back: delivery is best-effort and correctness of the core
//! never depends on it.

pub mod event;
pub mod in_memory_bus;
pub mod notification;
pub mod sink;

pub use event::Event;
pub use in_memory_bus::{InMemoryNotificationBus, Subscription};
pub use notification::{Notification, NotificationKind};
pub use sink::{NoopSink, NotificationSink, TracingSink};
