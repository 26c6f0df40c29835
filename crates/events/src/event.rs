use chrono::{DateTime, Utc};

/// A domain event.
///
/// Events are immutable facts produced by an aggregate's decision logic.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "quotes.devis.validated").
    fn event_type(&self) -> &'static str;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
