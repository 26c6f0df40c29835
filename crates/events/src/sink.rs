//! Notification sinks.
//!
//! A sink is the outbound edge of the core: the service layer calls
//! [`NotificationSink::notify`] after a transaction commits and moves on.
//! Implementations must not block for long and must swallow their own
//! delivery failures.

use std::sync::Arc;

use crate::Notification;

pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

impl<S> NotificationSink for Arc<S>
where
    S: NotificationSink + ?Sized,
{
    fn notify(&self, notification: Notification) {
        (**self).notify(notification)
    }
}

/// Discards every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl NotificationSink for NoopSink {
    fn notify(&self, _notification: Notification) {}
}

/// Writes notifications to the tracing pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, notification: Notification) {
        tracing::info!(
            kind = notification.kind.topic(),
            entity_type = notification.entity_type.as_deref().unwrap_or("-"),
            entity_id = notification.entity_id.as_deref().unwrap_or("-"),
            "{}: {}",
            notification.title,
            notification.message
        );
    }
}
