use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use fabdesk_core::{NotificationId, UserId};

/// What a notification is about.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    ClientCreated,
    ClientUpdated,
    ClientDeleted,
    DevisCreated,
    DevisValidated,
    DevisCancelled,
    InvoiceCreated,
    InvoiceDeleted,
    PaymentReceived,
    ExpenseCreated,
    ExpenseDeleted,
}

impl NotificationKind {
    /// Topic name used by realtime transports.
    pub fn topic(self) -> &'static str {
        match self {
            NotificationKind::ClientCreated => "client.created",
            NotificationKind::ClientUpdated => "client.updated",
            NotificationKind::ClientDeleted => "client.deleted",
            NotificationKind::DevisCreated => "devis.created",
            NotificationKind::DevisValidated => "devis.validated",
            NotificationKind::DevisCancelled => "devis.cancelled",
            NotificationKind::InvoiceCreated => "invoice.created",
            NotificationKind::InvoiceDeleted => "invoice.deleted",
            NotificationKind::PaymentReceived => "payment.received",
            NotificationKind::ExpenseCreated => "expense.created",
            NotificationKind::ExpenseDeleted => "expense.deleted",
        }
    }
}

/// A user-facing "something happened" message for back-office admins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub triggered_by: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
    /// Set once an admin has acknowledged the notification.
    #[serde(default)]
    pub is_read: bool,
}

impl Notification {
    pub fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: NotificationId::new(),
            kind,
            title: title.into(),
            message: message.into(),
            entity_type: None,
            entity_id: None,
            triggered_by: None,
            occurred_at: Utc::now(),
            is_read: false,
        }
    }

    pub fn about(mut self, entity_type: &str, entity_id: impl ToString) -> Self {
        self.entity_type = Some(entity_type.to_string());
        self.entity_id = Some(entity_id.to_string());
        self
    }

    pub fn by(mut self, user: UserId) -> Self {
        self.triggered_by = Some(user);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_fills_entity_and_actor() {
        let user = UserId::new();
        let n = Notification::new(NotificationKind::DevisValidated, "Devis validé", "DEV-2026-0001")
            .about("devis", "abc")
            .by(user);

        assert_eq!(n.entity_type.as_deref(), Some("devis"));
        assert_eq!(n.entity_id.as_deref(), Some("abc"));
        assert_eq!(n.triggered_by, Some(user));
        assert!(!n.is_read);
    }

    #[test]
    fn kind_serializes_in_screaming_snake_case() {
        let json = serde_json::to_string(&NotificationKind::PaymentReceived).unwrap();
        assert_eq!(json, "\"PAYMENT_RECEIVED\"");
    }
}
