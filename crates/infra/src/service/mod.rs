//! Application services: one [`BackOffice`] facade over the store.
//!
//! Every operation follows the same pipeline:
//!
//! ```text
//! authorize actor
//!   ↓
//! begin store transaction
//!   ↓
//! load aggregates, let the domain decide (execute command)
//!   ↓
//! persist resulting state, commit
//!   ↓
//! notify (after commit only, fire-and-forget)
//! ```
//!
//! Any error before commit drops the transaction, which rolls it back.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use thiserror::Error;

use fabdesk_auth::AuthzError;
use fabdesk_core::{DomainError, ReferenceKind};
use fabdesk_events::{Notification, NotificationSink, NoopSink};

use crate::store::{InMemoryStore, Store, StoreError, StoreTx};

mod catalog;
mod clients;
mod expenses;
mod invoices;
mod payments;
mod quotes;

pub use invoices::{InvoiceDetails, InvoiceOverview};
pub use quotes::{DevisQuery, NewDevis, NewLine};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<AuthzError> for ServiceError {
    fn from(value: AuthzError) -> Self {
        ServiceError::Domain(value.into())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// The shop's back office: quotes, invoices, payments, expenses, clients and price tables.
///
/// Cheap to clone; share one instance across request handlers.
#[derive(Clone)]
pub struct BackOffice {
    store: Arc<dyn Store>,
    notifier: Arc<dyn NotificationSink>,
}

impl std::fmt::Debug for BackOffice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackOffice").finish_non_exhaustive()
    }
}

impl BackOffice {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn NotificationSink>) -> Self {
        Self { store, notifier }
    }

    /// Fresh in-memory back office without notifications (tests, dev).
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()), Arc::new(NoopSink))
    }

    async fn begin(&self) -> ServiceResult<Box<dyn StoreTx>> {
        Ok(self.store.begin().await?)
    }

    fn notify(&self, notification: Notification) {
        self.notifier.notify(notification);
    }
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Next reference of `kind` for the year of `now`. Must run in the
/// transaction that inserts the document.
async fn next_reference(tx: &mut dyn StoreTx, kind: ReferenceKind, now: DateTime<Utc>) -> ServiceResult<String> {
    let year = now.year();
    let issued = tx.issued_references(kind, year).await?;
    Ok(kind.next(year, issued.iter().map(String::as_str))?)
}

fn not_found(what: impl Into<String>) -> ServiceError {
    ServiceError::Domain(DomainError::not_found(what))
}
