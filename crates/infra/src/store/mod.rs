//! Transactional persistence boundary.
//!
//! Every service operation runs inside exactly one [`StoreTx`]: it reads what
//! it needs, lets the domain decide, writes the outcome and commits. Dropping
//! a transaction without committing rolls it back.
//!
//! ## Locking
//!
//! Point lookups of quotes and invoices happen with write intent: backends
//! that can lock rows (Postgres) lock them until the transaction ends, which
//! serializes payment mutations per invoice. Reference allocation is
//! serialized per year prefix by [`StoreTx::issued_references`].

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use fabdesk_clients::Client;
use fabdesk_core::{
    ClientId, DevisId, ExpenseId, FixedServiceId, InvoiceId, MachineType, MaterialId, PaymentId,
    ReferenceKind,
};
use fabdesk_expenses::{Expense, ExpenseFilter};
use fabdesk_invoicing::{Invoice, Payment};
use fabdesk_pricing::{FixedService, MachinePricing, Material};
use fabdesk_quotes::{Devis, DevisFilter};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Store operation error.
///
/// These are **infrastructure errors** as opposed to domain errors
/// (validation, lifecycle rules).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend is unreachable or failed the statement.
    #[error("store backend error: {0}")]
    Backend(String),

    /// A uniqueness or concurrency guard rejected the write.
    #[error("store conflict: {0}")]
    Conflict(String),

    /// A stored row could not be decoded.
    #[error("corrupt stored data: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Entry point: opens transactions.
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>>;
}

#[async_trait]
impl<S> Store for Arc<S>
where
    S: Store + ?Sized,
{
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        (**self).begin().await
    }
}

/// One atomic unit of work.
///
/// Lists come back in a stable order: clients and quotes newest first,
/// invoices newest first, payments and expenses by their own date (newest
/// first), catalog rows by name.
#[async_trait]
pub trait StoreTx: Send {
    // price tables

    async fn machine_pricing(&mut self, machine_type: MachineType) -> StoreResult<Option<MachinePricing>>;

    async fn list_machine_pricing(&mut self) -> StoreResult<Vec<MachinePricing>>;

    async fn save_machine_pricing(&mut self, pricing: &MachinePricing) -> StoreResult<()>;

    async fn material(&mut self, id: MaterialId) -> StoreResult<Option<Material>>;

    async fn list_materials(&mut self, active_only: bool) -> StoreResult<Vec<Material>>;

    async fn save_material(&mut self, material: &Material) -> StoreResult<()>;

    async fn fixed_service(&mut self, id: FixedServiceId) -> StoreResult<Option<FixedService>>;

    async fn list_fixed_services(&mut self, active_only: bool) -> StoreResult<Vec<FixedService>>;

    async fn save_fixed_service(&mut self, service: &FixedService) -> StoreResult<()>;

    // clients

    async fn client(&mut self, id: ClientId) -> StoreResult<Option<Client>>;

    async fn list_clients(&mut self) -> StoreResult<Vec<Client>>;

    async fn save_client(&mut self, client: &Client) -> StoreResult<()>;

    async fn delete_client(&mut self, id: ClientId) -> StoreResult<()>;

    // quotes

    async fn devis(&mut self, id: DevisId) -> StoreResult<Option<Devis>>;

    async fn list_devis(&mut self, filter: &DevisFilter) -> StoreResult<Vec<Devis>>;

    async fn count_devis_for_client(&mut self, client_id: ClientId) -> StoreResult<usize>;

    /// Insert or replace a quote with its lines and services.
    async fn save_devis(&mut self, devis: &Devis) -> StoreResult<()>;

    async fn delete_devis(&mut self, id: DevisId) -> StoreResult<()>;

    // invoices

    async fn invoice(&mut self, id: InvoiceId) -> StoreResult<Option<Invoice>>;

    async fn list_invoices(&mut self, client_id: Option<ClientId>) -> StoreResult<Vec<Invoice>>;

    /// Invoices are immutable once created: insert only.
    async fn insert_invoice(&mut self, invoice: &Invoice) -> StoreResult<()>;

    async fn delete_invoice(&mut self, id: InvoiceId) -> StoreResult<()>;

    // payments

    async fn payment(&mut self, id: PaymentId) -> StoreResult<Option<Payment>>;

    async fn payments_for_invoice(&mut self, invoice_id: InvoiceId) -> StoreResult<Vec<Payment>>;

    async fn save_payment(&mut self, payment: &Payment) -> StoreResult<()>;

    async fn delete_payment(&mut self, id: PaymentId) -> StoreResult<()>;

    // expenses

    async fn expense(&mut self, id: ExpenseId) -> StoreResult<Option<Expense>>;

    async fn list_expenses(&mut self, filter: &ExpenseFilter) -> StoreResult<Vec<Expense>>;

    async fn save_expense(&mut self, expense: &Expense) -> StoreResult<()>;

    async fn delete_expense(&mut self, id: ExpenseId) -> StoreResult<()>;

    // references

    /// References of `kind` already issued in `year`.
    ///
    /// Holds an allocation lock for `(kind, year)` until the transaction ends,
    /// so the caller can derive and insert the next reference race-free.
    async fn issued_references(&mut self, kind: ReferenceKind, year: i32) -> StoreResult<Vec<String>>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
