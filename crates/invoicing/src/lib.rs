//! Invoicing domain module.
//!
//! Turning validated quotes (or ad-hoc items) into invoices, and tracking the
//! payments received against them. Pure domain logic (no IO).

pub mod balance;
pub mod consolidation;
pub mod invoice;
pub mod payment;

pub use balance::{BalanceSummary, ClientBalance, InvoiceBalance, PendingDevis};
pub use consolidation::{Consolidation, consolidate};
pub use invoice::{Invoice, InvoiceItem, NewInvoiceItem};
pub use payment::{
    AmendPayment, NewPayment, Payment, PaymentCommand, PaymentEvent, PaymentLedger, PaymentPatch,
    PaymentStats, RecordPayment, RemovePayment,
};
