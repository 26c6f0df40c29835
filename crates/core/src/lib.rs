//! `fabdesk-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! typed identifiers, the domain error model, money rounding rules, machine
//! categories and the per-year document reference scheme.

pub mod aggregate;
pub mod error;
pub mod id;
pub mod machine;
pub mod money;
pub mod reference;

pub use aggregate::{Aggregate, AggregateRoot};
pub use error::{DomainError, DomainResult};
pub use id::{
    ClientId, DevisId, DevisLineId, DevisServiceId, ExpenseId, FixedServiceId, InvoiceId,
    InvoiceItemId, MaterialId, NotificationId, PaymentId, UserId,
};
pub use machine::{MachineType, Measure};
pub use money::{Money, round2};
pub use reference::ReferenceKind;
