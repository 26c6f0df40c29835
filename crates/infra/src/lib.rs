//! Infrastructure layer: persistence and application services.
//!
//! - [`store`]: the transactional `Store` boundary with in-memory and Postgres backends.
//! - [`service`]: the `BackOffice` facade that authorizes, runs domain logic inside one
//!   store transaction and notifies after commit.

pub mod seed;
pub mod service;
pub mod store;

#[cfg(test)]
mod integration_tests;

pub use seed::seed_default_pricing;
pub use service::{
    BackOffice, DevisQuery, InvoiceDetails, InvoiceOverview, NewDevis, NewLine, ServiceError, ServiceResult,
};
pub use store::{InMemoryStore, PostgresStore, Store, StoreError, StoreResult, StoreTx};
