//! Price tables and the line-item calculator.
//!
//! Pure domain logic (no IO). The store loads the rows a calculation needs and
//! hands them over as a [`PriceSnapshot`].

pub mod calculator;
pub mod fixed_service;
pub mod machine_pricing;
pub mod material;

pub use calculator::{LineInput, PriceSnapshot, PriceTables, PricedLine, calculate_line};
pub use fixed_service::{FixedService, FixedServicePatch, NewFixedService};
pub use machine_pricing::MachinePricing;
pub use material::{Material, MaterialPatch, NewMaterial};

use fabdesk_core::DomainError;
use rust_decimal::Decimal;

pub(crate) fn ensure_name(field: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

pub(crate) fn ensure_price(field: &str, value: Decimal) -> Result<(), DomainError> {
    if value < Decimal::ZERO {
        return Err(DomainError::validation(format!("{field} cannot be negative")));
    }
    Ok(())
}
