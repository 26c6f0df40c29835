//! Money arithmetic.
//!
//! All amounts are fixed-point decimals. Rounding happens only at the points
//! where a value is persisted or shown: 2 decimal places, half away from zero.

use rust_decimal::{Decimal, RoundingStrategy};

/// Monetary amount (TND).
pub type Money = Decimal;

/// Currency label used in human-readable renderings.
pub const CURRENCY: &str = "TND";

/// Round to the cent, half away from zero.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Sum a sequence of amounts without intermediate rounding.
pub fn sum<I>(values: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    values.into_iter().fold(Decimal::ZERO, |acc, v| acc + v)
}

/// `part / whole` as a percentage rounded to 2 decimals; zero when `whole <= 0`.
pub fn percent(part: Decimal, whole: Decimal) -> Decimal {
    if whole <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    round2(part * Decimal::ONE_HUNDRED / whole)
}

/// Render an amount with exactly two decimals (e.g. `45.00`).
pub fn format_amount(value: Decimal) -> String {
    format!("{:.2}", round2(value))
}

/// Render a measure without trailing zeros (e.g. `30`, `2.5`).
pub fn format_quantity(value: Decimal) -> String {
    value.normalize().to_string()
}
