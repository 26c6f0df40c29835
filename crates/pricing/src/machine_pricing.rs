use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fabdesk_core::{DomainError, MachineType};

use crate::ensure_price;

/// Unit price of one machine category. Exactly one row per category; rows
/// are upserted, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachinePricing {
    pub machine_type: MachineType,
    pub price_per_unit: Decimal,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl MachinePricing {
    pub fn new(
        machine_type: MachineType,
        price_per_unit: Decimal,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        ensure_price("price_per_unit", price_per_unit)?;
        Ok(Self {
            machine_type,
            price_per_unit,
            description,
            updated_at: now,
        })
    }

    /// Factory price list used to seed an empty table.
    pub fn defaults(now: DateTime<Utc>) -> Vec<Self> {
        MachineType::ALL
            .into_iter()
            .map(|machine_type| {
                let (cents, description) = match machine_type {
                    MachineType::Cnc => (150, "Prix par minute"),
                    MachineType::Laser => (200, "Prix par minute"),
                    MachineType::Champs => (500, "Prix par mètre"),
                    MachineType::Panneaux => (2500, "Prix par unité"),
                };
                Self {
                    machine_type,
                    price_per_unit: Decimal::new(cents, 2),
                    description: Some(description.to_string()),
                    updated_at: now,
                }
            })
            .collect()
    }

    /// Upsert semantics: price always replaced, description only when given.
    pub fn update(
        &mut self,
        price_per_unit: Decimal,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        ensure_price("price_per_unit", price_per_unit)?;
        self.price_per_unit = price_per_unit;
        if description.is_some() {
            self.description = description;
        }
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn defaults_cover_every_machine() {
        let rows = MachinePricing::defaults(Utc::now());
        assert_eq!(rows.len(), MachineType::ALL.len());
        let cnc = rows.iter().find(|r| r.machine_type == MachineType::Cnc).unwrap();
        assert_eq!(cnc.price_per_unit, dec!(1.50));
        let panneaux = rows.iter().find(|r| r.machine_type == MachineType::Panneaux).unwrap();
        assert_eq!(panneaux.price_per_unit, dec!(25));
    }

    #[test]
    fn negative_price_is_rejected() {
        let err = MachinePricing::new(MachineType::Laser, dec!(-1), None, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn update_keeps_description_when_omitted() {
        let mut row = MachinePricing::new(MachineType::Champs, dec!(5), Some("Prix par mètre".into()), Utc::now()).unwrap();
        row.update(dec!(6.5), None, Utc::now()).unwrap();
        assert_eq!(row.price_per_unit, dec!(6.5));
        assert_eq!(row.description.as_deref(), Some("Prix par mètre"));
    }
}
