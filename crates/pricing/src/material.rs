use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fabdesk_core::{DomainError, MaterialId};

use crate::{ensure_name, ensure_price};

/// Raw material that can be billed on a laser line.
///
/// Soft-deleted through `active`; quote lines keep their cost snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    pub id: MaterialId,
    pub name: String,
    pub price_per_unit: Decimal,
    pub unit: String,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMaterial {
    pub name: String,
    pub price_per_unit: Decimal,
    pub unit: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialPatch {
    pub name: Option<String>,
    pub price_per_unit: Option<Decimal>,
    pub unit: Option<String>,
    pub description: Option<String>,
}

impl Material {
    pub fn create(id: MaterialId, new: NewMaterial, now: DateTime<Utc>) -> Result<Self, DomainError> {
        ensure_name("name", &new.name)?;
        ensure_name("unit", &new.unit)?;
        ensure_price("price_per_unit", new.price_per_unit)?;
        Ok(Self {
            id,
            name: new.name.trim().to_string(),
            price_per_unit: new.price_per_unit,
            unit: new.unit.trim().to_string(),
            description: new.description,
            active: true,
            created_at: now,
        })
    }

    /// Apply a partial update. Validation happens before anything changes.
    pub fn update(&mut self, patch: MaterialPatch) -> Result<(), DomainError> {
        if let Some(name) = &patch.name {
            ensure_name("name", name)?;
        }
        if let Some(unit) = &patch.unit {
            ensure_name("unit", unit)?;
        }
        if let Some(price) = patch.price_per_unit {
            ensure_price("price_per_unit", price)?;
        }

        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(unit) = patch.unit {
            self.unit = unit.trim().to_string();
        }
        if let Some(price) = patch.price_per_unit {
            self.price_per_unit = price;
        }
        if patch.description.is_some() {
            self.description = patch.description;
        }
        Ok(())
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }
}
