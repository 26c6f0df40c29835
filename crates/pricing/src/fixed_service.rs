use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fabdesk_core::{DomainError, FixedServiceId};

use crate::{ensure_name, ensure_price};

/// Flat-priced add-on (assembly, delivery, ...) attachable to a quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedService {
    pub id: FixedServiceId,
    pub name: String,
    pub price: Decimal,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFixedService {
    pub name: String,
    pub price: Decimal,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedServicePatch {
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub description: Option<String>,
}

impl FixedService {
    pub fn create(id: FixedServiceId, new: NewFixedService, now: DateTime<Utc>) -> Result<Self, DomainError> {
        ensure_name("name", &new.name)?;
        ensure_price("price", new.price)?;
        Ok(Self {
            id,
            name: new.name.trim().to_string(),
            price: new.price,
            description: new.description,
            active: true,
            created_at: now,
        })
    }

    pub fn update(&mut self, patch: FixedServicePatch) -> Result<(), DomainError> {
        if let Some(name) = &patch.name {
            ensure_name("name", name)?;
        }
        if let Some(price) = patch.price {
            ensure_price("price", price)?;
        }

        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(price) = patch.price {
            self.price = price;
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
