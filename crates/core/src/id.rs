//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

macro_rules! uuid_newtype {
    ($(#[$meta:meta])* $t:ident, $name:literal) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $t(Uuid);

        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered), so identifiers sort by creation time.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s)
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

uuid_newtype!(
    /// Identifier of an authenticated user (admin or employee).
    UserId,
    "UserId"
);
uuid_newtype!(ClientId, "ClientId");
uuid_newtype!(
    /// Identifier of a quote ("devis").
    DevisId,
    "DevisId"
);
uuid_newtype!(DevisLineId, "DevisLineId");
uuid_newtype!(
    /// Identifier of a fixed service attached to a quote (not the catalog service).
    DevisServiceId,
    "DevisServiceId"
);
uuid_newtype!(InvoiceId, "InvoiceId");
uuid_newtype!(InvoiceItemId, "InvoiceItemId");
uuid_newtype!(PaymentId, "PaymentId");
uuid_newtype!(MaterialId, "MaterialId");
uuid_newtype!(FixedServiceId, "FixedServiceId");
uuid_newtype!(
    /// Identifier of a shop expense (rent, supplies, tooling, ...).
    ExpenseId,
    "ExpenseId"
);
uuid_newtype!(NotificationId, "NotificationId");
