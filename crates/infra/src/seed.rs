//! Start-up data.

use chrono::Utc;
use tracing::info;

use fabdesk_pricing::MachinePricing;

use crate::store::{Store, StoreResult};

/// Insert the factory machine prices for categories that have no row yet.
///
/// Idempotent: existing rows, including admin edits, are left alone.
/// Returns how many rows were inserted.
pub async fn seed_default_pricing(store: &dyn Store) -> StoreResult<usize> {
    let mut tx = store.begin().await?;
    let mut inserted = 0;
    for pricing in MachinePricing::defaults(Utc::now()) {
        if tx.machine_pricing(pricing.machine_type).await?.is_none() {
            tx.save_machine_pricing(&pricing).await?;
            inserted += 1;
        }
    }
    tx.commit().await?;

    if inserted > 0 {
        info!(inserted, "default machine pricing seeded");
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use fabdesk_core::MachineType;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn seeding_twice_keeps_admin_edits() {
        let store = InMemoryStore::new();
        assert_eq!(seed_default_pricing(&store).await.unwrap(), 4);

        let mut tx = store.begin().await.unwrap();
        let mut cnc = tx.machine_pricing(MachineType::Cnc).await.unwrap().unwrap();
        cnc.update(dec!(1.80), None, Utc::now()).unwrap();
        tx.save_machine_pricing(&cnc).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(seed_default_pricing(&store).await.unwrap(), 0);
        let mut tx = store.begin().await.unwrap();
        let cnc = tx.machine_pricing(MachineType::Cnc).await.unwrap().unwrap();
        assert_eq!(cnc.price_per_unit, dec!(1.80));
    }
}
