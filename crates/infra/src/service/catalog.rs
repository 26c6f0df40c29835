use rust_decimal::Decimal;
use tracing::{info, instrument};

use fabdesk_auth::{Actor, require_admin};
use fabdesk_core::{FixedServiceId, MachineType, MaterialId};
use fabdesk_pricing::{
    FixedService, FixedServicePatch, MachinePricing, Material, MaterialPatch, NewFixedService, NewMaterial,
};

use super::{BackOffice, ServiceResult, not_found, now};
use crate::store::StoreTx;

async fn load_material(tx: &mut dyn StoreTx, id: MaterialId) -> ServiceResult<Material> {
    tx.material(id).await?.ok_or_else(|| not_found("material"))
}

async fn load_fixed_service(tx: &mut dyn StoreTx, id: FixedServiceId) -> ServiceResult<FixedService> {
    tx.fixed_service(id)
        .await?
        .ok_or_else(|| not_found("fixed service"))
}

impl BackOffice {
    #[instrument(skip(self, _actor), err)]
    pub async fn list_machine_pricing(&self, _actor: &Actor) -> ServiceResult<Vec<MachinePricing>> {
        let mut tx = self.begin().await?;
        Ok(tx.list_machine_pricing().await?)
    }

    /// Pricing rows of the machines the actor may put on a quote.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn authorized_machines(&self, actor: &Actor) -> ServiceResult<Vec<MachinePricing>> {
        let mut tx = self.begin().await?;
        let rows = tx.list_machine_pricing().await?;
        Ok(rows
            .into_iter()
            .filter(|p| actor.can_use_machine(p.machine_type))
            .collect())
    }

    /// Create or replace the unit price of a machine category.
    #[instrument(skip(self, actor, description), fields(user_id = %actor.user_id), err)]
    pub async fn set_machine_pricing(
        &self,
        actor: &Actor,
        machine_type: MachineType,
        price_per_unit: Decimal,
        description: Option<String>,
    ) -> ServiceResult<MachinePricing> {
        require_admin(actor)?;
        let at = now();
        let mut tx = self.begin().await?;
        let pricing = match tx.machine_pricing(machine_type).await? {
            Some(mut existing) => {
                existing.update(price_per_unit, description, at)?;
                existing
            }
            None => MachinePricing::new(machine_type, price_per_unit, description, at)?,
        };
        tx.save_machine_pricing(&pricing).await?;
        tx.commit().await?;

        info!(machine_type = %machine_type, price = %pricing.price_per_unit, "machine pricing updated");
        Ok(pricing)
    }

    /// Active materials, by name.
    #[instrument(skip(self, _actor), err)]
    pub async fn list_materials(&self, _actor: &Actor) -> ServiceResult<Vec<Material>> {
        let mut tx = self.begin().await?;
        Ok(tx.list_materials(true).await?)
    }

    #[instrument(skip(self, actor, new), fields(user_id = %actor.user_id), err)]
    pub async fn create_material(&self, actor: &Actor, new: NewMaterial) -> ServiceResult<Material> {
        require_admin(actor)?;
        let material = Material::create(MaterialId::new(), new, now())?;
        let mut tx = self.begin().await?;
        tx.save_material(&material).await?;
        tx.commit().await?;

        info!(material_id = %material.id, name = %material.name, "material created");
        Ok(material)
    }

    #[instrument(skip(self, actor, patch), fields(user_id = %actor.user_id), err)]
    pub async fn update_material(&self, actor: &Actor, id: MaterialId, patch: MaterialPatch) -> ServiceResult<Material> {
        require_admin(actor)?;
        let mut tx = self.begin().await?;
        let mut material = load_material(tx.as_mut(), id).await?;
        material.update(patch)?;
        tx.save_material(&material).await?;
        tx.commit().await?;
        Ok(material)
    }

    /// Soft delete: existing quote lines keep their cost snapshot.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn deactivate_material(&self, actor: &Actor, id: MaterialId) -> ServiceResult<()> {
        require_admin(actor)?;
        let mut tx = self.begin().await?;
        let mut material = load_material(tx.as_mut(), id).await?;
        material.deactivate();
        tx.save_material(&material).await?;
        tx.commit().await?;

        info!(material_id = %id, "material deactivated");
        Ok(())
    }

    /// Active fixed services, by name.
    #[instrument(skip(self, _actor), err)]
    pub async fn list_fixed_services(&self, _actor: &Actor) -> ServiceResult<Vec<FixedService>> {
        let mut tx = self.begin().await?;
        Ok(tx.list_fixed_services(true).await?)
    }

    #[instrument(skip(self, actor, new), fields(user_id = %actor.user_id), err)]
    pub async fn create_fixed_service(&self, actor: &Actor, new: NewFixedService) -> ServiceResult<FixedService> {
        require_admin(actor)?;
        let service = FixedService::create(FixedServiceId::new(), new, now())?;
        let mut tx = self.begin().await?;
        tx.save_fixed_service(&service).await?;
        tx.commit().await?;

        info!(service_id = %service.id, name = %service.name, "fixed service created");
        Ok(service)
    }

    #[instrument(skip(self, actor, patch), fields(user_id = %actor.user_id), err)]
    pub async fn update_fixed_service(
        &self,
        actor: &Actor,
        id: FixedServiceId,
        patch: FixedServicePatch,
    ) -> ServiceResult<FixedService> {
        require_admin(actor)?;
        let mut tx = self.begin().await?;
        let mut service = load_fixed_service(tx.as_mut(), id).await?;
        service.update(patch)?;
        tx.save_fixed_service(&service).await?;
        tx.commit().await?;
        Ok(service)
    }

    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn deactivate_fixed_service(&self, actor: &Actor, id: FixedServiceId) -> ServiceResult<()> {
        require_admin(actor)?;
        let mut tx = self.begin().await?;
        let mut service = load_fixed_service(tx.as_mut(), id).await?;
        service.deactivate();
        tx.save_fixed_service(&service).await?;
        tx.commit().await?;

        info!(service_id = %id, "fixed service deactivated");
        Ok(())
    }
}
