use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use fabdesk_auth::{Actor, require_admin, require_machine, require_owner_or_admin};
use fabdesk_core::money::format_amount;
use fabdesk_core::{
    Aggregate, ClientId, DevisId, DevisLineId, DevisServiceId, FixedServiceId, ReferenceKind,
};
use fabdesk_events::{Notification, NotificationKind};
use fabdesk_pricing::{LineInput, PriceSnapshot, PricedLine, calculate_line};
use fabdesk_quotes::{
    AddLine, AddService, CancelDevis, CreateDevis, Devis, DevisCommand, DevisFilter, DevisStatus,
    RemoveLine, RemoveService, UpdateNotes, ValidateDevis,
};

use super::{BackOffice, ServiceResult, next_reference, not_found, now};
use crate::store::StoreTx;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDevis {
    pub client_id: ClientId,
    pub notes: Option<String>,
}

/// A line to add to a quote: the calculator input plus a free-text label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLine {
    #[serde(flatten)]
    pub input: LineInput,
    pub description: Option<String>,
}

/// List criteria accepted from callers. Ownership filtering is added by the
/// service for employees.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DevisQuery {
    pub client_id: Option<ClientId>,
    pub status: Option<DevisStatus>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

/// Load a quote the actor may touch.
async fn load_owned(tx: &mut dyn StoreTx, actor: &Actor, id: DevisId) -> ServiceResult<Devis> {
    let devis = tx.devis(id).await?.ok_or_else(|| not_found("devis"))?;
    require_owner_or_admin(actor, devis.created_by())?;
    Ok(devis)
}

/// Price tables needed for one line, read inside the caller's transaction.
async fn price_snapshot(tx: &mut dyn StoreTx, input: &LineInput) -> ServiceResult<PriceSnapshot> {
    let mut snapshot = PriceSnapshot::new();
    if let Some(pricing) = tx.machine_pricing(input.machine_type).await? {
        snapshot = snapshot.with_machine(pricing);
    }
    if let Some(material_id) = input.material_id {
        if let Some(material) = tx.material(material_id).await? {
            snapshot = snapshot.with_material(material);
        }
    }
    Ok(snapshot)
}

impl BackOffice {
    #[instrument(skip(self, actor, new), fields(user_id = %actor.user_id, client_id = %new.client_id), err)]
    pub async fn create_devis(&self, actor: &Actor, new: NewDevis) -> ServiceResult<Devis> {
        let mut tx = self.begin().await?;
        let client = tx
            .client(new.client_id)
            .await?
            .ok_or_else(|| not_found("client"))?;

        let at = now();
        let reference = next_reference(tx.as_mut(), ReferenceKind::Devis, at).await?;
        let id = DevisId::new();
        let mut devis = Devis::empty(id);
        devis.execute(&DevisCommand::CreateDevis(CreateDevis {
            devis_id: id,
            reference,
            client_id: client.id,
            created_by: actor.user_id,
            notes: new.notes,
            occurred_at: at,
        }))?;

        tx.save_devis(&devis).await?;
        tx.commit().await?;

        info!(devis_id = %id, reference = devis.reference(), "devis created");
        self.notify(
            Notification::new(
                NotificationKind::DevisCreated,
                "New devis",
                format!("{} created for {}", devis.reference(), client.name),
            )
            .about("devis", id)
            .by(actor.user_id),
        );
        Ok(devis)
    }

    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn get_devis(&self, actor: &Actor, id: DevisId) -> ServiceResult<Devis> {
        let mut tx = self.begin().await?;
        load_owned(tx.as_mut(), actor, id).await
    }

    /// Newest first. Employees only see the quotes they created.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn list_devis(&self, actor: &Actor, query: DevisQuery) -> ServiceResult<Vec<Devis>> {
        let filter = DevisFilter {
            client_id: query.client_id,
            status: query.status,
            created_by: (!actor.is_admin()).then_some(actor.user_id),
            date_from: query.date_from,
            date_to: query.date_to,
        };
        let mut tx = self.begin().await?;
        Ok(tx.list_devis(&filter).await?)
    }

    /// Price a line and append it to a draft quote.
    ///
    /// Checks run in order: existence, ownership, draft status, machine
    /// permission, then pricing.
    #[instrument(skip(self, actor, line), fields(user_id = %actor.user_id, machine_type = %line.input.machine_type), err)]
    pub async fn add_line(&self, actor: &Actor, id: DevisId, line: NewLine) -> ServiceResult<Devis> {
        let mut tx = self.begin().await?;
        let mut devis = load_owned(tx.as_mut(), actor, id).await?;
        devis.ensure_modifiable()?;
        if let Err(e) = require_machine(actor, line.input.machine_type) {
            warn!(devis_id = %id, error = %e, "machine not allowed");
            return Err(e.into());
        }

        let snapshot = price_snapshot(tx.as_mut(), &line.input).await?;
        let priced = calculate_line(&line.input, &snapshot)?;

        devis.execute(&DevisCommand::AddLine(AddLine {
            line_id: DevisLineId::new(),
            description: line.description,
            priced,
            occurred_at: now(),
        }))?;
        tx.save_devis(&devis).await?;
        tx.commit().await?;

        info!(devis_id = %id, total = %devis.total_amount(), "devis line added");
        Ok(devis)
    }

    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn remove_line(&self, actor: &Actor, id: DevisId, line_id: DevisLineId) -> ServiceResult<Devis> {
        self.mutate_devis(actor, id, DevisCommand::RemoveLine(RemoveLine {
            line_id,
            occurred_at: now(),
        }))
        .await
    }

    /// Attach an active fixed service, snapshotting its name and price.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn add_service(&self, actor: &Actor, id: DevisId, service_id: FixedServiceId) -> ServiceResult<Devis> {
        let mut tx = self.begin().await?;
        let mut devis = load_owned(tx.as_mut(), actor, id).await?;
        devis.ensure_modifiable()?;

        let service = tx
            .fixed_service(service_id)
            .await?
            .filter(|s| s.active)
            .ok_or_else(|| not_found("fixed service"))?;

        devis.execute(&DevisCommand::AddService(AddService {
            entry_id: DevisServiceId::new(),
            service_id: service.id,
            name: service.name,
            price: service.price,
            occurred_at: now(),
        }))?;
        tx.save_devis(&devis).await?;
        tx.commit().await?;

        info!(devis_id = %id, total = %devis.total_amount(), "devis service added");
        Ok(devis)
    }

    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn remove_service(&self, actor: &Actor, id: DevisId, entry_id: DevisServiceId) -> ServiceResult<Devis> {
        self.mutate_devis(actor, id, DevisCommand::RemoveService(RemoveService {
            entry_id,
            occurred_at: now(),
        }))
        .await
    }

    #[instrument(skip(self, actor, notes), fields(user_id = %actor.user_id), err)]
    pub async fn update_devis_notes(&self, actor: &Actor, id: DevisId, notes: Option<String>) -> ServiceResult<Devis> {
        self.mutate_devis(actor, id, DevisCommand::UpdateNotes(UpdateNotes {
            notes,
            occurred_at: now(),
        }))
        .await
    }

    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn validate_devis(&self, actor: &Actor, id: DevisId) -> ServiceResult<Devis> {
        require_admin(actor)?;
        let devis = self
            .mutate_devis(actor, id, DevisCommand::ValidateDevis(ValidateDevis { occurred_at: now() }))
            .await?;

        info!(devis_id = %id, reference = devis.reference(), "devis validated");
        self.notify(
            Notification::new(
                NotificationKind::DevisValidated,
                "Devis validated",
                format!("{} validated, total {}", devis.reference(), format_amount(devis.total_amount())),
            )
            .about("devis", id)
            .by(actor.user_id),
        );
        Ok(devis)
    }

    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn cancel_devis(&self, actor: &Actor, id: DevisId) -> ServiceResult<Devis> {
        require_admin(actor)?;
        let devis = self
            .mutate_devis(actor, id, DevisCommand::CancelDevis(CancelDevis { occurred_at: now() }))
            .await?;

        info!(devis_id = %id, reference = devis.reference(), "devis cancelled");
        self.notify(
            Notification::new(
                NotificationKind::DevisCancelled,
                "Devis cancelled",
                format!("{} cancelled", devis.reference()),
            )
            .about("devis", id)
            .by(actor.user_id),
        );
        Ok(devis)
    }

    /// Drafts and cancelled quotes only; lines and services go with them.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn delete_devis(&self, actor: &Actor, id: DevisId) -> ServiceResult<()> {
        let mut tx = self.begin().await?;
        let devis = load_owned(tx.as_mut(), actor, id).await?;
        devis.ensure_deletable()?;
        tx.delete_devis(id).await?;
        tx.commit().await?;

        info!(devis_id = %id, reference = devis.reference(), "devis deleted");
        Ok(())
    }

    /// Preview a line price without touching any quote.
    #[instrument(skip(self, actor, input), fields(user_id = %actor.user_id, machine_type = %input.machine_type), err)]
    pub async fn calculate(&self, actor: &Actor, input: &LineInput) -> ServiceResult<PricedLine> {
        let mut tx = self.begin().await?;
        let snapshot = price_snapshot(tx.as_mut(), input).await?;
        Ok(calculate_line(input, &snapshot)?)
    }

    async fn mutate_devis(&self, actor: &Actor, id: DevisId, command: DevisCommand) -> ServiceResult<Devis> {
        let mut tx = self.begin().await?;
        let mut devis = load_owned(tx.as_mut(), actor, id).await?;
        devis.execute(&command)?;
        tx.save_devis(&devis).await?;
        tx.commit().await?;
        Ok(devis)
    }
}
