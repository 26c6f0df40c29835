use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fabdesk_core::machine::Measure;
use fabdesk_core::money;
use fabdesk_core::{
    Aggregate, AggregateRoot, ClientId, DevisId, DevisLineId, DevisServiceId, DomainError,
    FixedServiceId, InvoiceId, MachineType, MaterialId, UserId, round2,
};
use fabdesk_events::Event;
use fabdesk_pricing::PricedLine;

/// Quote status lifecycle.
///
/// `Draft → Validated → Invoiced`, with `Cancelled` reachable from `Draft` and
/// `Validated`. Deleting an invoice moves its quotes back to `Validated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DevisStatus {
    Draft,
    Validated,
    Invoiced,
    Cancelled,
}

impl DevisStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DevisStatus::Draft => "DRAFT",
            DevisStatus::Validated => "VALIDATED",
            DevisStatus::Invoiced => "INVOICED",
            DevisStatus::Cancelled => "CANCELLED",
        }
    }
}

impl core::fmt::Display for DevisStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for DevisStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(DevisStatus::Draft),
            "VALIDATED" => Ok(DevisStatus::Validated),
            "INVOICED" => Ok(DevisStatus::Invoiced),
            "CANCELLED" => Ok(DevisStatus::Cancelled),
            _ => Err(DomainError::validation(format!("unknown devis status: {s}"))),
        }
    }
}

/// Priced unit of machine work. Prices are snapshots taken when the line was
/// added and never recomputed.
///
/// Only the measure the machine bills by is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevisLine {
    pub id: DevisLineId,
    pub machine_type: MachineType,
    pub description: Option<String>,
    pub minutes: Option<Decimal>,
    pub meters: Option<Decimal>,
    pub quantity: Option<Decimal>,
    pub material_id: Option<MaterialId>,
    pub unit_price: Decimal,
    pub material_cost: Decimal,
    pub line_total: Decimal,
    pub created_at: DateTime<Utc>,
}

impl DevisLine {
    pub fn from_priced(
        id: DevisLineId,
        description: Option<String>,
        priced: &PricedLine,
        created_at: DateTime<Utc>,
    ) -> Self {
        let measure = |m: Measure| (priced.machine_type.measure() == m).then_some(priced.measure);
        Self {
            id,
            machine_type: priced.machine_type,
            description,
            minutes: measure(Measure::Minutes),
            meters: measure(Measure::Meters),
            quantity: measure(Measure::Quantity),
            material_id: priced.material_id,
            unit_price: priced.unit_price,
            material_cost: priced.material_cost,
            line_total: priced.line_total,
            created_at,
        }
    }
}

/// A fixed service attached to a quote, with name and price snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevisService {
    pub id: DevisServiceId,
    pub service_id: FixedServiceId,
    pub name: String,
    pub price: Decimal,
}

/// Aggregate root: Devis (price quote).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Devis {
    id: DevisId,
    reference: String,
    client_id: ClientId,
    created_by: UserId,
    status: DevisStatus,
    notes: Option<String>,
    total_amount: Decimal,
    lines: Vec<DevisLine>,
    services: Vec<DevisService>,
    invoice_id: Option<InvoiceId>,
    created_at: DateTime<Utc>,
    validated_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
    version: u64,
    created: bool,
}

/// Flat, serializable form of a [`Devis`] used to persist and restore state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevisRecord {
    pub id: DevisId,
    pub reference: String,
    pub client_id: ClientId,
    pub created_by: UserId,
    pub status: DevisStatus,
    pub notes: Option<String>,
    pub total_amount: Decimal,
    pub lines: Vec<DevisLine>,
    pub services: Vec<DevisService>,
    pub invoice_id: Option<InvoiceId>,
    pub created_at: DateTime<Utc>,
    pub validated_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl Devis {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: DevisId) -> Self {
        let epoch = DateTime::<Utc>::default();
        Self {
            id,
            reference: String::new(),
            client_id: ClientId::default(),
            created_by: UserId::default(),
            status: DevisStatus::Draft,
            notes: None,
            total_amount: Decimal::ZERO,
            lines: Vec::new(),
            services: Vec::new(),
            invoice_id: None,
            created_at: epoch,
            validated_at: None,
            updated_at: epoch,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> DevisId {
        self.id
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn created_by(&self) -> UserId {
        self.created_by
    }

    pub fn status(&self) -> DevisStatus {
        self.status
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn total_amount(&self) -> Decimal {
        self.total_amount
    }

    pub fn lines(&self) -> &[DevisLine] {
        &self.lines
    }

    pub fn services(&self) -> &[DevisService] {
        &self.services
    }

    pub fn invoice_id(&self) -> Option<InvoiceId> {
        self.invoice_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn validated_at(&self) -> Option<DateTime<Utc>> {
        self.validated_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_modifiable(&self) -> bool {
        self.status == DevisStatus::Draft
    }

    pub fn is_invoice_allowed(&self) -> bool {
        self.status == DevisStatus::Validated && self.invoice_id.is_none()
    }

    /// Not yet billed and still alive: counts towards a client's pending total.
    pub fn is_pending(&self) -> bool {
        matches!(self.status, DevisStatus::Draft | DevisStatus::Validated) && self.invoice_id.is_none()
    }

    /// `round2(Σ line totals + Σ service prices)` over the current composition.
    pub fn recompute_total(&self) -> Decimal {
        compute_total(&self.lines, &self.services)
    }

    /// Guard for edits: only drafts can change composition or notes.
    pub fn ensure_modifiable(&self) -> Result<(), DomainError> {
        if !self.is_modifiable() {
            return Err(DomainError::conflict(format!(
                "cannot modify a {} devis, only drafts can change",
                self.status
            )));
        }
        Ok(())
    }

    /// Quotes can be removed while they are drafts or after cancellation.
    pub fn ensure_deletable(&self) -> Result<(), DomainError> {
        match self.status {
            DevisStatus::Draft | DevisStatus::Cancelled => Ok(()),
            status => Err(DomainError::conflict(format!("cannot delete a {status} devis"))),
        }
    }

    pub fn to_record(&self) -> DevisRecord {
        DevisRecord {
            id: self.id,
            reference: self.reference.clone(),
            client_id: self.client_id,
            created_by: self.created_by,
            status: self.status,
            notes: self.notes.clone(),
            total_amount: self.total_amount,
            lines: self.lines.clone(),
            services: self.services.clone(),
            invoice_id: self.invoice_id,
            created_at: self.created_at,
            validated_at: self.validated_at,
            updated_at: self.updated_at,
            version: self.version,
        }
    }
}

impl From<DevisRecord> for Devis {
    fn from(r: DevisRecord) -> Self {
        Self {
            id: r.id,
            reference: r.reference,
            client_id: r.client_id,
            created_by: r.created_by,
            status: r.status,
            notes: r.notes,
            total_amount: r.total_amount,
            lines: r.lines,
            services: r.services,
            invoice_id: r.invoice_id,
            created_at: r.created_at,
            validated_at: r.validated_at,
            updated_at: r.updated_at,
            version: r.version,
            created: true,
        }
    }
}

fn compute_total(lines: &[DevisLine], services: &[DevisService]) -> Decimal {
    round2(money::sum(
        lines
            .iter()
            .map(|l| l.line_total)
            .chain(services.iter().map(|s| s.price)),
    ))
}

impl AggregateRoot for Devis {
    type Id = DevisId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Criteria for listing quotes. Every set field must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DevisFilter {
    pub client_id: Option<ClientId>,
    pub status: Option<DevisStatus>,
    pub created_by: Option<UserId>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

impl DevisFilter {
    pub fn matches(&self, devis: &Devis) -> bool {
        self.client_id.is_none_or(|c| devis.client_id == c)
            && self.status.is_none_or(|s| devis.status == s)
            && self.created_by.is_none_or(|u| devis.created_by == u)
            && self.date_from.is_none_or(|from| devis.created_at >= from)
            && self.date_to.is_none_or(|to| devis.created_at <= to)
    }
}

/// Command: CreateDevis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDevis {
    pub devis_id: DevisId,
    pub reference: String,
    pub client_id: ClientId,
    pub created_by: UserId,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddLine. Carries an already priced line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLine {
    pub line_id: DevisLineId,
    pub description: Option<String>,
    pub priced: PricedLine,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLine {
    pub line_id: DevisLineId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddService. Name and price are snapshots of the catalog row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddService {
    pub entry_id: DevisServiceId,
    pub service_id: FixedServiceId,
    pub name: String,
    pub price: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveService.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveService {
    pub entry_id: DevisServiceId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateNotes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateNotes {
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ValidateDevis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateDevis {
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelDevis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelDevis {
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkInvoiced. Issued by invoice consolidation only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkInvoiced {
    pub invoice_id: InvoiceId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RevertToValidated. Issued when the linked invoice is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevertToValidated {
    pub invoice_id: InvoiceId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DevisCommand {
    CreateDevis(CreateDevis),
    AddLine(AddLine),
    RemoveLine(RemoveLine),
    AddService(AddService),
    RemoveService(RemoveService),
    UpdateNotes(UpdateNotes),
    ValidateDevis(ValidateDevis),
    CancelDevis(CancelDevis),
    MarkInvoiced(MarkInvoiced),
    RevertToValidated(RevertToValidated),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DevisEvent {
    DevisCreated {
        devis_id: DevisId,
        reference: String,
        client_id: ClientId,
        created_by: UserId,
        notes: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    LineAdded {
        devis_id: DevisId,
        line: DevisLine,
        total_amount: Decimal,
        occurred_at: DateTime<Utc>,
    },
    LineRemoved {
        devis_id: DevisId,
        line_id: DevisLineId,
        total_amount: Decimal,
        occurred_at: DateTime<Utc>,
    },
    ServiceAdded {
        devis_id: DevisId,
        service: DevisService,
        total_amount: Decimal,
        occurred_at: DateTime<Utc>,
    },
    ServiceRemoved {
        devis_id: DevisId,
        entry_id: DevisServiceId,
        total_amount: Decimal,
        occurred_at: DateTime<Utc>,
    },
    NotesUpdated {
        devis_id: DevisId,
        notes: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    DevisValidated {
        devis_id: DevisId,
        occurred_at: DateTime<Utc>,
    },
    DevisCancelled {
        devis_id: DevisId,
        occurred_at: DateTime<Utc>,
    },
    DevisInvoiced {
        devis_id: DevisId,
        invoice_id: InvoiceId,
        occurred_at: DateTime<Utc>,
    },
    InvoiceReverted {
        devis_id: DevisId,
        invoice_id: InvoiceId,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for DevisEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DevisEvent::DevisCreated { .. } => "quotes.devis.created",
            DevisEvent::LineAdded { .. } => "quotes.devis.line_added",
            DevisEvent::LineRemoved { .. } => "quotes.devis.line_removed",
            DevisEvent::ServiceAdded { .. } => "quotes.devis.service_added",
            DevisEvent::ServiceRemoved { .. } => "quotes.devis.service_removed",
            DevisEvent::NotesUpdated { .. } => "quotes.devis.notes_updated",
            DevisEvent::DevisValidated { .. } => "quotes.devis.validated",
            DevisEvent::DevisCancelled { .. } => "quotes.devis.cancelled",
            DevisEvent::DevisInvoiced { .. } => "quotes.devis.invoiced",
            DevisEvent::InvoiceReverted { .. } => "quotes.devis.invoice_reverted",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DevisEvent::DevisCreated { occurred_at, .. }
            | DevisEvent::LineAdded { occurred_at, .. }
            | DevisEvent::LineRemoved { occurred_at, .. }
            | DevisEvent::ServiceAdded { occurred_at, .. }
            | DevisEvent::ServiceRemoved { occurred_at, .. }
            | DevisEvent::NotesUpdated { occurred_at, .. }
            | DevisEvent::DevisValidated { occurred_at, .. }
            | DevisEvent::DevisCancelled { occurred_at, .. }
            | DevisEvent::DevisInvoiced { occurred_at, .. }
            | DevisEvent::InvoiceReverted { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for Devis {
    type Command = DevisCommand;
    type Event = DevisEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            DevisEvent::DevisCreated {
                devis_id,
                reference,
                client_id,
                created_by,
                notes,
                occurred_at,
            } => {
                self.id = *devis_id;
                self.reference = reference.clone();
                self.client_id = *client_id;
                self.created_by = *created_by;
                self.notes = notes.clone();
                self.status = DevisStatus::Draft;
                self.total_amount = Decimal::ZERO;
                self.created_at = *occurred_at;
                self.created = true;
            }
            DevisEvent::LineAdded { line, total_amount, .. } => {
                self.lines.push(line.clone());
                self.total_amount = *total_amount;
            }
            DevisEvent::LineRemoved { line_id, total_amount, .. } => {
                self.lines.retain(|l| l.id != *line_id);
                self.total_amount = *total_amount;
            }
            DevisEvent::ServiceAdded { service, total_amount, .. } => {
                self.services.push(service.clone());
                self.total_amount = *total_amount;
            }
            DevisEvent::ServiceRemoved { entry_id, total_amount, .. } => {
                self.services.retain(|s| s.id != *entry_id);
                self.total_amount = *total_amount;
            }
            DevisEvent::NotesUpdated { notes, .. } => {
                self.notes = notes.clone();
            }
            DevisEvent::DevisValidated { occurred_at, .. } => {
                self.status = DevisStatus::Validated;
                self.validated_at = Some(*occurred_at);
            }
            DevisEvent::DevisCancelled { .. } => {
                self.status = DevisStatus::Cancelled;
            }
            DevisEvent::DevisInvoiced { invoice_id, .. } => {
                self.status = DevisStatus::Invoiced;
                self.invoice_id = Some(*invoice_id);
            }
            DevisEvent::InvoiceReverted { .. } => {
                self.status = DevisStatus::Validated;
                self.invoice_id = None;
            }
        }

        self.updated_at = event.occurred_at();
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            DevisCommand::CreateDevis(cmd) => self.handle_create(cmd),
            DevisCommand::AddLine(cmd) => self.handle_add_line(cmd),
            DevisCommand::RemoveLine(cmd) => self.handle_remove_line(cmd),
            DevisCommand::AddService(cmd) => self.handle_add_service(cmd),
            DevisCommand::RemoveService(cmd) => self.handle_remove_service(cmd),
            DevisCommand::UpdateNotes(cmd) => self.handle_update_notes(cmd),
            DevisCommand::ValidateDevis(cmd) => self.handle_validate(cmd),
            DevisCommand::CancelDevis(cmd) => self.handle_cancel(cmd),
            DevisCommand::MarkInvoiced(cmd) => self.handle_mark_invoiced(cmd),
            DevisCommand::RevertToValidated(cmd) => self.handle_revert(cmd),
        }
    }
}

impl Devis {
    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("devis"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateDevis) -> Result<Vec<DevisEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("devis already exists"));
        }
        if cmd.reference.trim().is_empty() {
            return Err(DomainError::validation("reference cannot be empty"));
        }

        Ok(vec![DevisEvent::DevisCreated {
            devis_id: cmd.devis_id,
            reference: cmd.reference.clone(),
            client_id: cmd.client_id,
            created_by: cmd.created_by,
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_add_line(&self, cmd: &AddLine) -> Result<Vec<DevisEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_modifiable()?;

        if cmd.priced.line_total < Decimal::ZERO {
            return Err(DomainError::validation("line_total cannot be negative"));
        }

        let line = DevisLine::from_priced(cmd.line_id, cmd.description.clone(), &cmd.priced, cmd.occurred_at);
        let mut lines = self.lines.clone();
        lines.push(line.clone());

        Ok(vec![DevisEvent::LineAdded {
            devis_id: self.id,
            line,
            total_amount: compute_total(&lines, &self.services),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_remove_line(&self, cmd: &RemoveLine) -> Result<Vec<DevisEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_modifiable()?;

        if !self.lines.iter().any(|l| l.id == cmd.line_id) {
            return Err(DomainError::not_found("devis line"));
        }
        let lines: Vec<DevisLine> = self.lines.iter().filter(|l| l.id != cmd.line_id).cloned().collect();

        Ok(vec![DevisEvent::LineRemoved {
            devis_id: self.id,
            line_id: cmd.line_id,
            total_amount: compute_total(&lines, &self.services),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_add_service(&self, cmd: &AddService) -> Result<Vec<DevisEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_modifiable()?;

        if self.services.iter().any(|s| s.service_id == cmd.service_id) {
            return Err(DomainError::validation("service already added to this devis"));
        }
        if cmd.price < Decimal::ZERO {
            return Err(DomainError::validation("service price cannot be negative"));
        }

        let service = DevisService {
            id: cmd.entry_id,
            service_id: cmd.service_id,
            name: cmd.name.clone(),
            price: cmd.price,
        };
        let mut services = self.services.clone();
        services.push(service.clone());

        Ok(vec![DevisEvent::ServiceAdded {
            devis_id: self.id,
            service,
            total_amount: compute_total(&self.lines, &services),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_remove_service(&self, cmd: &RemoveService) -> Result<Vec<DevisEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_modifiable()?;

        if !self.services.iter().any(|s| s.id == cmd.entry_id) {
            return Err(DomainError::not_found("devis service"));
        }
        let services: Vec<DevisService> = self
            .services
            .iter()
            .filter(|s| s.id != cmd.entry_id)
            .cloned()
            .collect();

        Ok(vec![DevisEvent::ServiceRemoved {
            devis_id: self.id,
            entry_id: cmd.entry_id,
            total_amount: compute_total(&self.lines, &services),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_update_notes(&self, cmd: &UpdateNotes) -> Result<Vec<DevisEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_modifiable()?;

        Ok(vec![DevisEvent::NotesUpdated {
            devis_id: self.id,
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_validate(&self, cmd: &ValidateDevis) -> Result<Vec<DevisEvent>, DomainError> {
        self.ensure_created()?;

        if self.status != DevisStatus::Draft {
            return Err(DomainError::conflict(format!(
                "only draft devis can be validated (current status: {})",
                self.status
            )));
        }
        if self.lines.is_empty() {
            return Err(DomainError::validation("cannot validate an empty devis"));
        }

        Ok(vec![DevisEvent::DevisValidated {
            devis_id: self.id,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_cancel(&self, cmd: &CancelDevis) -> Result<Vec<DevisEvent>, DomainError> {
        self.ensure_created()?;

        match self.status {
            DevisStatus::Invoiced => {
                return Err(DomainError::conflict("cannot cancel an invoiced devis"));
            }
            DevisStatus::Cancelled => {
                return Err(DomainError::conflict("devis is already cancelled"));
            }
            DevisStatus::Draft | DevisStatus::Validated => {}
        }

        Ok(vec![DevisEvent::DevisCancelled {
            devis_id: self.id,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_mark_invoiced(&self, cmd: &MarkInvoiced) -> Result<Vec<DevisEvent>, DomainError> {
        self.ensure_created()?;

        if !self.is_invoice_allowed() {
            return Err(DomainError::conflict(format!(
                "devis {} cannot be invoiced (status: {})",
                self.reference, self.status
            )));
        }

        Ok(vec![DevisEvent::DevisInvoiced {
            devis_id: self.id,
            invoice_id: cmd.invoice_id,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_revert(&self, cmd: &RevertToValidated) -> Result<Vec<DevisEvent>, DomainError> {
        self.ensure_created()?;

        if self.status != DevisStatus::Invoiced || self.invoice_id != Some(cmd.invoice_id) {
            return Err(DomainError::conflict(format!(
                "devis {} is not invoiced by this invoice",
                self.reference
            )));
        }

        Ok(vec![DevisEvent::InvoiceReverted {
            devis_id: self.id,
            invoice_id: cmd.invoice_id,
            occurred_at: cmd.occurred_at,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn priced(machine_type: MachineType, measure: Decimal, line_total: Decimal) -> PricedLine {
        PricedLine {
            machine_type,
            measure,
            unit_price: dec!(1.5),
            material_id: None,
            material_cost: Decimal::ZERO,
            line_total,
            breakdown: String::new(),
        }
    }

    fn draft() -> Devis {
        let id = DevisId::new();
        let mut devis = Devis::empty(id);
        devis
            .execute(&DevisCommand::CreateDevis(CreateDevis {
                devis_id: id,
                reference: "DEV-2026-0001".into(),
                client_id: ClientId::new(),
                created_by: UserId::new(),
                notes: None,
                occurred_at: test_time(),
            }))
            .unwrap();
        devis
    }

    fn add_line(devis: &mut Devis, total: Decimal) -> DevisLineId {
        let line_id = DevisLineId::new();
        devis
            .execute(&DevisCommand::AddLine(AddLine {
                line_id,
                description: None,
                priced: priced(MachineType::Cnc, dec!(10), total),
                occurred_at: test_time(),
            }))
            .unwrap();
        line_id
    }

    fn add_service(devis: &mut Devis, service_id: FixedServiceId, price: Decimal) -> Result<DevisServiceId, DomainError> {
        let entry_id = DevisServiceId::new();
        devis.execute(&DevisCommand::AddService(AddService {
            entry_id,
            service_id,
            name: "Montage".into(),
            price,
            occurred_at: test_time(),
        }))?;
        Ok(entry_id)
    }

    fn validate(devis: &mut Devis) -> Result<Vec<DevisEvent>, DomainError> {
        devis.execute(&DevisCommand::ValidateDevis(ValidateDevis { occurred_at: test_time() }))
    }

    fn cancel(devis: &mut Devis) -> Result<Vec<DevisEvent>, DomainError> {
        devis.execute(&DevisCommand::CancelDevis(CancelDevis { occurred_at: test_time() }))
    }

    fn invoice(devis: &mut Devis, invoice_id: InvoiceId) -> Result<Vec<DevisEvent>, DomainError> {
        devis.execute(&DevisCommand::MarkInvoiced(MarkInvoiced {
            invoice_id,
            occurred_at: test_time(),
        }))
    }

    #[test]
    fn fresh_devis_is_an_empty_draft() {
        let devis = draft();
        assert_eq!(devis.status(), DevisStatus::Draft);
        assert_eq!(devis.total_amount(), Decimal::ZERO);
        assert!(devis.validated_at().is_none());
        assert_eq!(devis.version(), 1);
    }

    #[test]
    fn commands_on_missing_devis_are_not_found() {
        let devis = Devis::empty(DevisId::new());
        let err = devis
            .handle(&DevisCommand::ValidateDevis(ValidateDevis { occurred_at: test_time() }))
            .unwrap_err();
        assert_eq!(err, DomainError::not_found("devis"));
    }

    #[test]
    fn total_follows_lines_and_services() {
        let mut devis = draft();
        let l1 = add_line(&mut devis, dec!(45.00));
        add_line(&mut devis, dec!(12.50));
        let s = add_service(&mut devis, FixedServiceId::new(), dec!(40)).unwrap();
        assert_eq!(devis.total_amount(), dec!(97.50));

        devis
            .execute(&DevisCommand::RemoveLine(RemoveLine { line_id: l1, occurred_at: test_time() }))
            .unwrap();
        assert_eq!(devis.total_amount(), dec!(52.50));

        devis
            .execute(&DevisCommand::RemoveService(RemoveService { entry_id: s, occurred_at: test_time() }))
            .unwrap();
        assert_eq!(devis.total_amount(), dec!(12.50));
        assert_eq!(devis.recompute_total(), devis.total_amount());
    }

    #[test]
    fn line_keeps_only_the_billed_measure() {
        let mut devis = draft();
        devis
            .execute(&DevisCommand::AddLine(AddLine {
                line_id: DevisLineId::new(),
                description: Some("chant".into()),
                priced: priced(MachineType::Champs, dec!(2.5), dec!(12.50)),
                occurred_at: test_time(),
            }))
            .unwrap();

        let line = &devis.lines()[0];
        assert_eq!(line.meters, Some(dec!(2.5)));
        assert_eq!(line.minutes, None);
        assert_eq!(line.quantity, None);
    }

    #[test]
    fn same_service_cannot_be_attached_twice() {
        let mut devis = draft();
        let service_id = FixedServiceId::new();
        add_service(&mut devis, service_id, dec!(40)).unwrap();
        let err = add_service(&mut devis, service_id, dec!(40)).unwrap_err();
        assert_eq!(err, DomainError::validation("service already added to this devis"));
        assert_eq!(devis.services().len(), 1);
    }

    #[test]
    fn removing_unknown_line_is_not_found() {
        let mut devis = draft();
        let err = devis
            .execute(&DevisCommand::RemoveLine(RemoveLine {
                line_id: DevisLineId::new(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::not_found("devis line"));
    }

    #[test]
    fn empty_devis_cannot_be_validated() {
        let mut devis = draft();
        let err = validate(&mut devis).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(devis.status(), DevisStatus::Draft);
    }

    #[test]
    fn validation_sets_validated_at_and_freezes_composition() {
        let mut devis = draft();
        add_line(&mut devis, dec!(10));
        validate(&mut devis).unwrap();

        assert_eq!(devis.status(), DevisStatus::Validated);
        assert!(devis.validated_at().is_some());

        let err = devis
            .handle(&DevisCommand::AddLine(AddLine {
                line_id: DevisLineId::new(),
                description: None,
                priced: priced(MachineType::Cnc, dec!(1), dec!(1.5)),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::StateConflict(_)));

        let err = devis
            .handle(&DevisCommand::UpdateNotes(UpdateNotes {
                notes: Some("late".into()),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::StateConflict(_)));

        assert!(matches!(validate(&mut devis), Err(DomainError::StateConflict(_))));
    }

    #[test]
    fn cancel_is_allowed_from_draft_and_validated_only() {
        let mut d1 = draft();
        cancel(&mut d1).unwrap();
        assert_eq!(d1.status(), DevisStatus::Cancelled);
        assert!(matches!(cancel(&mut d1), Err(DomainError::StateConflict(_))));

        let mut d2 = draft();
        add_line(&mut d2, dec!(10));
        validate(&mut d2).unwrap();
        cancel(&mut d2).unwrap();
        assert_eq!(d2.status(), DevisStatus::Cancelled);
    }

    #[test]
    fn invoiced_devis_cannot_be_cancelled() {
        let mut devis = draft();
        add_line(&mut devis, dec!(10));
        validate(&mut devis).unwrap();
        invoice(&mut devis, InvoiceId::new()).unwrap();

        let err = cancel(&mut devis).unwrap_err();
        assert_eq!(err, DomainError::conflict("cannot cancel an invoiced devis"));
        assert_eq!(devis.status(), DevisStatus::Invoiced);
    }

    #[test]
    fn only_validated_devis_can_be_invoiced() {
        let mut devis = draft();
        add_line(&mut devis, dec!(10));
        assert!(matches!(invoice(&mut devis, InvoiceId::new()), Err(DomainError::StateConflict(_))));

        validate(&mut devis).unwrap();
        let invoice_id = InvoiceId::new();
        invoice(&mut devis, invoice_id).unwrap();
        assert_eq!(devis.invoice_id(), Some(invoice_id));
        assert!(matches!(invoice(&mut devis, InvoiceId::new()), Err(DomainError::StateConflict(_))));
    }

    #[test]
    fn reverting_requires_the_linked_invoice() {
        let mut devis = draft();
        add_line(&mut devis, dec!(10));
        validate(&mut devis).unwrap();
        let invoice_id = InvoiceId::new();
        invoice(&mut devis, invoice_id).unwrap();

        let wrong = devis.handle(&DevisCommand::RevertToValidated(RevertToValidated {
            invoice_id: InvoiceId::new(),
            occurred_at: test_time(),
        }));
        assert!(matches!(wrong, Err(DomainError::StateConflict(_))));

        devis
            .execute(&DevisCommand::RevertToValidated(RevertToValidated {
                invoice_id,
                occurred_at: test_time(),
            }))
            .unwrap();
        assert_eq!(devis.status(), DevisStatus::Validated);
        assert_eq!(devis.invoice_id(), None);
    }

    #[test]
    fn deletion_is_limited_to_drafts_and_cancelled() {
        let mut devis = draft();
        assert!(devis.ensure_deletable().is_ok());
        add_line(&mut devis, dec!(10));
        validate(&mut devis).unwrap();
        assert!(matches!(devis.ensure_deletable(), Err(DomainError::StateConflict(_))));
        cancel(&mut devis).unwrap();
        assert!(devis.ensure_deletable().is_ok());
    }

    #[test]
    fn record_round_trip_preserves_state() {
        let mut devis = draft();
        add_line(&mut devis, dec!(10));
        let restored = Devis::from(devis.to_record());
        assert_eq!(restored, devis);
    }

    #[test]
    fn filter_matches_every_set_criterion() {
        let devis = draft();
        let mut filter = DevisFilter {
            client_id: Some(devis.client_id()),
            status: Some(DevisStatus::Draft),
            ..Default::default()
        };
        assert!(filter.matches(&devis));

        filter.created_by = Some(UserId::new());
        assert!(!filter.matches(&devis));

        let later = DevisFilter {
            date_from: Some(devis.created_at() + chrono::Duration::seconds(1)),
            ..Default::default()
        };
        assert!(!later.matches(&devis));
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let devis = draft();
        let before = devis.clone();
        let _ = devis.handle(&DevisCommand::AddLine(AddLine {
            line_id: DevisLineId::new(),
            description: None,
            priced: priced(MachineType::Cnc, dec!(1), dec!(1.5)),
            occurred_at: test_time(),
        }));
        assert_eq!(devis, before);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            AddLine(i64),
            AddService(i64),
            RemoveFirstLine,
            RemoveFirstService,
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0i64..1_000_000).prop_map(Op::AddLine),
                (0i64..100_000).prop_map(Op::AddService),
                Just(Op::RemoveFirstLine),
                Just(Op::RemoveFirstService),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: the stored total always equals the rounded sum of the composition.
            #[test]
            fn total_matches_composition(ops in prop::collection::vec(op(), 0..30)) {
                let mut devis = draft();
                for op in ops {
                    match op {
                        Op::AddLine(cents) => {
                            add_line(&mut devis, Decimal::new(cents, 2));
                        }
                        Op::AddService(cents) => {
                            add_service(&mut devis, FixedServiceId::new(), Decimal::new(cents, 2)).unwrap();
                        }
                        Op::RemoveFirstLine => {
                            if let Some(id) = devis.lines().first().map(|l| l.id) {
                                devis.execute(&DevisCommand::RemoveLine(RemoveLine { line_id: id, occurred_at: test_time() })).unwrap();
                            }
                        }
                        Op::RemoveFirstService => {
                            if let Some(id) = devis.services().first().map(|s| s.id) {
                                devis.execute(&DevisCommand::RemoveService(RemoveService { entry_id: id, occurred_at: test_time() })).unwrap();
                            }
                        }
                    }

                    let expected = round2(
                        devis.lines().iter().map(|l| l.line_total).sum::<Decimal>()
                            + devis.services().iter().map(|s| s.price).sum::<Decimal>(),
                    );
                    prop_assert_eq!(devis.total_amount(), expected);
                    prop_assert_eq!(devis.recompute_total(), devis.recompute_total());
                }
            }
        }
    }
}
