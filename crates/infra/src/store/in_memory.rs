use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use fabdesk_clients::Client;
use fabdesk_core::{
    ClientId, DevisId, ExpenseId, FixedServiceId, InvoiceId, MachineType, MaterialId, PaymentId,
    ReferenceKind,
};
use fabdesk_expenses::{Expense, ExpenseFilter};
use fabdesk_invoicing::{Invoice, Payment};
use fabdesk_pricing::{FixedService, MachinePricing, Material};
use fabdesk_quotes::{Devis, DevisFilter};

use super::{Store, StoreError, StoreResult, StoreTx};

#[derive(Debug, Clone, Default)]
struct Tables {
    machine_pricing: HashMap<MachineType, MachinePricing>,
    materials: HashMap<MaterialId, Material>,
    fixed_services: HashMap<FixedServiceId, FixedService>,
    clients: HashMap<ClientId, Client>,
    devis: HashMap<DevisId, Devis>,
    invoices: HashMap<InvoiceId, Invoice>,
    payments: HashMap<PaymentId, Payment>,
    expenses: HashMap<ExpenseId, Expense>,
}

/// In-memory store.
///
/// Intended for tests/dev. One transaction at a time: `begin` waits for the
/// previous transaction to finish, which trivially serializes every
/// read-check-write sequence.
///
/// `begin` snapshots every table, read-only transactions included, so each
/// request costs time and memory proportional to the whole data set.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTx { guard, working }))
    }
}

/// Changes land in `working` and replace the shared tables on commit only.
struct InMemoryTx {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

fn newest_first<T, F>(rows: &mut [T], created_at: F)
where
    F: Fn(&T) -> chrono::DateTime<chrono::Utc>,
{
    rows.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
}

#[async_trait]
impl StoreTx for InMemoryTx {
    async fn machine_pricing(&mut self, machine_type: MachineType) -> StoreResult<Option<MachinePricing>> {
        Ok(self.working.machine_pricing.get(&machine_type).cloned())
    }

    async fn list_machine_pricing(&mut self) -> StoreResult<Vec<MachinePricing>> {
        let mut rows: Vec<MachinePricing> = self.working.machine_pricing.values().cloned().collect();
        rows.sort_by_key(|p| p.machine_type);
        Ok(rows)
    }

    async fn save_machine_pricing(&mut self, pricing: &MachinePricing) -> StoreResult<()> {
        self.working
            .machine_pricing
            .insert(pricing.machine_type, pricing.clone());
        Ok(())
    }

    async fn material(&mut self, id: MaterialId) -> StoreResult<Option<Material>> {
        Ok(self.working.materials.get(&id).cloned())
    }

    async fn list_materials(&mut self, active_only: bool) -> StoreResult<Vec<Material>> {
        let mut rows: Vec<Material> = self
            .working
            .materials
            .values()
            .filter(|m| !active_only || m.active)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn save_material(&mut self, material: &Material) -> StoreResult<()> {
        self.working.materials.insert(material.id, material.clone());
        Ok(())
    }

    async fn fixed_service(&mut self, id: FixedServiceId) -> StoreResult<Option<FixedService>> {
        Ok(self.working.fixed_services.get(&id).cloned())
    }

    async fn list_fixed_services(&mut self, active_only: bool) -> StoreResult<Vec<FixedService>> {
        let mut rows: Vec<FixedService> = self
            .working
            .fixed_services
            .values()
            .filter(|s| !active_only || s.active)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn save_fixed_service(&mut self, service: &FixedService) -> StoreResult<()> {
        self.working.fixed_services.insert(service.id, service.clone());
        Ok(())
    }

    async fn client(&mut self, id: ClientId) -> StoreResult<Option<Client>> {
        Ok(self.working.clients.get(&id).cloned())
    }

    async fn list_clients(&mut self) -> StoreResult<Vec<Client>> {
        let mut rows: Vec<Client> = self.working.clients.values().cloned().collect();
        newest_first(&mut rows, |c| c.created_at);
        Ok(rows)
    }

    async fn save_client(&mut self, client: &Client) -> StoreResult<()> {
        self.working.clients.insert(client.id, client.clone());
        Ok(())
    }

    async fn delete_client(&mut self, id: ClientId) -> StoreResult<()> {
        self.working.clients.remove(&id);
        Ok(())
    }

    async fn devis(&mut self, id: DevisId) -> StoreResult<Option<Devis>> {
        Ok(self.working.devis.get(&id).cloned())
    }

    async fn list_devis(&mut self, filter: &DevisFilter) -> StoreResult<Vec<Devis>> {
        let mut rows: Vec<Devis> = self
            .working
            .devis
            .values()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect();
        newest_first(&mut rows, |d| d.created_at());
        Ok(rows)
    }

    async fn count_devis_for_client(&mut self, client_id: ClientId) -> StoreResult<usize> {
        Ok(self
            .working
            .devis
            .values()
            .filter(|d| d.client_id() == client_id)
            .count())
    }

    async fn save_devis(&mut self, devis: &Devis) -> StoreResult<()> {
        let id = devis.id_typed();
        if self
            .working
            .devis
            .values()
            .any(|d| d.id_typed() != id && d.reference() == devis.reference())
        {
            return Err(StoreError::Conflict(format!(
                "devis reference {} already exists",
                devis.reference()
            )));
        }
        self.working.devis.insert(id, devis.clone());
        Ok(())
    }

    async fn delete_devis(&mut self, id: DevisId) -> StoreResult<()> {
        self.working.devis.remove(&id);
        Ok(())
    }

    async fn invoice(&mut self, id: InvoiceId) -> StoreResult<Option<Invoice>> {
        Ok(self.working.invoices.get(&id).cloned())
    }

    async fn list_invoices(&mut self, client_id: Option<ClientId>) -> StoreResult<Vec<Invoice>> {
        let mut rows: Vec<Invoice> = self
            .working
            .invoices
            .values()
            .filter(|i| client_id.is_none_or(|c| i.client_id == c))
            .cloned()
            .collect();
        newest_first(&mut rows, |i| i.created_at);
        Ok(rows)
    }

    async fn insert_invoice(&mut self, invoice: &Invoice) -> StoreResult<()> {
        if self.working.invoices.contains_key(&invoice.id) {
            return Err(StoreError::Conflict(format!("invoice {} already exists", invoice.id)));
        }
        if self
            .working
            .invoices
            .values()
            .any(|i| i.reference == invoice.reference)
        {
            return Err(StoreError::Conflict(format!(
                "invoice reference {} already exists",
                invoice.reference
            )));
        }
        self.working.invoices.insert(invoice.id, invoice.clone());
        Ok(())
    }

    async fn delete_invoice(&mut self, id: InvoiceId) -> StoreResult<()> {
        self.working.invoices.remove(&id);
        Ok(())
    }

    async fn payment(&mut self, id: PaymentId) -> StoreResult<Option<Payment>> {
        Ok(self.working.payments.get(&id).cloned())
    }

    async fn payments_for_invoice(&mut self, invoice_id: InvoiceId) -> StoreResult<Vec<Payment>> {
        let mut rows: Vec<Payment> = self
            .working
            .payments
            .values()
            .filter(|p| p.invoice_id == invoice_id)
            .cloned()
            .collect();
        newest_first(&mut rows, |p| p.payment_date);
        Ok(rows)
    }

    async fn save_payment(&mut self, payment: &Payment) -> StoreResult<()> {
        if !self.working.invoices.contains_key(&payment.invoice_id) {
            return Err(StoreError::Conflict(format!(
                "payment references missing invoice {}",
                payment.invoice_id
            )));
        }
        self.working.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn delete_payment(&mut self, id: PaymentId) -> StoreResult<()> {
        self.working.payments.remove(&id);
        Ok(())
    }

    async fn expense(&mut self, id: ExpenseId) -> StoreResult<Option<Expense>> {
        Ok(self.working.expenses.get(&id).cloned())
    }

    async fn list_expenses(&mut self, filter: &ExpenseFilter) -> StoreResult<Vec<Expense>> {
        let mut rows: Vec<Expense> = self
            .working
            .expenses
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        newest_first(&mut rows, |e| e.date);
        Ok(rows)
    }

    async fn save_expense(&mut self, expense: &Expense) -> StoreResult<()> {
        self.working.expenses.insert(expense.id, expense.clone());
        Ok(())
    }

    async fn delete_expense(&mut self, id: ExpenseId) -> StoreResult<()> {
        self.working.expenses.remove(&id);
        Ok(())
    }

    async fn issued_references(&mut self, kind: ReferenceKind, year: i32) -> StoreResult<Vec<String>> {
        let prefix = kind.year_prefix(year);
        let refs: Vec<String> = match kind {
            ReferenceKind::Devis => self
                .working
                .devis
                .values()
                .map(|d| d.reference().to_string())
                .filter(|r| r.starts_with(&prefix))
                .collect(),
            ReferenceKind::Invoice => self
                .working
                .invoices
                .values()
                .map(|i| i.reference.clone())
                .filter(|r| r.starts_with(&prefix))
                .collect(),
        };
        Ok(refs)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let InMemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
