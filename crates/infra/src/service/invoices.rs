use tracing::{info, instrument, warn};

use fabdesk_auth::{Actor, require_admin};
use fabdesk_core::money::format_amount;
use fabdesk_core::{Aggregate, ClientId, DevisId, InvoiceId, ReferenceKind};
use fabdesk_events::{Notification, NotificationKind};
use fabdesk_invoicing::{Invoice, NewInvoiceItem, Payment, PaymentLedger, PaymentStats, consolidate};
use fabdesk_quotes::{Devis, DevisCommand, MarkInvoiced, RevertToValidated};

use super::{BackOffice, ServiceResult, next_reference, not_found, now};
use crate::store::StoreTx;

/// An invoice with everything needed to render it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceDetails {
    pub invoice: Invoice,
    /// Consolidated quotes, in invoice order.
    pub devis: Vec<Devis>,
    /// Newest payment first.
    pub payments: Vec<Payment>,
    pub stats: PaymentStats,
}

/// List row: an invoice with its payment status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceOverview {
    pub invoice: Invoice,
    pub stats: PaymentStats,
}

pub(super) async fn load_invoice(tx: &mut dyn StoreTx, id: InvoiceId) -> ServiceResult<Invoice> {
    tx.invoice(id).await?.ok_or_else(|| not_found("invoice"))
}

impl BackOffice {
    /// Consolidate validated quotes of one client into a single invoice.
    ///
    /// All-or-nothing: either the invoice exists and every quote is INVOICED,
    /// or nothing changed.
    #[instrument(skip(self, actor, devis_ids), fields(user_id = %actor.user_id, count = devis_ids.len()), err)]
    pub async fn create_invoice_from_devis(&self, actor: &Actor, devis_ids: &[DevisId]) -> ServiceResult<Invoice> {
        require_admin(actor)?;
        let mut tx = self.begin().await?;

        let mut found = Vec::with_capacity(devis_ids.len());
        for id in devis_ids {
            if found.iter().any(|d: &Devis| d.id_typed() == *id) {
                continue;
            }
            if let Some(devis) = tx.devis(*id).await? {
                found.push(devis);
            }
        }

        let consolidation = consolidate(devis_ids, &found).inspect_err(|e| {
            warn!(error = %e, "invoice consolidation rejected");
        })?;

        let at = now();
        let reference = next_reference(tx.as_mut(), ReferenceKind::Invoice, at).await?;
        let invoice = Invoice::from_quotes(InvoiceId::new(), reference, &consolidation, at);
        tx.insert_invoice(&invoice).await?;

        for devis in found.iter_mut() {
            devis.execute(&DevisCommand::MarkInvoiced(MarkInvoiced {
                invoice_id: invoice.id,
                occurred_at: at,
            }))?;
            tx.save_devis(devis).await?;
        }
        tx.commit().await?;

        info!(
            invoice_id = %invoice.id,
            reference = %invoice.reference,
            total = %invoice.total_amount,
            "invoice created from devis"
        );
        self.notify_invoice_created(actor, &invoice);
        Ok(invoice)
    }

    /// Invoice from ad-hoc items, without any quote.
    #[instrument(skip(self, actor, items), fields(user_id = %actor.user_id, client_id = %client_id), err)]
    pub async fn create_direct_invoice(
        &self,
        actor: &Actor,
        client_id: ClientId,
        items: Vec<NewInvoiceItem>,
    ) -> ServiceResult<Invoice> {
        require_admin(actor)?;
        let mut tx = self.begin().await?;
        tx.client(client_id).await?.ok_or_else(|| not_found("client"))?;

        let at = now();
        let reference = next_reference(tx.as_mut(), ReferenceKind::Invoice, at).await?;
        let invoice = Invoice::direct(InvoiceId::new(), reference, client_id, items, at)?;
        tx.insert_invoice(&invoice).await?;
        tx.commit().await?;

        info!(invoice_id = %invoice.id, reference = %invoice.reference, "direct invoice created");
        self.notify_invoice_created(actor, &invoice);
        Ok(invoice)
    }

    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn get_invoice(&self, actor: &Actor, id: InvoiceId) -> ServiceResult<InvoiceDetails> {
        require_admin(actor)?;
        let mut tx = self.begin().await?;
        let invoice = load_invoice(tx.as_mut(), id).await?;

        let mut devis = Vec::with_capacity(invoice.devis_ids.len());
        for devis_id in &invoice.devis_ids {
            if let Some(d) = tx.devis(*devis_id).await? {
                devis.push(d);
            }
        }
        let payments = tx.payments_for_invoice(id).await?;
        let stats = PaymentLedger::new(&invoice, payments.clone()).stats();

        Ok(InvoiceDetails {
            invoice,
            devis,
            payments,
            stats,
        })
    }

    /// Newest first, optionally for one client.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn list_invoices(&self, actor: &Actor, client_id: Option<ClientId>) -> ServiceResult<Vec<InvoiceOverview>> {
        require_admin(actor)?;
        let mut tx = self.begin().await?;
        let invoices = tx.list_invoices(client_id).await?;

        let mut rows = Vec::with_capacity(invoices.len());
        for invoice in invoices {
            let payments = tx.payments_for_invoice(invoice.id).await?;
            let stats = PaymentLedger::new(&invoice, payments).stats();
            rows.push(InvoiceOverview { invoice, stats });
        }
        Ok(rows)
    }

    /// Delete a payment-free invoice and put its quotes back to VALIDATED.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn delete_invoice(&self, actor: &Actor, id: InvoiceId) -> ServiceResult<()> {
        require_admin(actor)?;
        let mut tx = self.begin().await?;
        let invoice = load_invoice(tx.as_mut(), id).await?;

        let payments = tx.payments_for_invoice(id).await?;
        invoice.ensure_deletable(payments.len()).inspect_err(|e| {
            warn!(invoice_id = %id, error = %e, "invoice deletion rejected");
        })?;

        let at = now();
        for devis_id in &invoice.devis_ids {
            let Some(mut devis) = tx.devis(*devis_id).await? else {
                continue;
            };
            devis.execute(&DevisCommand::RevertToValidated(RevertToValidated {
                invoice_id: id,
                occurred_at: at,
            }))?;
            tx.save_devis(&devis).await?;
        }
        tx.delete_invoice(id).await?;
        tx.commit().await?;

        info!(invoice_id = %id, reference = %invoice.reference, reverted = invoice.devis_ids.len(), "invoice deleted");
        self.notify(
            Notification::new(
                NotificationKind::InvoiceDeleted,
                "Invoice deleted",
                format!("{} deleted", invoice.reference),
            )
            .about("invoice", id)
            .by(actor.user_id),
        );
        Ok(())
    }

    fn notify_invoice_created(&self, actor: &Actor, invoice: &Invoice) {
        self.notify(
            Notification::new(
                NotificationKind::InvoiceCreated,
                "New invoice",
                format!("{} created, total {}", invoice.reference, format_amount(invoice.total_amount)),
            )
            .about("invoice", invoice.id)
            .by(actor.user_id),
        );
    }
}
