use tracing::{info, instrument, warn};

use fabdesk_auth::{Actor, require_admin};
use fabdesk_core::money::format_amount;
use fabdesk_core::{Aggregate, DomainError, InvoiceId, PaymentId};
use fabdesk_events::{Notification, NotificationKind};
use fabdesk_invoicing::{
    AmendPayment, NewPayment, Payment, PaymentCommand, PaymentLedger, PaymentPatch, PaymentStats,
    RecordPayment, RemovePayment,
};

use super::invoices::load_invoice;
use super::{BackOffice, ServiceError, ServiceResult, not_found, now};
use crate::store::StoreTx;

/// Ledger of one invoice, loaded with the invoice row locked.
async fn load_ledger(tx: &mut dyn StoreTx, invoice_id: InvoiceId) -> ServiceResult<PaymentLedger> {
    let invoice = load_invoice(tx, invoice_id).await?;
    let payments = tx.payments_for_invoice(invoice_id).await?;
    Ok(PaymentLedger::new(&invoice, payments))
}

async fn load_payment(tx: &mut dyn StoreTx, id: PaymentId) -> ServiceResult<Payment> {
    tx.payment(id).await?.ok_or_else(|| not_found("payment"))
}

fn ledger_payment(ledger: &PaymentLedger, id: PaymentId) -> ServiceResult<Payment> {
    ledger
        .payment(id)
        .cloned()
        .ok_or_else(|| ServiceError::Domain(DomainError::not_found(format!("payment {id}"))))
}

fn log_rejection(invoice_id: InvoiceId, err: &DomainError) {
    warn!(invoice_id = %invoice_id, error = %err, "payment rejected");
}

impl BackOffice {
    /// Record money received. Fails when the amount exceeds what is still due.
    #[instrument(skip(self, actor, payment), fields(user_id = %actor.user_id, amount = %payment.amount), err)]
    pub async fn record_payment(&self, actor: &Actor, invoice_id: InvoiceId, payment: NewPayment) -> ServiceResult<Payment> {
        require_admin(actor)?;
        let mut tx = self.begin().await?;
        let mut ledger = load_ledger(tx.as_mut(), invoice_id).await?;

        let payment_id = PaymentId::new();
        ledger
            .execute(&PaymentCommand::RecordPayment(RecordPayment {
                payment_id,
                payment,
                occurred_at: now(),
            }))
            .inspect_err(|e| log_rejection(invoice_id, e))?;

        let recorded = ledger_payment(&ledger, payment_id)?;
        tx.save_payment(&recorded).await?;
        tx.commit().await?;

        let stats = ledger.stats();
        info!(
            payment_id = %payment_id,
            invoice_id = %invoice_id,
            remaining = %stats.remaining,
            is_paid = stats.is_paid,
            "payment recorded"
        );
        self.notify(
            Notification::new(
                NotificationKind::PaymentReceived,
                "Payment received",
                format!(
                    "{} received for {}, remaining {}",
                    format_amount(recorded.amount),
                    stats.invoice_reference,
                    format_amount(stats.remaining)
                ),
            )
            .about("payment", payment_id)
            .by(actor.user_id),
        );
        Ok(recorded)
    }

    /// Amend a payment. The new amount may not exceed the invoice total minus
    /// every other payment.
    #[instrument(skip(self, actor, patch), fields(user_id = %actor.user_id), err)]
    pub async fn update_payment(&self, actor: &Actor, id: PaymentId, patch: PaymentPatch) -> ServiceResult<Payment> {
        require_admin(actor)?;
        let mut tx = self.begin().await?;
        let current = load_payment(tx.as_mut(), id).await?;
        let mut ledger = load_ledger(tx.as_mut(), current.invoice_id).await?;

        ledger
            .execute(&PaymentCommand::AmendPayment(AmendPayment {
                payment_id: id,
                patch,
                occurred_at: now(),
            }))
            .inspect_err(|e| log_rejection(current.invoice_id, e))?;

        let amended = ledger_payment(&ledger, id)?;
        tx.save_payment(&amended).await?;
        tx.commit().await?;

        info!(payment_id = %id, invoice_id = %amended.invoice_id, amount = %amended.amount, "payment updated");
        Ok(amended)
    }

    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn delete_payment(&self, actor: &Actor, id: PaymentId) -> ServiceResult<()> {
        require_admin(actor)?;
        let mut tx = self.begin().await?;
        let current = load_payment(tx.as_mut(), id).await?;
        let mut ledger = load_ledger(tx.as_mut(), current.invoice_id).await?;

        ledger.execute(&PaymentCommand::RemovePayment(RemovePayment {
            payment_id: id,
            occurred_at: now(),
        }))?;
        tx.delete_payment(id).await?;
        tx.commit().await?;

        info!(payment_id = %id, invoice_id = %current.invoice_id, "payment deleted");
        Ok(())
    }

    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn get_payment(&self, actor: &Actor, id: PaymentId) -> ServiceResult<Payment> {
        require_admin(actor)?;
        let mut tx = self.begin().await?;
        load_payment(tx.as_mut(), id).await
    }

    /// Newest payment first.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn list_payments(&self, actor: &Actor, invoice_id: InvoiceId) -> ServiceResult<Vec<Payment>> {
        require_admin(actor)?;
        let mut tx = self.begin().await?;
        load_invoice(tx.as_mut(), invoice_id).await?;
        Ok(tx.payments_for_invoice(invoice_id).await?)
    }

    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn payment_stats(&self, actor: &Actor, invoice_id: InvoiceId) -> ServiceResult<PaymentStats> {
        require_admin(actor)?;
        let mut tx = self.begin().await?;
        Ok(load_ledger(tx.as_mut(), invoice_id).await?.stats())
    }
}
