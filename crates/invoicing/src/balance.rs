//! What a client owes: invoices, payments and quotes not yet billed.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fabdesk_core::money;
use fabdesk_core::{ClientId, DevisId, InvoiceId};
use fabdesk_quotes::{Devis, DevisStatus};

use crate::{Invoice, Payment};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceBalance {
    pub invoice_id: InvoiceId,
    pub reference: String,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub balance: Decimal,
    pub devis_count: usize,
    pub created_at: DateTime<Utc>,
    /// Newest payment first.
    pub payments: Vec<Payment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDevis {
    pub devis_id: DevisId,
    pub reference: String,
    pub status: DevisStatus,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSummary {
    pub total_invoiced: Decimal,
    pub total_paid: Decimal,
    pub outstanding_balance: Decimal,
    pub pending_devis_total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientBalance {
    pub client_id: ClientId,
    pub summary: BalanceSummary,
    /// Newest invoice first.
    pub invoices: Vec<InvoiceBalance>,
    /// Draft or validated quotes without an invoice, newest first.
    pub pending_devis: Vec<PendingDevis>,
}

impl ClientBalance {
    /// `invoices` pairs each invoice of the client with all of its payments;
    /// `devis` may hold every quote of the client, only pending ones are kept.
    pub fn compute(client_id: ClientId, invoices: Vec<(Invoice, Vec<Payment>)>, devis: &[Devis]) -> Self {
        let mut rows: Vec<InvoiceBalance> = invoices
            .into_iter()
            .map(|(invoice, mut payments)| {
                payments.sort_by(|a, b| b.payment_date.cmp(&a.payment_date));
                let paid_amount = money::sum(payments.iter().map(|p| p.amount));
                InvoiceBalance {
                    invoice_id: invoice.id,
                    reference: invoice.reference,
                    total_amount: invoice.total_amount,
                    paid_amount,
                    balance: invoice.total_amount - paid_amount,
                    devis_count: invoice.devis_ids.len(),
                    created_at: invoice.created_at,
                    payments,
                }
            })
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut pending: Vec<PendingDevis> = devis
            .iter()
            .filter(|d| d.client_id() == client_id && d.is_pending())
            .map(|d| PendingDevis {
                devis_id: d.id_typed(),
                reference: d.reference().to_string(),
                status: d.status(),
                total_amount: d.total_amount(),
                created_at: d.created_at(),
            })
            .collect();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total_invoiced = money::sum(rows.iter().map(|r| r.total_amount));
        let total_paid = money::sum(rows.iter().map(|r| r.paid_amount));

        Self {
            client_id,
            summary: BalanceSummary {
                total_invoiced,
                total_paid,
                outstanding_balance: total_invoiced - total_paid,
                pending_devis_total: money::sum(pending.iter().map(|d| d.total_amount)),
            },
            invoices: rows,
            pending_devis: pending,
        }
    }
}
