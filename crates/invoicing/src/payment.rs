use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fabdesk_core::money::{self, format_amount};
use fabdesk_core::{Aggregate, AggregateRoot, DomainError, InvoiceId, PaymentId, round2};
use fabdesk_events::Event;

use crate::Invoice;

/// Money received against an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub invoice_id: InvoiceId,
    pub amount: Decimal,
    pub payment_date: DateTime<Utc>,
    pub method: Option<String>,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPayment {
    pub amount: Decimal,
    /// Defaults to the time of recording.
    pub payment_date: Option<DateTime<Utc>>,
    pub method: Option<String>,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

/// Partial update. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentPatch {
    pub amount: Option<Decimal>,
    pub payment_date: Option<DateTime<Utc>>,
    pub method: Option<String>,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

/// Balance view of one invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStats {
    pub invoice_id: InvoiceId,
    pub invoice_reference: String,
    pub total_amount: Decimal,
    pub total_paid: Decimal,
    pub remaining: Decimal,
    pub percent_paid: Decimal,
    pub payment_count: usize,
    pub is_paid: bool,
}

/// Aggregate root: the payments of one invoice.
///
/// Loaded from the invoice and its current payments inside the transaction
/// that records the change. Invariant: `Σ payments ≤ total_amount`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentLedger {
    invoice_id: InvoiceId,
    invoice_reference: String,
    total_amount: Decimal,
    payments: Vec<Payment>,
    version: u64,
}

impl PaymentLedger {
    pub fn new(invoice: &Invoice, payments: Vec<Payment>) -> Self {
        Self {
            invoice_id: invoice.id,
            invoice_reference: invoice.reference.clone(),
            total_amount: invoice.total_amount,
            payments,
            version: 0,
        }
    }

    pub fn payments(&self) -> &[Payment] {
        &self.payments
    }

    pub fn payment(&self, id: PaymentId) -> Option<&Payment> {
        self.payments.iter().find(|p| p.id == id)
    }

    pub fn total_amount(&self) -> Decimal {
        self.total_amount
    }

    pub fn total_paid(&self) -> Decimal {
        money::sum(self.payments.iter().map(|p| p.amount))
    }

    /// Outstanding balance, rounded to the cent.
    pub fn remaining(&self) -> Decimal {
        round2(self.total_amount - self.total_paid())
    }

    pub fn is_paid(&self) -> bool {
        self.remaining() == Decimal::ZERO && self.total_amount > Decimal::ZERO
    }

    pub fn stats(&self) -> PaymentStats {
        let total_paid = round2(self.total_paid());
        PaymentStats {
            invoice_id: self.invoice_id,
            invoice_reference: self.invoice_reference.clone(),
            total_amount: self.total_amount,
            total_paid,
            remaining: self.remaining(),
            percent_paid: money::percent(total_paid, self.total_amount),
            payment_count: self.payments.len(),
            is_paid: self.is_paid(),
        }
    }
}

impl AggregateRoot for PaymentLedger {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.invoice_id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordPayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayment {
    pub payment_id: PaymentId,
    pub payment: NewPayment,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AmendPayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmendPayment {
    pub payment_id: PaymentId,
    pub patch: PaymentPatch,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemovePayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovePayment {
    pub payment_id: PaymentId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentCommand {
    RecordPayment(RecordPayment),
    AmendPayment(AmendPayment),
    RemovePayment(RemovePayment),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentEvent {
    PaymentRecorded {
        payment: Payment,
        occurred_at: DateTime<Utc>,
    },
    PaymentAmended {
        payment: Payment,
        occurred_at: DateTime<Utc>,
    },
    PaymentRemoved {
        invoice_id: InvoiceId,
        payment_id: PaymentId,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for PaymentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PaymentEvent::PaymentRecorded { .. } => "invoicing.payment.recorded",
            PaymentEvent::PaymentAmended { .. } => "invoicing.payment.amended",
            PaymentEvent::PaymentRemoved { .. } => "invoicing.payment.removed",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PaymentEvent::PaymentRecorded { occurred_at, .. }
            | PaymentEvent::PaymentAmended { occurred_at, .. }
            | PaymentEvent::PaymentRemoved { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for PaymentLedger {
    type Command = PaymentCommand;
    type Event = PaymentEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PaymentEvent::PaymentRecorded { payment, .. } => {
                self.payments.push(payment.clone());
            }
            PaymentEvent::PaymentAmended { payment, .. } => {
                if let Some(existing) = self.payments.iter_mut().find(|p| p.id == payment.id) {
                    *existing = payment.clone();
                }
            }
            PaymentEvent::PaymentRemoved { payment_id, .. } => {
                self.payments.retain(|p| p.id != *payment_id);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PaymentCommand::RecordPayment(cmd) => self.handle_record(cmd),
            PaymentCommand::AmendPayment(cmd) => self.handle_amend(cmd),
            PaymentCommand::RemovePayment(cmd) => self.handle_remove(cmd),
        }
    }
}

fn ensure_positive(amount: Decimal) -> Result<(), DomainError> {
    if amount <= Decimal::ZERO {
        return Err(DomainError::validation("payment amount must be greater than 0"));
    }
    Ok(())
}

impl PaymentLedger {
    fn find(&self, payment_id: PaymentId) -> Result<&Payment, DomainError> {
        self.payment(payment_id)
            .ok_or_else(|| DomainError::not_found(format!("payment {payment_id}")))
    }

    fn handle_record(&self, cmd: &RecordPayment) -> Result<Vec<PaymentEvent>, DomainError> {
        let amount = round2(cmd.payment.amount);
        ensure_positive(amount)?;

        let remaining = self.remaining();
        if amount > remaining {
            return Err(DomainError::validation(format!(
                "payment amount {} exceeds remaining balance {}",
                format_amount(amount),
                format_amount(remaining)
            )));
        }

        let new = &cmd.payment;
        Ok(vec![PaymentEvent::PaymentRecorded {
            payment: Payment {
                id: cmd.payment_id,
                invoice_id: self.invoice_id,
                amount,
                payment_date: new.payment_date.unwrap_or(cmd.occurred_at),
                method: new.method.clone(),
                reference: new.reference.clone(),
                notes: new.notes.clone(),
                created_at: cmd.occurred_at,
            },
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_amend(&self, cmd: &AmendPayment) -> Result<Vec<PaymentEvent>, DomainError> {
        let current = self.find(cmd.payment_id)?;
        let patch = &cmd.patch;

        let amount = patch.amount.map(round2);
        if let Some(amount) = amount {
            ensure_positive(amount)?;

            let others = money::sum(
                self.payments
                    .iter()
                    .filter(|p| p.id != cmd.payment_id)
                    .map(|p| p.amount),
            );
            let max_allowed = round2(self.total_amount - others);
            if amount > max_allowed {
                return Err(DomainError::validation(format!(
                    "payment amount {} exceeds maximum allowed {}",
                    format_amount(amount),
                    format_amount(max_allowed)
                )));
            }
        }

        let mut payment = current.clone();
        if let Some(amount) = amount {
            payment.amount = amount;
        }
        if let Some(date) = patch.payment_date {
            payment.payment_date = date;
        }
        if patch.method.is_some() {
            payment.method = patch.method.clone();
        }
        if patch.reference.is_some() {
            payment.reference = patch.reference.clone();
        }
        if patch.notes.is_some() {
            payment.notes = patch.notes.clone();
        }

        Ok(vec![PaymentEvent::PaymentAmended {
            payment,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_remove(&self, cmd: &RemovePayment) -> Result<Vec<PaymentEvent>, DomainError> {
        self.find(cmd.payment_id)?;

        Ok(vec![PaymentEvent::PaymentRemoved {
            invoice_id: self.invoice_id,
            payment_id: cmd.payment_id,
            occurred_at: cmd.occurred_at,
        }])
    }
}
