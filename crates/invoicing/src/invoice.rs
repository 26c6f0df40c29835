use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fabdesk_core::money;
use fabdesk_core::{ClientId, DevisId, DomainError, InvoiceId, InvoiceItemId, round2};

use crate::Consolidation;

/// Ad-hoc billable row on a direct invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub id: InvoiceItemId,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInvoiceItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

impl NewInvoiceItem {
    fn validate(&self, index: usize) -> Result<(), DomainError> {
        if self.description.trim().is_empty() {
            return Err(DomainError::validation(format!("items[{index}].description cannot be empty")));
        }
        if self.quantity <= Decimal::ZERO {
            return Err(DomainError::validation(format!("items[{index}].quantity must be greater than 0")));
        }
        if self.unit_price < Decimal::ZERO {
            return Err(DomainError::validation(format!("items[{index}].unit_price cannot be negative")));
        }
        Ok(())
    }
}

/// Billable document. The total is fixed when the invoice is created.
///
/// An invoice is either built from quotes (`devis_ids` non-empty, no items) or
/// created directly from items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub reference: String,
    pub client_id: ClientId,
    pub total_amount: Decimal,
    pub devis_ids: Vec<DevisId>,
    pub items: Vec<InvoiceItem>,
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    /// Invoice consolidating validated quotes.
    pub fn from_quotes(id: InvoiceId, reference: String, consolidation: &Consolidation, now: DateTime<Utc>) -> Self {
        Self {
            id,
            reference,
            client_id: consolidation.client_id,
            total_amount: consolidation.total_amount,
            devis_ids: consolidation.devis_ids.clone(),
            items: Vec::new(),
            created_at: now,
        }
    }

    /// Invoice built from ad-hoc items, without any quote.
    pub fn direct(
        id: InvoiceId,
        reference: String,
        client_id: ClientId,
        items: Vec<NewInvoiceItem>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if items.is_empty() {
            return Err(DomainError::validation("at least one item is required"));
        }
        for (index, item) in items.iter().enumerate() {
            item.validate(index)?;
        }

        let items: Vec<InvoiceItem> = items
            .into_iter()
            .map(|item| InvoiceItem {
                id: InvoiceItemId::new(),
                total_price: round2(item.quantity * item.unit_price),
                description: item.description.trim().to_string(),
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect();
        let total_amount = round2(money::sum(items.iter().map(|i| i.total_price)));

        Ok(Self {
            id,
            reference,
            client_id,
            total_amount,
            devis_ids: Vec::new(),
            items,
            created_at: now,
        })
    }

    pub fn is_quote_based(&self) -> bool {
        !self.devis_ids.is_empty()
    }

    /// Paid invoices keep their history: delete the payments first.
    pub fn ensure_deletable(&self, payment_count: usize) -> Result<(), DomainError> {
        if payment_count > 0 {
            return Err(DomainError::conflict(format!(
                "cannot delete invoice {} with {payment_count} payment(s), delete all payments first",
                self.reference
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(description: &str, quantity: Decimal, unit_price: Decimal) -> NewInvoiceItem {
        NewInvoiceItem {
            description: description.into(),
            quantity,
            unit_price,
        }
    }

    fn direct(items: Vec<NewInvoiceItem>) -> Result<Invoice, DomainError> {
        Invoice::direct(InvoiceId::new(), "INV-2026-0001".into(), ClientId::new(), items, Utc::now())
    }

    #[test]
    fn direct_invoice_totals_its_items() {
        let invoice = direct(vec![
            item("Découpe sur mesure", dec!(3), dec!(12.333)),
            item("Livraison", dec!(1), dec!(20)),
        ])
        .unwrap();

        assert_eq!(invoice.items[0].total_price, dec!(37.00));
        assert_eq!(invoice.total_amount, dec!(57.00));
        assert!(!invoice.is_quote_based());
    }

    #[test]
    fn direct_invoice_requires_items() {
        assert_eq!(direct(vec![]).unwrap_err(), DomainError::validation("at least one item is required"));
    }

    #[test]
    fn direct_invoice_validates_each_item() {
        let err = direct(vec![item("ok", dec!(1), dec!(1)), item(" ", dec!(1), dec!(1))]).unwrap_err();
        assert_eq!(err, DomainError::validation("items[1].description cannot be empty"));

        let err = direct(vec![item("x", dec!(0), dec!(1))]).unwrap_err();
        assert!(matches!(err, DomainError::Validation(m) if m.contains("quantity")));

        let err = direct(vec![item("x", dec!(1), dec!(-1))]).unwrap_err();
        assert!(matches!(err, DomainError::Validation(m) if m.contains("unit_price")));

        assert!(direct(vec![item("offert", dec!(1), dec!(0))]).is_ok());
    }

    #[test]
    fn invoice_with_payments_cannot_be_deleted() {
        let invoice = direct(vec![item("x", dec!(1), dec!(10))]).unwrap();
        assert!(invoice.ensure_deletable(0).is_ok());
        assert!(matches!(invoice.ensure_deletable(1), Err(DomainError::StateConflict(_))));
    }
}
