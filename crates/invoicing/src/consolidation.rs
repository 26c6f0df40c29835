//! Merging validated quotes of one client into a single invoice.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fabdesk_core::money;
use fabdesk_core::{ClientId, DevisId, DomainError, round2};
use fabdesk_quotes::{Devis, DevisStatus};

/// Outcome of a successful consistency check over a set of quotes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consolidation {
    pub client_id: ClientId,
    /// Requested ids, duplicates removed, request order kept.
    pub devis_ids: Vec<DevisId>,
    pub total_amount: Decimal,
}

/// Check that `found` (the quotes loaded for `requested`) can be invoiced
/// together.
///
/// Fails when a requested id was not found, when the quotes belong to more
/// than one client, when one is not validated, or when one already has an
/// invoice. Nothing is mutated here.
pub fn consolidate(requested: &[DevisId], found: &[Devis]) -> Result<Consolidation, DomainError> {
    let mut devis_ids: Vec<DevisId> = Vec::with_capacity(requested.len());
    for id in requested {
        if !devis_ids.contains(id) {
            devis_ids.push(*id);
        }
    }
    if devis_ids.is_empty() {
        return Err(DomainError::validation("at least one devis is required"));
    }

    let mut quotes: Vec<&Devis> = Vec::with_capacity(devis_ids.len());
    for id in &devis_ids {
        let devis = found
            .iter()
            .find(|d| d.id_typed() == *id)
            .ok_or_else(|| DomainError::not_found(format!("devis {id}")))?;
        quotes.push(devis);
    }

    let client_id = quotes[0].client_id();
    if quotes.iter().any(|d| d.client_id() != client_id) {
        return Err(DomainError::validation("all devis must belong to the same client"));
    }

    if let Some(d) = quotes.iter().find(|d| d.status() != DevisStatus::Validated) {
        return Err(DomainError::validation(format!(
            "all devis must be validated before creating an invoice ({} is {})",
            d.reference(),
            d.status()
        )));
    }

    if let Some(d) = quotes.iter().find(|d| d.invoice_id().is_some()) {
        return Err(DomainError::validation(format!(
            "devis {} already has an invoice",
            d.reference()
        )));
    }

    let total_amount = round2(money::sum(quotes.iter().map(|d| d.total_amount())));

    Ok(Consolidation {
        client_id,
        devis_ids,
        total_amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fabdesk_core::{Aggregate, DevisLineId, InvoiceId, MachineType, UserId};
    use fabdesk_pricing::PricedLine;
    use fabdesk_quotes::{AddLine, CreateDevis, DevisCommand, MarkInvoiced, ValidateDevis};
    use rust_decimal_macros::dec;

    fn quote(client_id: ClientId, reference: &str, total: Decimal, validate: bool) -> Devis {
        let id = DevisId::new();
        let now = Utc::now();
        let mut devis = Devis::empty(id);
        devis
            .execute(&DevisCommand::CreateDevis(CreateDevis {
                devis_id: id,
                reference: reference.into(),
                client_id,
                created_by: UserId::new(),
                notes: None,
                occurred_at: now,
            }))
            .unwrap();
        devis
            .execute(&DevisCommand::AddLine(AddLine {
                line_id: DevisLineId::new(),
                description: None,
                priced: PricedLine {
                    machine_type: MachineType::Panneaux,
                    measure: dec!(1),
                    unit_price: total,
                    material_id: None,
                    material_cost: Decimal::ZERO,
                    line_total: total,
                    breakdown: String::new(),
                },
                occurred_at: now,
            }))
            .unwrap();
        if validate {
            devis
                .execute(&DevisCommand::ValidateDevis(ValidateDevis { occurred_at: now }))
                .unwrap();
        }
        devis
    }

    #[test]
    fn sums_quotes_of_one_client() {
        let client = ClientId::new();
        let quotes = vec![
            quote(client, "DEV-2026-0001", dec!(95), true),
            quote(client, "DEV-2026-0002", dec!(160), true),
            quote(client, "DEV-2026-0003", dec!(200), true),
        ];
        let ids: Vec<DevisId> = quotes.iter().map(|d| d.id_typed()).collect();

        let c = consolidate(&ids, &quotes).unwrap();
        assert_eq!(c.client_id, client);
        assert_eq!(c.total_amount, dec!(455));
        assert_eq!(c.devis_ids, ids);
    }

    #[test]
    fn duplicate_ids_are_collapsed() {
        let q = quote(ClientId::new(), "DEV-2026-0001", dec!(95), true);
        let id = q.id_typed();
        let c = consolidate(&[id, id], &[q]).unwrap();
        assert_eq!(c.devis_ids, vec![id]);
        assert_eq!(c.total_amount, dec!(95));
    }

    #[test]
    fn empty_request_is_rejected() {
        assert!(matches!(consolidate(&[], &[]), Err(DomainError::Validation(_))));
    }

    #[test]
    fn missing_quote_is_not_found() {
        let q = quote(ClientId::new(), "DEV-2026-0001", dec!(95), true);
        let missing = DevisId::new();
        let err = consolidate(&[q.id_typed(), missing], &[q]).unwrap_err();
        assert_eq!(err, DomainError::not_found(format!("devis {missing}")));
    }

    #[test]
    fn quotes_of_different_clients_are_rejected() {
        let a = quote(ClientId::new(), "DEV-2026-0001", dec!(95), true);
        let b = quote(ClientId::new(), "DEV-2026-0002", dec!(160), true);
        let err = consolidate(&[a.id_typed(), b.id_typed()], &[a, b]).unwrap_err();
        assert_eq!(err, DomainError::validation("all devis must belong to the same client"));
    }

    #[test]
    fn draft_quote_is_rejected() {
        let client = ClientId::new();
        let a = quote(client, "DEV-2026-0001", dec!(95), true);
        let b = quote(client, "DEV-2026-0002", dec!(160), false);
        let err = consolidate(&[a.id_typed(), b.id_typed()], &[a, b]).unwrap_err();
        assert!(matches!(err, DomainError::Validation(m) if m.contains("DEV-2026-0002")));
    }

    #[test]
    fn already_invoiced_quote_is_rejected() {
        let mut a = quote(ClientId::new(), "DEV-2026-0001", dec!(95), true);
        a.execute(&DevisCommand::MarkInvoiced(MarkInvoiced {
            invoice_id: InvoiceId::new(),
            occurred_at: Utc::now(),
        }))
        .unwrap();
        let err = consolidate(&[a.id_typed()], &[a]).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
