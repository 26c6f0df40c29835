//! Request DTOs and JSON mapping helpers.
//!
//! Amounts leave the API as strings with exactly two decimals (`"45.00"`);
//! measures are rendered without trailing zeros. Requests accept amounts as
//! JSON numbers or strings.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};

use fabdesk_clients::Client;
use fabdesk_core::money::{format_amount, format_quantity};
use fabdesk_core::{ClientId, DevisId, FixedServiceId, MachineType, MaterialId};
use fabdesk_events::Notification;
use fabdesk_expenses::{Expense, ExpenseFilter, ExpenseStats};
use fabdesk_infra::{DevisQuery, InvoiceDetails, InvoiceOverview, NewDevis, NewLine};
use fabdesk_invoicing::{ClientBalance, Invoice, NewInvoiceItem, Payment, PaymentStats};
use fabdesk_pricing::{FixedService, LineInput, MachinePricing, Material, PricedLine};
use fabdesk_quotes::{Devis, DevisLine, DevisService, DevisStatus};

use crate::app::errors;

type Rejection = axum::response::Response;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateDevisRequest {
    pub client_id: String,
    pub notes: Option<String>,
}

impl CreateDevisRequest {
    pub fn into_new(self) -> Result<NewDevis, Rejection> {
        Ok(NewDevis {
            client_id: errors::parse::<ClientId>(&self.client_id)?,
            notes: self.notes,
        })
    }
}

/// Machine work to price, used both by the calculator preview and by "add line".
#[derive(Debug, Deserialize)]
pub struct LineRequest {
    pub machine_type: String,
    pub minutes: Option<Decimal>,
    pub meters: Option<Decimal>,
    pub quantity: Option<Decimal>,
    pub material_id: Option<String>,
    pub description: Option<String>,
}

impl LineRequest {
    pub fn to_input(&self) -> Result<LineInput, Rejection> {
        let mut input = LineInput::new(errors::parse::<MachineType>(&self.machine_type)?);
        input.minutes = self.minutes;
        input.meters = self.meters;
        input.quantity = self.quantity;
        input.material_id = errors::parse_opt::<MaterialId>(self.material_id.as_deref())?;
        Ok(input)
    }

    pub fn into_new_line(self) -> Result<NewLine, Rejection> {
        Ok(NewLine {
            input: self.to_input()?,
            description: self.description,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct AddServiceRequest {
    pub service_id: String,
}

impl AddServiceRequest {
    pub fn service_id(&self) -> Result<FixedServiceId, Rejection> {
        errors::parse(&self.service_id)
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateNotesRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListDevisQuery {
    pub client_id: Option<String>,
    pub status: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

impl ListDevisQuery {
    pub fn into_query(self) -> Result<DevisQuery, Rejection> {
        Ok(DevisQuery {
            client_id: errors::parse_opt::<ClientId>(self.client_id.as_deref())?,
            status: errors::parse_opt::<DevisStatus>(self.status.as_deref())?,
            date_from: parse_date(self.date_from.as_deref(), false)?,
            date_to: parse_date(self.date_to.as_deref(), true)?,
        })
    }
}

/// RFC3339 timestamp or plain `YYYY-MM-DD`. A plain date bound covers the whole day.
fn parse_date(raw: Option<&str>, end_of_day: bool) -> Result<Option<chrono::DateTime<chrono::Utc>>, Rejection> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(ts.with_timezone(&chrono::Utc)));
    }
    let date = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        errors::json_error(
            axum::http::StatusCode::BAD_REQUEST,
            "invalid_date",
            format!("expected RFC3339 or YYYY-MM-DD, got {raw:?}"),
        )
    })?;
    let time = if end_of_day {
        chrono::NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
    } else {
        chrono::NaiveTime::from_hms_opt(0, 0, 0)
    };
    Ok(time.map(|t| date.and_time(t).and_utc()))
}

/// `GET /expenses` and `GET /expenses/stats` filters. `category` is ignored by stats.
#[derive(Debug, Default, Deserialize)]
pub struct ExpenseQuery {
    pub category: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

impl ExpenseQuery {
    pub fn into_filter(self) -> Result<ExpenseFilter, Rejection> {
        Ok(ExpenseFilter {
            category: self.category.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
            date_from: parse_date(self.date_from.as_deref(), false)?,
            date_to: parse_date(self.date_to.as_deref(), true)?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ClientFilterQuery {
    pub client_id: Option<String>,
}

impl ClientFilterQuery {
    pub fn client_id(&self) -> Result<Option<ClientId>, Rejection> {
        errors::parse_opt(self.client_id.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InvoiceFromDevisRequest {
    pub devis_ids: Vec<String>,
}

impl InvoiceFromDevisRequest {
    pub fn devis_ids(&self) -> Result<Vec<DevisId>, Rejection> {
        self.devis_ids.iter().map(|id| errors::parse::<DevisId>(id)).collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct DirectInvoiceRequest {
    pub client_id: String,
    pub items: Vec<NewInvoiceItem>,
}

#[derive(Debug, Deserialize)]
pub struct MachinePricingRequest {
    pub price_per_unit: Decimal,
    pub description: Option<String>,
}

// -------------------------
// Response mapping
// -------------------------

fn amount(value: Decimal) -> String {
    format_amount(value)
}

pub fn devis_to_json(d: &Devis) -> Value {
    json!({
        "id": d.id_typed().to_string(),
        "reference": d.reference(),
        "client_id": d.client_id().to_string(),
        "created_by": d.created_by().to_string(),
        "status": d.status().as_str(),
        "notes": d.notes(),
        "total_amount": amount(d.total_amount()),
        "lines": d.lines().iter().map(devis_line_to_json).collect::<Vec<_>>(),
        "services": d.services().iter().map(devis_service_to_json).collect::<Vec<_>>(),
        "invoice_id": d.invoice_id().map(|id| id.to_string()),
        "created_at": d.created_at().to_rfc3339(),
        "validated_at": d.validated_at().map(|t| t.to_rfc3339()),
        "updated_at": d.updated_at().to_rfc3339(),
    })
}

fn devis_line_to_json(l: &DevisLine) -> Value {
    json!({
        "id": l.id.to_string(),
        "machine_type": l.machine_type.as_str(),
        "description": l.description,
        "minutes": l.minutes.map(format_quantity),
        "meters": l.meters.map(format_quantity),
        "quantity": l.quantity.map(format_quantity),
        "material_id": l.material_id.map(|id| id.to_string()),
        "unit_price": amount(l.unit_price),
        "material_cost": amount(l.material_cost),
        "line_total": amount(l.line_total),
        "created_at": l.created_at.to_rfc3339(),
    })
}

fn devis_service_to_json(s: &DevisService) -> Value {
    json!({
        "id": s.id.to_string(),
        "service_id": s.service_id.to_string(),
        "name": s.name,
        "price": amount(s.price),
    })
}

pub fn priced_line_to_json(p: &PricedLine) -> Value {
    json!({
        "machine_type": p.machine_type.as_str(),
        "measure": p.machine_type.measure().field(),
        "quantity": format_quantity(p.measure),
        "unit_price": amount(p.unit_price),
        "material_id": p.material_id.map(|id| id.to_string()),
        "material_cost": amount(p.material_cost),
        "line_total": amount(p.line_total),
        "breakdown": p.breakdown,
    })
}

pub fn invoice_to_json(i: &Invoice) -> Value {
    json!({
        "id": i.id.to_string(),
        "reference": i.reference,
        "client_id": i.client_id.to_string(),
        "total_amount": amount(i.total_amount),
        "devis_ids": i.devis_ids.iter().map(|id| id.to_string()).collect::<Vec<_>>(),
        "items": i.items.iter().map(|item| json!({
            "id": item.id.to_string(),
            "description": item.description,
            "quantity": format_quantity(item.quantity),
            "unit_price": amount(item.unit_price),
            "total_price": amount(item.total_price),
        })).collect::<Vec<_>>(),
        "created_at": i.created_at.to_rfc3339(),
    })
}

pub fn invoice_overview_to_json(o: &InvoiceOverview) -> Value {
    let mut v = invoice_to_json(&o.invoice);
    v["payment"] = payment_stats_to_json(&o.stats);
    v
}

pub fn invoice_details_to_json(d: &InvoiceDetails) -> Value {
    let mut v = invoice_to_json(&d.invoice);
    v["devis"] = Value::Array(d.devis.iter().map(devis_to_json).collect());
    v["payments"] = Value::Array(d.payments.iter().map(payment_to_json).collect());
    v["payment"] = payment_stats_to_json(&d.stats);
    v
}

pub fn payment_to_json(p: &Payment) -> Value {
    json!({
        "id": p.id.to_string(),
        "invoice_id": p.invoice_id.to_string(),
        "amount": amount(p.amount),
        "payment_date": p.payment_date.to_rfc3339(),
        "method": p.method,
        "reference": p.reference,
        "notes": p.notes,
        "created_at": p.created_at.to_rfc3339(),
    })
}

pub fn expense_to_json(e: &Expense) -> Value {
    json!({
        "id": e.id.to_string(),
        "description": e.description,
        "amount": amount(e.amount),
        "category": e.category,
        "date": e.date.to_rfc3339(),
        "reference": e.reference,
        "notes": e.notes,
        "created_by": e.created_by.to_string(),
        "created_at": e.created_at.to_rfc3339(),
        "updated_at": e.updated_at.to_rfc3339(),
    })
}

pub fn expense_stats_to_json(s: &ExpenseStats) -> Value {
    let by_category: serde_json::Map<String, Value> = s
        .by_category
        .iter()
        .map(|(category, total)| (category.clone(), Value::String(amount(*total))))
        .collect();
    json!({
        "total_amount": amount(s.total_amount),
        "count": s.count,
        "by_category": by_category,
    })
}

pub fn payment_stats_to_json(s: &PaymentStats) -> Value {
    json!({
        "invoice_id": s.invoice_id.to_string(),
        "invoice_reference": s.invoice_reference,
        "total_amount": amount(s.total_amount),
        "total_paid": amount(s.total_paid),
        "remaining": amount(s.remaining),
        "percent_paid": amount(s.percent_paid),
        "payment_count": s.payment_count,
        "is_paid": s.is_paid,
    })
}

pub fn client_to_json(c: &Client) -> Value {
    json!({
        "id": c.id.to_string(),
        "name": c.name,
        "phone": c.contact.phone,
        "email": c.contact.email,
        "address": c.contact.address,
        "notes": c.notes,
        "created_at": c.created_at.to_rfc3339(),
        "updated_at": c.updated_at.to_rfc3339(),
    })
}

pub fn client_balance_to_json(b: &ClientBalance) -> Value {
    json!({
        "client_id": b.client_id.to_string(),
        "summary": {
            "total_invoiced": amount(b.summary.total_invoiced),
            "total_paid": amount(b.summary.total_paid),
            "outstanding_balance": amount(b.summary.outstanding_balance),
            "pending_devis_total": amount(b.summary.pending_devis_total),
        },
        "invoices": b.invoices.iter().map(|i| json!({
            "invoice_id": i.invoice_id.to_string(),
            "reference": i.reference,
            "total_amount": amount(i.total_amount),
            "paid_amount": amount(i.paid_amount),
            "balance": amount(i.balance),
            "devis_count": i.devis_count,
            "created_at": i.created_at.to_rfc3339(),
            "payments": i.payments.iter().map(payment_to_json).collect::<Vec<_>>(),
        })).collect::<Vec<_>>(),
        "pending_devis": b.pending_devis.iter().map(|d| json!({
            "devis_id": d.devis_id.to_string(),
            "reference": d.reference,
            "status": d.status.as_str(),
            "total_amount": amount(d.total_amount),
            "created_at": d.created_at.to_rfc3339(),
        })).collect::<Vec<_>>(),
    })
}

pub fn machine_pricing_to_json(p: &MachinePricing) -> Value {
    json!({
        "machine_type": p.machine_type.as_str(),
        "measure": p.machine_type.measure().field(),
        "price_per_unit": amount(p.price_per_unit),
        "description": p.description,
        "updated_at": p.updated_at.to_rfc3339(),
    })
}

pub fn material_to_json(m: &Material) -> Value {
    json!({
        "id": m.id.to_string(),
        "name": m.name,
        "price_per_unit": amount(m.price_per_unit),
        "unit": m.unit,
        "description": m.description,
        "active": m.active,
        "created_at": m.created_at.to_rfc3339(),
    })
}

pub fn fixed_service_to_json(s: &FixedService) -> Value {
    json!({
        "id": s.id.to_string(),
        "name": s.name,
        "price": amount(s.price),
        "description": s.description,
        "active": s.active,
        "created_at": s.created_at.to_rfc3339(),
    })
}

pub fn notification_to_json(n: &Notification) -> Value {
    json!({
        "id": n.id.to_string(),
        "kind": n.kind.topic(),
        "title": n.title,
        "message": n.message,
        "entity_type": n.entity_type,
        "entity_id": n.entity_id,
        "triggered_by": n.triggered_by.map(|u| u.to_string()),
        "occurred_at": n.occurred_at.to_rfc3339(),
        "is_read": n.is_read,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    #[test]
    fn amounts_render_with_two_decimals() {
        let material = Material {
            id: MaterialId::new(),
            name: "MDF 18mm".to_string(),
            price_per_unit: dec!(12.5),
            unit: "m2".to_string(),
            description: None,
            active: true,
            created_at: Utc::now(),
        };
        assert_eq!(material_to_json(&material)["price_per_unit"], "12.50");
    }

    #[test]
    fn line_request_requires_known_machine() {
        let req = LineRequest {
            machine_type: "PLASMA".to_string(),
            minutes: Some(dec!(10)),
            meters: None,
            quantity: None,
            material_id: None,
            description: None,
        };
        assert_eq!(req.to_input().unwrap_err().status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn plain_dates_cover_the_whole_day() {
        let query = ListDevisQuery {
            date_from: Some("2026-03-01".to_string()),
            date_to: Some("2026-03-31".to_string()),
            ..ListDevisQuery::default()
        }
        .into_query()
        .unwrap();
        assert_eq!(query.date_from, Some(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()));
        assert!(query.date_to.unwrap() > Utc.with_ymd_and_hms(2026, 3, 31, 23, 59, 59).unwrap());
    }

    #[test]
    fn garbage_status_is_rejected() {
        let query = ListDevisQuery {
            status: Some("SHIPPED".to_string()),
            ..ListDevisQuery::default()
        };
        assert!(query.into_query().is_err());
    }

    #[test]
    fn expense_query_drops_blank_category_and_covers_whole_days() {
        let filter = ExpenseQuery {
            category: Some("  ".to_string()),
            date_from: Some("2026-03-01".to_string()),
            date_to: Some("2026-03-31".to_string()),
        }
        .into_filter()
        .unwrap();
        assert_eq!(filter.category, None);
        assert_eq!(filter.date_from, Some(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()));
        assert!(filter.date_to.unwrap() > Utc.with_ymd_and_hms(2026, 3, 31, 23, 59, 59).unwrap());

        let bad = ExpenseQuery {
            date_from: Some("last week".to_string()),
            ..ExpenseQuery::default()
        };
        assert!(bad.into_filter().is_err());
    }

    #[test]
    fn expense_stats_render_amounts_per_category() {
        let mut stats = ExpenseStats {
            total_amount: dec!(150.5),
            count: 2,
            ..ExpenseStats::default()
        };
        stats.by_category.insert("Loyer".to_string(), dec!(100));
        stats.by_category.insert("Matières".to_string(), dec!(50.5));

        let json = expense_stats_to_json(&stats);
        assert_eq!(json["total_amount"], "150.50");
        assert_eq!(json["count"], 2);
        assert_eq!(json["by_category"]["Loyer"], "100.00");
        assert_eq!(json["by_category"]["Matières"], "50.50");
    }
}
