//! Service-level tests against the in-memory store.
//!
//! Covers the whole back-office flow: quote → validation → invoice →
//! payments, with authorization and rollback checks along the way.

use std::sync::Arc;

use chrono::{Datelike, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use fabdesk_auth::Actor;
use fabdesk_clients::{ClientPatch, NewClient};
use fabdesk_core::{ClientId, DevisId, DomainError, MachineType, UserId};
use fabdesk_events::{InMemoryNotificationBus, NotificationKind};
use fabdesk_expenses::{ExpenseFilter, ExpensePatch, NewExpense};
use fabdesk_invoicing::{NewInvoiceItem, NewPayment, PaymentPatch};
use fabdesk_pricing::{LineInput, NewFixedService, NewMaterial};
use fabdesk_quotes::DevisStatus;

use crate::seed::seed_default_pricing;
use crate::service::{BackOffice, DevisQuery, NewDevis, NewLine, ServiceError};
use crate::store::InMemoryStore;

struct Harness {
    office: BackOffice,
    bus: Arc<InMemoryNotificationBus>,
    admin: Actor,
}

async fn setup() -> Harness {
    let store = Arc::new(InMemoryStore::new());
    seed_default_pricing(store.as_ref()).await.unwrap();
    let bus = Arc::new(InMemoryNotificationBus::new());
    let office = BackOffice::new(store, bus.clone());
    let admin = Actor::admin(UserId::new());

    // Panel price that makes round totals easy to build.
    office
        .set_machine_pricing(&admin, MachineType::Panneaux, dec!(5), None)
        .await
        .unwrap();

    Harness { office, bus, admin }
}

impl Harness {
    async fn client(&self, name: &str) -> ClientId {
        self.office
            .create_client(
                &self.admin,
                NewClient {
                    name: name.into(),
                    ..NewClient::default()
                },
            )
            .await
            .unwrap()
            .id
    }

    /// A quote made of panels, `total / 5` units.
    async fn quote(&self, actor: &Actor, client_id: ClientId, total: Decimal) -> DevisId {
        let devis = self
            .office
            .create_devis(actor, NewDevis { client_id, notes: None })
            .await
            .unwrap();
        self.office
            .add_line(actor, devis.id_typed(), panels(total / dec!(5)))
            .await
            .unwrap();
        devis.id_typed()
    }

    async fn validated_quote(&self, client_id: ClientId, total: Decimal) -> DevisId {
        let id = self.quote(&self.admin, client_id, total).await;
        self.office.validate_devis(&self.admin, id).await.unwrap();
        id
    }

    async fn status(&self, id: DevisId) -> DevisStatus {
        self.office.get_devis(&self.admin, id).await.unwrap().status()
    }
}

fn panels(quantity: Decimal) -> NewLine {
    NewLine {
        input: LineInput::new(MachineType::Panneaux).quantity(quantity),
        description: None,
    }
}

fn is_conflict(err: &ServiceError) -> bool {
    matches!(err, ServiceError::Domain(DomainError::StateConflict(_)))
}

fn is_validation(err: &ServiceError) -> bool {
    matches!(err, ServiceError::Domain(DomainError::Validation(_)))
}

fn is_unauthorized(err: &ServiceError) -> bool {
    matches!(err, ServiceError::Domain(DomainError::Unauthorized(_)))
}

fn is_not_found(err: &ServiceError) -> bool {
    matches!(err, ServiceError::Domain(DomainError::NotFound(_)))
}

#[tokio::test]
async fn quote_references_follow_the_year_sequence() {
    let h = setup().await;
    let client = h.client("Atelier Nord").await;
    let year = Utc::now().year();

    for n in 1..=3 {
        let devis = h
            .office
            .create_devis(&h.admin, NewDevis { client_id: client, notes: None })
            .await
            .unwrap();
        assert_eq!(devis.reference(), format!("DEV-{year}-{n:04}"));
        assert_eq!(devis.status(), DevisStatus::Draft);
    }
}

#[tokio::test]
async fn quote_for_unknown_client_is_not_found() {
    let h = setup().await;
    let err = h
        .office
        .create_devis(&h.admin, NewDevis { client_id: ClientId::new(), notes: None })
        .await
        .unwrap_err();
    assert!(is_not_found(&err));
}

#[tokio::test]
async fn lines_and_services_keep_the_total_in_sync() {
    let h = setup().await;
    let client = h.client("Atelier Nord").await;
    let devis = h
        .office
        .create_devis(&h.admin, NewDevis { client_id: client, notes: None })
        .await
        .unwrap();
    let id = devis.id_typed();

    let devis = h
        .office
        .add_line(
            &h.admin,
            id,
            NewLine {
                input: LineInput::new(MachineType::Cnc).minutes(dec!(30)),
                description: Some("Découpe MDF".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(devis.total_amount(), dec!(45.00));

    let assembly = h
        .office
        .create_fixed_service(
            &h.admin,
            NewFixedService {
                name: "Montage".into(),
                price: dec!(20),
                description: None,
            },
        )
        .await
        .unwrap();
    let devis = h.office.add_service(&h.admin, id, assembly.id).await.unwrap();
    assert_eq!(devis.total_amount(), dec!(65.00));

    let line_id = devis.lines()[0].id;
    let devis = h.office.remove_line(&h.admin, id, line_id).await.unwrap();
    assert_eq!(devis.total_amount(), dec!(20.00));
    assert_eq!(devis.total_amount(), devis.recompute_total());
}

#[tokio::test]
async fn validated_quote_is_frozen() {
    let h = setup().await;
    let client = h.client("Atelier Nord").await;
    let id = h.validated_quote(client, dec!(50)).await;

    let err = h.office.add_line(&h.admin, id, panels(dec!(1))).await.unwrap_err();
    assert!(is_conflict(&err));

    let err = h
        .office
        .update_devis_notes(&h.admin, id, Some("late change".into()))
        .await
        .unwrap_err();
    assert!(is_conflict(&err));
}

#[tokio::test]
async fn employee_is_limited_to_assigned_machines_and_own_quotes() {
    let h = setup().await;
    let client = h.client("Atelier Nord").await;
    let alice = Actor::employee(UserId::new(), [MachineType::Cnc]);
    let bob = Actor::employee(UserId::new(), [MachineType::Cnc, MachineType::Panneaux]);

    let id = h
        .office
        .create_devis(&alice, NewDevis { client_id: client, notes: None })
        .await
        .unwrap()
        .id_typed();

    let laser = NewLine {
        input: LineInput::new(MachineType::Laser).minutes(dec!(10)),
        description: None,
    };
    let err = h.office.add_line(&alice, id, laser).await.unwrap_err();
    assert!(is_unauthorized(&err));

    let cnc = NewLine {
        input: LineInput::new(MachineType::Cnc).minutes(dec!(10)),
        description: None,
    };
    assert!(h.office.add_line(&alice, id, cnc).await.is_ok());

    assert!(is_unauthorized(&h.office.get_devis(&bob, id).await.unwrap_err()));
    assert!(is_unauthorized(&h.office.validate_devis(&alice, id).await.unwrap_err()));

    h.quote(&bob, client, dec!(25)).await;
    let mine = h.office.list_devis(&alice, DevisQuery::default()).await.unwrap();
    assert_eq!(mine.len(), 1);
    let all = h.office.list_devis(&h.admin, DevisQuery::default()).await.unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn inactive_material_adds_no_cost() {
    let h = setup().await;
    let plexi = h
        .office
        .create_material(
            &h.admin,
            NewMaterial {
                name: "Plexiglas 3mm".into(),
                price_per_unit: dec!(12.50),
                unit: "plaque".into(),
                description: None,
            },
        )
        .await
        .unwrap();

    let input = LineInput::new(MachineType::Laser).minutes(dec!(10)).material(plexi.id);
    let priced = h.office.calculate(&h.admin, &input).await.unwrap();
    assert_eq!(priced.line_total, dec!(32.50));

    h.office.deactivate_material(&h.admin, plexi.id).await.unwrap();
    let priced = h.office.calculate(&h.admin, &input).await.unwrap();
    assert_eq!(priced.material_cost, Decimal::ZERO);
    assert_eq!(priced.line_total, dec!(20.00));
}

#[tokio::test]
async fn inactive_fixed_service_cannot_be_added() {
    let h = setup().await;
    let client = h.client("Atelier Nord").await;
    let id = h.quote(&h.admin, client, dec!(10)).await;
    let delivery = h
        .office
        .create_fixed_service(
            &h.admin,
            NewFixedService {
                name: "Livraison".into(),
                price: dec!(15),
                description: None,
            },
        )
        .await
        .unwrap();
    h.office
        .deactivate_fixed_service(&h.admin, delivery.id)
        .await
        .unwrap();

    let err = h.office.add_service(&h.admin, id, delivery.id).await.unwrap_err();
    assert!(is_not_found(&err));
}

#[tokio::test]
async fn three_quotes_consolidate_into_one_invoice() {
    let h = setup().await;
    let client = h.client("Atelier Nord").await;
    let ids = vec![
        h.validated_quote(client, dec!(95)).await,
        h.validated_quote(client, dec!(160)).await,
        h.validated_quote(client, dec!(200)).await,
    ];
    let events = h.bus.subscribe();

    let invoice = h.office.create_invoice_from_devis(&h.admin, &ids).await.unwrap();

    assert_eq!(invoice.total_amount, dec!(455));
    assert_eq!(invoice.reference, format!("INV-{}-0001", Utc::now().year()));
    for id in &ids {
        let devis = h.office.get_devis(&h.admin, *id).await.unwrap();
        assert_eq!(devis.status(), DevisStatus::Invoiced);
        assert_eq!(devis.invoice_id(), Some(invoice.id));
    }
    let kinds: Vec<NotificationKind> = events.drain().into_iter().map(|n| n.kind).collect();
    assert_eq!(kinds, vec![NotificationKind::InvoiceCreated]);
}

#[tokio::test]
async fn foreign_client_quote_aborts_consolidation() {
    let h = setup().await;
    let nord = h.client("Atelier Nord").await;
    let sud = h.client("Atelier Sud").await;
    let a = h.validated_quote(nord, dec!(95)).await;
    let b = h.validated_quote(sud, dec!(160)).await;

    let err = h
        .office
        .create_invoice_from_devis(&h.admin, &[a, b])
        .await
        .unwrap_err();
    assert!(is_validation(&err));

    assert_eq!(h.status(a).await, DevisStatus::Validated);
    assert_eq!(h.status(b).await, DevisStatus::Validated);
    assert!(h.office.list_invoices(&h.admin, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn draft_quote_cannot_be_invoiced() {
    let h = setup().await;
    let client = h.client("Atelier Nord").await;
    let draft = h.quote(&h.admin, client, dec!(95)).await;

    let err = h
        .office
        .create_invoice_from_devis(&h.admin, &[draft])
        .await
        .unwrap_err();
    assert!(is_validation(&err));
    assert_eq!(h.status(draft).await, DevisStatus::Draft);
}

#[tokio::test]
async fn invoiced_quote_cannot_be_cancelled() {
    let h = setup().await;
    let client = h.client("Atelier Nord").await;
    let id = h.validated_quote(client, dec!(95)).await;
    h.office.create_invoice_from_devis(&h.admin, &[id]).await.unwrap();

    let err = h.office.cancel_devis(&h.admin, id).await.unwrap_err();
    assert!(is_conflict(&err));
}

#[tokio::test]
async fn payments_never_exceed_the_invoice_total() {
    let h = setup().await;
    let client = h.client("Atelier Nord").await;
    let invoice = h
        .office
        .create_direct_invoice(
            &h.admin,
            client,
            vec![NewInvoiceItem {
                description: "Agencement boutique".into(),
                quantity: dec!(1),
                unit_price: dec!(300),
            }],
        )
        .await
        .unwrap();

    let pay = |amount: Decimal| NewPayment {
        amount,
        payment_date: None,
        method: Some("virement".into()),
        reference: None,
        notes: None,
    };

    let first = h.office.record_payment(&h.admin, invoice.id, pay(dec!(150))).await.unwrap();

    let err = h
        .office
        .record_payment(&h.admin, invoice.id, pay(dec!(200)))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ServiceError::Domain(DomainError::validation(
            "payment amount 200.00 exceeds remaining balance 150.00"
        ))
    );

    h.office.record_payment(&h.admin, invoice.id, pay(dec!(150))).await.unwrap();
    let stats = h.office.payment_stats(&h.admin, invoice.id).await.unwrap();
    assert_eq!(stats.remaining, Decimal::ZERO);
    assert_eq!(stats.percent_paid, dec!(100.00));
    assert!(stats.is_paid);

    let err = h
        .office
        .update_payment(
            &h.admin,
            first.id,
            PaymentPatch {
                amount: Some(dec!(151)),
                ..PaymentPatch::default()
            },
        )
        .await
        .unwrap_err();
    assert!(is_validation(&err));

    h.office.delete_payment(&h.admin, first.id).await.unwrap();
    let stats = h.office.payment_stats(&h.admin, invoice.id).await.unwrap();
    assert_eq!(stats.remaining, dec!(150));
    assert_eq!(stats.payment_count, 1);
}

#[tokio::test]
async fn sub_cent_payments_are_stored_to_the_cent() {
    let h = setup().await;
    let client = h.client("Atelier Nord").await;
    let invoice = h
        .office
        .create_direct_invoice(
            &h.admin,
            client,
            vec![NewInvoiceItem {
                description: "Découpe".into(),
                quantity: dec!(1),
                unit_price: dec!(100),
            }],
        )
        .await
        .unwrap();
    let pay = |amount: Decimal| NewPayment {
        amount,
        payment_date: None,
        method: None,
        reference: None,
        notes: None,
    };

    let payment = h.office.record_payment(&h.admin, invoice.id, pay(dec!(99.995))).await.unwrap();
    assert_eq!(payment.amount, dec!(100.00));

    let stats = h.office.payment_stats(&h.admin, invoice.id).await.unwrap();
    assert_eq!(stats.remaining, Decimal::ZERO);
    assert!(stats.is_paid);

    let err = h
        .office
        .record_payment(&h.admin, invoice.id, pay(dec!(0.005)))
        .await
        .unwrap_err();
    assert!(is_validation(&err));
}

#[tokio::test]
async fn deleting_an_invoice_reverts_its_quotes() {
    let h = setup().await;
    let client = h.client("Atelier Nord").await;
    let a = h.validated_quote(client, dec!(95)).await;
    let b = h.validated_quote(client, dec!(160)).await;
    let invoice = h.office.create_invoice_from_devis(&h.admin, &[a, b]).await.unwrap();

    let payment = h
        .office
        .record_payment(
            &h.admin,
            invoice.id,
            NewPayment {
                amount: dec!(10),
                payment_date: None,
                method: None,
                reference: None,
                notes: None,
            },
        )
        .await
        .unwrap();
    let err = h.office.delete_invoice(&h.admin, invoice.id).await.unwrap_err();
    assert!(is_conflict(&err));
    assert_eq!(h.status(a).await, DevisStatus::Invoiced);

    h.office.delete_payment(&h.admin, payment.id).await.unwrap();
    h.office.delete_invoice(&h.admin, invoice.id).await.unwrap();

    for id in [a, b] {
        let devis = h.office.get_devis(&h.admin, id).await.unwrap();
        assert_eq!(devis.status(), DevisStatus::Validated);
        assert_eq!(devis.invoice_id(), None);
    }
    let err = h.office.get_invoice(&h.admin, invoice.id).await.unwrap_err();
    assert!(is_not_found(&err));

    let again = h.office.create_invoice_from_devis(&h.admin, &[a]).await.unwrap();
    assert_eq!(again.total_amount, dec!(95));
}

#[tokio::test]
async fn invoices_and_payments_are_admin_only() {
    let h = setup().await;
    let client = h.client("Atelier Nord").await;
    let emp = Actor::employee(UserId::new(), MachineType::ALL);

    assert!(is_unauthorized(&h.office.list_invoices(&emp, None).await.unwrap_err()));
    let err = h
        .office
        .create_direct_invoice(&emp, client, vec![])
        .await
        .unwrap_err();
    assert!(is_unauthorized(&err));
    let err = h
        .office
        .set_machine_pricing(&emp, MachineType::Cnc, dec!(0), None)
        .await
        .unwrap_err();
    assert!(is_unauthorized(&err));
}

#[tokio::test]
async fn client_with_quotes_cannot_be_deleted() {
    let h = setup().await;
    let client = h.client("Atelier Nord").await;
    let id = h.quote(&h.admin, client, dec!(10)).await;

    let err = h.office.delete_client(&h.admin, client).await.unwrap_err();
    assert!(is_conflict(&err));

    h.office.delete_devis(&h.admin, id).await.unwrap();
    h.office.delete_client(&h.admin, client).await.unwrap();
    assert!(is_not_found(&h.office.get_client(&h.admin, client).await.unwrap_err()));
}

#[tokio::test]
async fn client_with_invoices_cannot_be_deleted() {
    let h = setup().await;
    let client = h.client("Atelier Nord").await;
    let invoice = h
        .office
        .create_direct_invoice(
            &h.admin,
            client,
            vec![NewInvoiceItem {
                description: "Enseigne".into(),
                quantity: dec!(1),
                unit_price: dec!(80),
            }],
        )
        .await
        .unwrap();

    let err = h.office.delete_client(&h.admin, client).await.unwrap_err();
    assert_eq!(
        err,
        ServiceError::Domain(DomainError::conflict("cannot delete client with 1 invoice(s)"))
    );
    assert_eq!(h.office.get_client(&h.admin, client).await.unwrap().id, client);

    h.office.delete_invoice(&h.admin, invoice.id).await.unwrap();
    h.office.delete_client(&h.admin, client).await.unwrap();
}

#[tokio::test]
async fn client_search_and_update() {
    let h = setup().await;
    let zeta = h.client("Zeta Bois").await;
    h.client("Alpha Bois").await;
    h.client("Menuiserie Centrale").await;

    h.office
        .update_client(
            &h.admin,
            zeta,
            ClientPatch {
                email: Some("zeta@bois.tn".into()),
                ..ClientPatch::default()
            },
        )
        .await
        .unwrap();

    let found = h.office.search_clients(&h.admin, "BOIS").await.unwrap();
    let names: Vec<&str> = found.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Alpha Bois", "Zeta Bois"]);

    let found = h.office.search_clients(&h.admin, "zeta@").await.unwrap();
    assert_eq!(found.len(), 1);
}

#[tokio::test]
async fn client_balance_tracks_invoices_payments_and_pending_quotes() {
    let h = setup().await;
    let client = h.client("Atelier Nord").await;
    let billed = h.validated_quote(client, dec!(200)).await;
    h.quote(&h.admin, client, dec!(40)).await;
    let invoice = h.office.create_invoice_from_devis(&h.admin, &[billed]).await.unwrap();
    h.office
        .record_payment(
            &h.admin,
            invoice.id,
            NewPayment {
                amount: dec!(50),
                payment_date: None,
                method: None,
                reference: None,
                notes: None,
            },
        )
        .await
        .unwrap();

    let balance = h.office.client_balance(&h.admin, client).await.unwrap();
    assert_eq!(balance.summary.total_invoiced, dec!(200));
    assert_eq!(balance.summary.total_paid, dec!(50));
    assert_eq!(balance.summary.outstanding_balance, dec!(150));
    assert_eq!(balance.summary.pending_devis_total, dec!(40));
    assert_eq!(balance.invoices[0].payments.len(), 1);
}

#[tokio::test]
async fn notifications_follow_committed_changes_only() {
    let h = setup().await;
    let events = h.bus.subscribe();
    let client = h.client("Atelier Nord").await;
    let id = h.validated_quote(client, dec!(95)).await;
    h.office.cancel_devis(&h.admin, id).await.unwrap();

    // Rejected: already cancelled, nothing emitted.
    assert!(h.office.cancel_devis(&h.admin, id).await.is_err());

    let kinds: Vec<NotificationKind> = events.drain().into_iter().map(|n| n.kind).collect();
    assert_eq!(
        kinds,
        vec![
            NotificationKind::ClientCreated,
            NotificationKind::DevisCreated,
            NotificationKind::DevisValidated,
            NotificationKind::DevisCancelled,
        ]
    );
}

fn new_expense(description: &str, category: &str, amount: Decimal) -> NewExpense {
    NewExpense {
        description: description.into(),
        amount,
        category: category.into(),
        date: None,
        reference: None,
        notes: None,
    }
}

#[tokio::test]
async fn expenses_are_tracked_by_category() {
    let h = setup().await;
    let events = h.bus.subscribe();

    let rent = h
        .office
        .create_expense(&h.admin, new_expense("Loyer atelier", "Loyer", dec!(800)))
        .await
        .unwrap();
    assert_eq!(rent.created_by, h.admin.user_id);
    h.office
        .create_expense(&h.admin, new_expense("Plaques MDF", "Matières", dec!(120.50)))
        .await
        .unwrap();
    let glue = h
        .office
        .create_expense(&h.admin, new_expense("Colle", "Matières", dec!(19.50)))
        .await
        .unwrap();

    let materials = h
        .office
        .list_expenses(
            &h.admin,
            ExpenseFilter {
                category: Some("Matières".into()),
                ..ExpenseFilter::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(materials.len(), 2);

    let updated = h
        .office
        .update_expense(
            &h.admin,
            glue.id,
            ExpensePatch {
                amount: Some(dec!(29.50)),
                ..ExpensePatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.amount, dec!(29.50));

    let stats = h.office.expense_stats(&h.admin, ExpenseFilter::default()).await.unwrap();
    assert_eq!(stats.total_amount, dec!(950));
    assert_eq!(stats.count, 3);
    assert_eq!(stats.by_category["Matières"], dec!(150));

    h.office.delete_expense(&h.admin, rent.id).await.unwrap();
    assert!(is_not_found(&h.office.get_expense(&h.admin, rent.id).await.unwrap_err()));
    assert!(is_not_found(&h.office.delete_expense(&h.admin, rent.id).await.unwrap_err()));

    let kinds: Vec<NotificationKind> = events.drain().into_iter().map(|n| n.kind).collect();
    assert_eq!(
        kinds,
        vec![
            NotificationKind::ExpenseCreated,
            NotificationKind::ExpenseCreated,
            NotificationKind::ExpenseCreated,
            NotificationKind::ExpenseDeleted,
        ]
    );
}

#[tokio::test]
async fn expenses_are_admin_only_and_validated() {
    let h = setup().await;
    let emp = Actor::employee(UserId::new(), MachineType::ALL);

    let err = h
        .office
        .create_expense(&emp, new_expense("Colle", "Matières", dec!(10)))
        .await
        .unwrap_err();
    assert!(is_unauthorized(&err));
    let err = h
        .office
        .list_expenses(&emp, ExpenseFilter::default())
        .await
        .unwrap_err();
    assert!(is_unauthorized(&err));

    let err = h
        .office
        .create_expense(&h.admin, new_expense("Colle", "Matières", dec!(0)))
        .await
        .unwrap_err();
    assert!(is_validation(&err));
    let stats = h.office.expense_stats(&h.admin, ExpenseFilter::default()).await.unwrap();
    assert_eq!(stats.count, 0);
}
