//! Postgres-backed store.
//!
//! Every table keeps the columns queries filter or sort on, plus a JSONB
//! `data` column holding the full serialized record. Quotes are stored with
//! their lines and services in one row, so saving a quote and recomputing its
//! total is a single statement.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (foreign key violation) | `23503` | `Conflict` |
//! | Database (other) | Any other | `Backend` |
//! | Decode / ColumnNotFound | N/A | `Corrupt` |
//! | Other | N/A | `Backend` |

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use fabdesk_clients::Client;
use fabdesk_core::{
    ClientId, DevisId, ExpenseId, FixedServiceId, InvoiceId, MachineType, MaterialId, PaymentId,
    ReferenceKind,
};
use fabdesk_expenses::{Expense, ExpenseFilter};
use fabdesk_invoicing::{Invoice, Payment};
use fabdesk_pricing::{FixedService, MachinePricing, Material};
use fabdesk_quotes::{Devis, DevisFilter, DevisRecord};

use super::{Store, StoreError, StoreResult, StoreTx};

/// Idempotent schema, applied by [`PostgresStore::migrate`].
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS machine_pricing (
    machine_type TEXT PRIMARY KEY,
    data JSONB NOT NULL
);

CREATE TABLE IF NOT EXISTS materials (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    active BOOLEAN NOT NULL,
    data JSONB NOT NULL
);

CREATE TABLE IF NOT EXISTS fixed_services (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    active BOOLEAN NOT NULL,
    data JSONB NOT NULL
);

CREATE TABLE IF NOT EXISTS clients (
    id UUID PRIMARY KEY,
    created_at TIMESTAMPTZ NOT NULL,
    data JSONB NOT NULL
);

CREATE TABLE IF NOT EXISTS devis (
    id UUID PRIMARY KEY,
    reference TEXT NOT NULL UNIQUE,
    client_id UUID NOT NULL REFERENCES clients (id),
    created_by UUID NOT NULL,
    status TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    data JSONB NOT NULL
);

CREATE INDEX IF NOT EXISTS devis_client_idx ON devis (client_id);
CREATE INDEX IF NOT EXISTS devis_created_by_idx ON devis (created_by);

CREATE TABLE IF NOT EXISTS invoices (
    id UUID PRIMARY KEY,
    reference TEXT NOT NULL UNIQUE,
    client_id UUID NOT NULL REFERENCES clients (id),
    created_at TIMESTAMPTZ NOT NULL,
    data JSONB NOT NULL
);

CREATE INDEX IF NOT EXISTS invoices_client_idx ON invoices (client_id);

CREATE TABLE IF NOT EXISTS payments (
    id UUID PRIMARY KEY,
    invoice_id UUID NOT NULL REFERENCES invoices (id),
    payment_date TIMESTAMPTZ NOT NULL,
    data JSONB NOT NULL
);

CREATE INDEX IF NOT EXISTS payments_invoice_idx ON payments (invoice_id);

CREATE TABLE IF NOT EXISTS expenses (
    id UUID PRIMARY KEY,
    category TEXT NOT NULL,
    expense_date TIMESTAMPTZ NOT NULL,
    data JSONB NOT NULL
);

CREATE INDEX IF NOT EXISTS expenses_date_idx ON expenses (expense_date);
"#;

/// Postgres-backed store. Cheap to clone (the pool is shared).
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and return a store; does not touch the schema.
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create missing tables and indexes.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;
        Ok(Box::new(PostgresTx { tx }))
    }
}

/// One SQL transaction. Dropping it without commit rolls back.
struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

fn decode<T: DeserializeOwned>(row: &PgRow) -> StoreResult<T> {
    let Json(value) = row
        .try_get::<Json<T>, _>("data")
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;
    Ok(value)
}

fn decode_all<T: DeserializeOwned>(rows: &[PgRow]) -> StoreResult<Vec<T>> {
    rows.iter().map(decode).collect()
}

fn json<T: Serialize>(value: &T) -> Json<&T> {
    Json(value)
}

impl PostgresTx {
    async fn fetch_one_data<T: DeserializeOwned + Send>(
        &mut self,
        operation: &str,
        sql: &str,
        id: Uuid,
    ) -> StoreResult<Option<T>> {
        let row = sqlx::query(sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        row.as_ref().map(decode).transpose()
    }

    async fn delete_by_id(&mut self, operation: &str, sql: &str, id: Uuid) -> StoreResult<()> {
        sqlx::query(sql)
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        Ok(())
    }
}

#[async_trait]
impl StoreTx for PostgresTx {
    #[instrument(skip(self), err)]
    async fn machine_pricing(&mut self, machine_type: MachineType) -> StoreResult<Option<MachinePricing>> {
        let row = sqlx::query("SELECT data FROM machine_pricing WHERE machine_type = $1")
            .bind(machine_type.as_str())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("machine_pricing", e))?;
        row.as_ref().map(decode).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_machine_pricing(&mut self) -> StoreResult<Vec<MachinePricing>> {
        let rows = sqlx::query("SELECT data FROM machine_pricing")
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("list_machine_pricing", e))?;
        let mut pricing: Vec<MachinePricing> = decode_all(&rows)?;
        pricing.sort_by_key(|p| p.machine_type);
        Ok(pricing)
    }

    #[instrument(skip(self, pricing), fields(machine_type = %pricing.machine_type), err)]
    async fn save_machine_pricing(&mut self, pricing: &MachinePricing) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO machine_pricing (machine_type, data)
            VALUES ($1, $2)
            ON CONFLICT (machine_type) DO UPDATE SET data = EXCLUDED.data
            "#,
        )
        .bind(pricing.machine_type.as_str())
        .bind(json(pricing))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_machine_pricing", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn material(&mut self, id: MaterialId) -> StoreResult<Option<Material>> {
        self.fetch_one_data("material", "SELECT data FROM materials WHERE id = $1", *id.as_uuid())
            .await
    }

    #[instrument(skip(self), err)]
    async fn list_materials(&mut self, active_only: bool) -> StoreResult<Vec<Material>> {
        let rows = sqlx::query("SELECT data FROM materials WHERE ($1 = FALSE OR active) ORDER BY name ASC")
            .bind(active_only)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("list_materials", e))?;
        decode_all(&rows)
    }

    #[instrument(skip(self, material), fields(material_id = %material.id), err)]
    async fn save_material(&mut self, material: &Material) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO materials (id, name, active, data)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, active = EXCLUDED.active, data = EXCLUDED.data
            "#,
        )
        .bind(material.id.as_uuid())
        .bind(&material.name)
        .bind(material.active)
        .bind(json(material))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_material", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn fixed_service(&mut self, id: FixedServiceId) -> StoreResult<Option<FixedService>> {
        self.fetch_one_data(
            "fixed_service",
            "SELECT data FROM fixed_services WHERE id = $1",
            *id.as_uuid(),
        )
        .await
    }

    #[instrument(skip(self), err)]
    async fn list_fixed_services(&mut self, active_only: bool) -> StoreResult<Vec<FixedService>> {
        let rows =
            sqlx::query("SELECT data FROM fixed_services WHERE ($1 = FALSE OR active) ORDER BY name ASC")
                .bind(active_only)
                .fetch_all(&mut *self.tx)
                .await
                .map_err(|e| map_sqlx_error("list_fixed_services", e))?;
        decode_all(&rows)
    }

    #[instrument(skip(self, service), fields(service_id = %service.id), err)]
    async fn save_fixed_service(&mut self, service: &FixedService) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO fixed_services (id, name, active, data)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, active = EXCLUDED.active, data = EXCLUDED.data
            "#,
        )
        .bind(service.id.as_uuid())
        .bind(&service.name)
        .bind(service.active)
        .bind(json(service))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_fixed_service", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn client(&mut self, id: ClientId) -> StoreResult<Option<Client>> {
        self.fetch_one_data("client", "SELECT data FROM clients WHERE id = $1", *id.as_uuid())
            .await
    }

    #[instrument(skip(self), err)]
    async fn list_clients(&mut self) -> StoreResult<Vec<Client>> {
        let rows = sqlx::query("SELECT data FROM clients ORDER BY created_at DESC")
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("list_clients", e))?;
        decode_all(&rows)
    }

    #[instrument(skip(self, client), fields(client_id = %client.id), err)]
    async fn save_client(&mut self, client: &Client) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO clients (id, created_at, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET data = EXCLUDED.data
            "#,
        )
        .bind(client.id.as_uuid())
        .bind(client.created_at)
        .bind(json(client))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_client", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn delete_client(&mut self, id: ClientId) -> StoreResult<()> {
        self.delete_by_id("delete_client", "DELETE FROM clients WHERE id = $1", *id.as_uuid())
            .await
    }

    #[instrument(skip(self), err)]
    async fn devis(&mut self, id: DevisId) -> StoreResult<Option<Devis>> {
        let record: Option<DevisRecord> = self
            .fetch_one_data("devis", "SELECT data FROM devis WHERE id = $1 FOR UPDATE", *id.as_uuid())
            .await?;
        Ok(record.map(Devis::from))
    }

    #[instrument(skip(self), err)]
    async fn list_devis(&mut self, filter: &DevisFilter) -> StoreResult<Vec<Devis>> {
        let rows = sqlx::query(
            r#"
            SELECT data FROM devis
            WHERE ($1::uuid IS NULL OR client_id = $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR created_by = $3)
              AND ($4::timestamptz IS NULL OR created_at >= $4)
              AND ($5::timestamptz IS NULL OR created_at <= $5)
            ORDER BY created_at DESC
            "#,
        )
        .bind(filter.client_id.map(Uuid::from))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.created_by.map(Uuid::from))
        .bind(filter.date_from)
        .bind(filter.date_to)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_devis", e))?;
        let records: Vec<DevisRecord> = decode_all(&rows)?;
        Ok(records.into_iter().map(Devis::from).collect())
    }

    #[instrument(skip(self), err)]
    async fn count_devis_for_client(&mut self, client_id: ClientId) -> StoreResult<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM devis WHERE client_id = $1")
            .bind(client_id.as_uuid())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("count_devis_for_client", e))?;
        usize::try_from(count).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    #[instrument(skip(self, devis), fields(devis_id = %devis.id_typed(), reference = %devis.reference()), err)]
    async fn save_devis(&mut self, devis: &Devis) -> StoreResult<()> {
        let record = devis.to_record();
        sqlx::query(
            r#"
            INSERT INTO devis (id, reference, client_id, created_by, status, created_at, data)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE
            SET status = EXCLUDED.status, data = EXCLUDED.data
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(&record.reference)
        .bind(record.client_id.as_uuid())
        .bind(record.created_by.as_uuid())
        .bind(record.status.as_str())
        .bind(record.created_at)
        .bind(json(&record))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_devis", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn delete_devis(&mut self, id: DevisId) -> StoreResult<()> {
        self.delete_by_id("delete_devis", "DELETE FROM devis WHERE id = $1", *id.as_uuid())
            .await
    }

    #[instrument(skip(self), err)]
    async fn invoice(&mut self, id: InvoiceId) -> StoreResult<Option<Invoice>> {
        self.fetch_one_data(
            "invoice",
            "SELECT data FROM invoices WHERE id = $1 FOR UPDATE",
            *id.as_uuid(),
        )
        .await
    }

    #[instrument(skip(self), err)]
    async fn list_invoices(&mut self, client_id: Option<ClientId>) -> StoreResult<Vec<Invoice>> {
        let rows = sqlx::query(
            r#"
            SELECT data FROM invoices
            WHERE ($1::uuid IS NULL OR client_id = $1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(client_id.map(Uuid::from))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_invoices", e))?;
        decode_all(&rows)
    }

    #[instrument(skip(self, invoice), fields(invoice_id = %invoice.id, reference = %invoice.reference), err)]
    async fn insert_invoice(&mut self, invoice: &Invoice) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO invoices (id, reference, client_id, created_at, data)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(invoice.id.as_uuid())
        .bind(&invoice.reference)
        .bind(invoice.client_id.as_uuid())
        .bind(invoice.created_at)
        .bind(json(invoice))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_invoice", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn delete_invoice(&mut self, id: InvoiceId) -> StoreResult<()> {
        self.delete_by_id("delete_invoice", "DELETE FROM invoices WHERE id = $1", *id.as_uuid())
            .await
    }

    #[instrument(skip(self), err)]
    async fn payment(&mut self, id: PaymentId) -> StoreResult<Option<Payment>> {
        self.fetch_one_data("payment", "SELECT data FROM payments WHERE id = $1", *id.as_uuid())
            .await
    }

    #[instrument(skip(self), err)]
    async fn payments_for_invoice(&mut self, invoice_id: InvoiceId) -> StoreResult<Vec<Payment>> {
        let rows = sqlx::query("SELECT data FROM payments WHERE invoice_id = $1 ORDER BY payment_date DESC")
            .bind(invoice_id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("payments_for_invoice", e))?;
        decode_all(&rows)
    }

    #[instrument(skip(self, payment), fields(payment_id = %payment.id, invoice_id = %payment.invoice_id), err)]
    async fn save_payment(&mut self, payment: &Payment) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (id, invoice_id, payment_date, data)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET payment_date = EXCLUDED.payment_date, data = EXCLUDED.data
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.invoice_id.as_uuid())
        .bind(payment.payment_date)
        .bind(json(payment))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_payment", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn delete_payment(&mut self, id: PaymentId) -> StoreResult<()> {
        self.delete_by_id("delete_payment", "DELETE FROM payments WHERE id = $1", *id.as_uuid())
            .await
    }

    #[instrument(skip(self), err)]
    async fn expense(&mut self, id: ExpenseId) -> StoreResult<Option<Expense>> {
        self.fetch_one_data("expense", "SELECT data FROM expenses WHERE id = $1", *id.as_uuid())
            .await
    }

    #[instrument(skip(self), err)]
    async fn list_expenses(&mut self, filter: &ExpenseFilter) -> StoreResult<Vec<Expense>> {
        let rows = sqlx::query(
            r#"
            SELECT data FROM expenses
            WHERE ($1::text IS NULL OR category = $1)
              AND ($2::timestamptz IS NULL OR expense_date >= $2)
              AND ($3::timestamptz IS NULL OR expense_date <= $3)
            ORDER BY expense_date DESC
            "#,
        )
        .bind(filter.category.as_deref())
        .bind(filter.date_from)
        .bind(filter.date_to)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_expenses", e))?;
        decode_all(&rows)
    }

    #[instrument(skip(self, expense), fields(expense_id = %expense.id), err)]
    async fn save_expense(&mut self, expense: &Expense) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO expenses (id, category, expense_date, data)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET category = EXCLUDED.category, expense_date = EXCLUDED.expense_date, data = EXCLUDED.data
            "#,
        )
        .bind(expense.id.as_uuid())
        .bind(&expense.category)
        .bind(expense.date)
        .bind(json(expense))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_expense", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn delete_expense(&mut self, id: ExpenseId) -> StoreResult<()> {
        self.delete_by_id("delete_expense", "DELETE FROM expenses WHERE id = $1", *id.as_uuid())
            .await
    }

    #[instrument(skip(self), err)]
    async fn issued_references(&mut self, kind: ReferenceKind, year: i32) -> StoreResult<Vec<String>> {
        let prefix = kind.year_prefix(year);

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&prefix)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("issued_references", e))?;

        let sql = match kind {
            ReferenceKind::Devis => "SELECT reference FROM devis WHERE starts_with(reference, $1)",
            ReferenceKind::Invoice => "SELECT reference FROM invoices WHERE starts_with(reference, $1)",
        };
        sqlx::query_scalar::<_, String>(sql)
            .bind(&prefix)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("issued_references", e))
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("23503") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            StoreError::Corrupt(format!("decode error in {}: {}", operation, err))
        }
        sqlx::Error::PoolClosed => StoreError::Backend(format!("connection pool closed in {}", operation)),
        other => StoreError::Backend(format!("{} failed: {}", operation, other)),
    }
}
