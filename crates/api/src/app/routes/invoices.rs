use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::Response,
    routing::{get, post},
};

use fabdesk_core::{ClientId, InvoiceId};

use crate::app::routes::common::{no_content, respond, respond_list};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_invoices))
        .route("/from-devis", post(create_from_devis))
        .route("/direct", post(create_direct))
        .route("/:id", get(get_invoice).delete(delete_invoice))
}

/// Consolidate validated quotes of one client into a single invoice.
pub async fn create_from_devis(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Json(body): Json<dto::InvoiceFromDevisRequest>,
) -> Response {
    let ids = match body.devis_ids() {
        Ok(v) => v,
        Err(r) => return r,
    };
    let result = services.office.create_invoice_from_devis(ctx.actor(), &ids).await;
    respond(result, StatusCode::CREATED, dto::invoice_to_json)
}

pub async fn create_direct(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Json(body): Json<dto::DirectInvoiceRequest>,
) -> Response {
    let client_id = match errors::parse::<ClientId>(&body.client_id) {
        Ok(v) => v,
        Err(r) => return r,
    };
    let result = services
        .office
        .create_direct_invoice(ctx.actor(), client_id, body.items)
        .await;
    respond(result, StatusCode::CREATED, dto::invoice_to_json)
}

pub async fn list_invoices(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Query(query): Query<dto::ClientFilterQuery>,
) -> Response {
    let client_id = match query.client_id() {
        Ok(v) => v,
        Err(r) => return r,
    };
    let result = services.office.list_invoices(ctx.actor(), client_id).await;
    respond_list(result, dto::invoice_overview_to_json)
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let id = match errors::parse::<InvoiceId>(&id) {
        Ok(v) => v,
        Err(r) => return r,
    };
    let result = services.office.get_invoice(ctx.actor(), id).await;
    respond(result, StatusCode::OK, dto::invoice_details_to_json)
}

/// Refused while payments exist; consolidated quotes go back to VALIDATED.
pub async fn delete_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let id = match errors::parse::<InvoiceId>(&id) {
        Ok(v) => v,
        Err(r) => return r,
    };
    no_content(services.office.delete_invoice(ctx.actor(), id).await)
}
