use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::get,
};

use fabdesk_core::{InvoiceId, PaymentId};
use fabdesk_invoicing::{NewPayment, PaymentPatch};

use crate::app::routes::common::{no_content, respond, respond_list};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/invoice/:invoice_id", get(list_payments).post(record_payment))
        .route("/invoice/:invoice_id/stats", get(payment_stats))
        .route("/:id", get(get_payment).put(update_payment).delete(delete_payment))
}

pub async fn record_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(invoice_id): Path<String>,
    Json(body): Json<NewPayment>,
) -> Response {
    let invoice_id = match errors::parse::<InvoiceId>(&invoice_id) {
        Ok(v) => v,
        Err(r) => return r,
    };
    let result = services.office.record_payment(ctx.actor(), invoice_id, body).await;
    respond(result, StatusCode::CREATED, dto::payment_to_json)
}

pub async fn list_payments(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(invoice_id): Path<String>,
) -> Response {
    let invoice_id = match errors::parse::<InvoiceId>(&invoice_id) {
        Ok(v) => v,
        Err(r) => return r,
    };
    respond_list(
        services.office.list_payments(ctx.actor(), invoice_id).await,
        dto::payment_to_json,
    )
}

pub async fn payment_stats(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(invoice_id): Path<String>,
) -> Response {
    let invoice_id = match errors::parse::<InvoiceId>(&invoice_id) {
        Ok(v) => v,
        Err(r) => return r,
    };
    let result = services.office.payment_stats(ctx.actor(), invoice_id).await;
    respond(result, StatusCode::OK, dto::payment_stats_to_json)
}

pub async fn get_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let id = match errors::parse::<PaymentId>(&id) {
        Ok(v) => v,
        Err(r) => return r,
    };
    respond(services.office.get_payment(ctx.actor(), id).await, StatusCode::OK, dto::payment_to_json)
}

pub async fn update_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<PaymentPatch>,
) -> Response {
    let id = match errors::parse::<PaymentId>(&id) {
        Ok(v) => v,
        Err(r) => return r,
    };
    let result = services.office.update_payment(ctx.actor(), id, body).await;
    respond(result, StatusCode::OK, dto::payment_to_json)
}

pub async fn delete_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let id = match errors::parse::<PaymentId>(&id) {
        Ok(v) => v,
        Err(r) => return r,
    };
    no_content(services.office.delete_payment(ctx.actor(), id).await)
}
