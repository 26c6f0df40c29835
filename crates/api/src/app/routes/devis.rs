use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::Response,
    routing::{delete, get, post, put},
};

use fabdesk_core::{DevisId, DevisLineId, DevisServiceId};

use crate::app::routes::common::{no_content, respond, respond_list};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_devis).get(list_devis))
        .route("/calculate", post(calculate))
        .route("/:id", get(get_devis).delete(delete_devis))
        .route("/:id/lines", post(add_line))
        .route("/:id/lines/:line_id", delete(remove_line))
        .route("/:id/services", post(add_service))
        .route("/:id/services/:entry_id", delete(remove_service))
        .route("/:id/notes", put(update_notes))
        .route("/:id/validate", post(validate_devis))
        .route("/:id/cancel", post(cancel_devis))
}

pub async fn create_devis(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Json(body): Json<dto::CreateDevisRequest>,
) -> Response {
    let new = match body.into_new() {
        Ok(v) => v,
        Err(r) => return r,
    };
    let result = services.office.create_devis(ctx.actor(), new).await;
    respond(result, StatusCode::CREATED, dto::devis_to_json)
}

pub async fn list_devis(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Query(query): Query<dto::ListDevisQuery>,
) -> Response {
    let query = match query.into_query() {
        Ok(v) => v,
        Err(r) => return r,
    };
    respond_list(services.office.list_devis(ctx.actor(), query).await, dto::devis_to_json)
}

/// Price a line without touching any quote.
pub async fn calculate(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Json(body): Json<dto::LineRequest>,
) -> Response {
    let input = match body.to_input() {
        Ok(v) => v,
        Err(r) => return r,
    };
    let result = services.office.calculate(ctx.actor(), &input).await;
    respond(result, StatusCode::OK, dto::priced_line_to_json)
}

pub async fn get_devis(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let id = match errors::parse::<DevisId>(&id) {
        Ok(v) => v,
        Err(r) => return r,
    };
    respond(services.office.get_devis(ctx.actor(), id).await, StatusCode::OK, dto::devis_to_json)
}

pub async fn delete_devis(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let id = match errors::parse::<DevisId>(&id) {
        Ok(v) => v,
        Err(r) => return r,
    };
    no_content(services.office.delete_devis(ctx.actor(), id).await)
}

pub async fn add_line(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::LineRequest>,
) -> Response {
    let (id, line) = match (errors::parse::<DevisId>(&id), body.into_new_line()) {
        (Ok(id), Ok(line)) => (id, line),
        (Err(r), _) | (_, Err(r)) => return r,
    };
    let result = services.office.add_line(ctx.actor(), id, line).await;
    respond(result, StatusCode::CREATED, dto::devis_to_json)
}

pub async fn remove_line(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path((id, line_id)): Path<(String, String)>,
) -> Response {
    let (id, line_id) = match (errors::parse::<DevisId>(&id), errors::parse::<DevisLineId>(&line_id)) {
        (Ok(id), Ok(line_id)) => (id, line_id),
        (Err(r), _) | (_, Err(r)) => return r,
    };
    let result = services.office.remove_line(ctx.actor(), id, line_id).await;
    respond(result, StatusCode::OK, dto::devis_to_json)
}

pub async fn add_service(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AddServiceRequest>,
) -> Response {
    let (id, service_id) = match (errors::parse::<DevisId>(&id), body.service_id()) {
        (Ok(id), Ok(service_id)) => (id, service_id),
        (Err(r), _) | (_, Err(r)) => return r,
    };
    let result = services.office.add_service(ctx.actor(), id, service_id).await;
    respond(result, StatusCode::CREATED, dto::devis_to_json)
}

pub async fn remove_service(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path((id, entry_id)): Path<(String, String)>,
) -> Response {
    let (id, entry_id) = match (errors::parse::<DevisId>(&id), errors::parse::<DevisServiceId>(&entry_id)) {
        (Ok(id), Ok(entry_id)) => (id, entry_id),
        (Err(r), _) | (_, Err(r)) => return r,
    };
    let result = services.office.remove_service(ctx.actor(), id, entry_id).await;
    respond(result, StatusCode::OK, dto::devis_to_json)
}

pub async fn update_notes(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateNotesRequest>,
) -> Response {
    let id = match errors::parse::<DevisId>(&id) {
        Ok(v) => v,
        Err(r) => return r,
    };
    let result = services.office.update_devis_notes(ctx.actor(), id, body.notes).await;
    respond(result, StatusCode::OK, dto::devis_to_json)
}

pub async fn validate_devis(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let id = match errors::parse::<DevisId>(&id) {
        Ok(v) => v,
        Err(r) => return r,
    };
    respond(services.office.validate_devis(ctx.actor(), id).await, StatusCode::OK, dto::devis_to_json)
}

pub async fn cancel_devis(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let id = match errors::parse::<DevisId>(&id) {
        Ok(v) => v,
        Err(r) => return r,
    };
    respond(services.office.cancel_devis(ctx.actor(), id).await, StatusCode::OK, dto::devis_to_json)
}
