use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::Response,
    routing::{get, post},
};

use fabdesk_clients::{ClientPatch, NewClient};
use fabdesk_core::ClientId;

use crate::app::routes::common::{no_content, respond, respond_list};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_client).get(list_clients))
        .route("/:id", get(get_client).put(update_client).delete(delete_client))
        .route("/:id/balance", get(client_balance))
}

pub async fn create_client(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Json(body): Json<NewClient>,
) -> Response {
    let result = services.office.create_client(ctx.actor(), body).await;
    respond(result, StatusCode::CREATED, dto::client_to_json)
}

/// All clients (newest first), or a name/phone/email search when `?search=` is set.
pub async fn list_clients(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Query(query): Query<dto::SearchQuery>,
) -> Response {
    let result = match query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(term) => services.office.search_clients(ctx.actor(), term).await,
        None => services.office.list_clients(ctx.actor()).await,
    };
    respond_list(result, dto::client_to_json)
}

pub async fn get_client(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let id = match errors::parse::<ClientId>(&id) {
        Ok(v) => v,
        Err(r) => return r,
    };
    respond(services.office.get_client(ctx.actor(), id).await, StatusCode::OK, dto::client_to_json)
}

pub async fn update_client(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<ClientPatch>,
) -> Response {
    let id = match errors::parse::<ClientId>(&id) {
        Ok(v) => v,
        Err(r) => return r,
    };
    let result = services.office.update_client(ctx.actor(), id, body).await;
    respond(result, StatusCode::OK, dto::client_to_json)
}

pub async fn delete_client(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let id = match errors::parse::<ClientId>(&id) {
        Ok(v) => v,
        Err(r) => return r,
    };
    no_content(services.office.delete_client(ctx.actor(), id).await)
}

pub async fn client_balance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let id = match errors::parse::<ClientId>(&id) {
        Ok(v) => v,
        Err(r) => return r,
    };
    let result = services.office.client_balance(ctx.actor(), id).await;
    respond(result, StatusCode::OK, dto::client_balance_to_json)
}
