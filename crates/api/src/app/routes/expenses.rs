use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::Response,
    routing::get,
};

use fabdesk_core::ExpenseId;
use fabdesk_expenses::{ExpensePatch, NewExpense};

use crate::app::routes::common::{no_content, respond, respond_list};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_expenses).post(create_expense))
        .route("/stats", get(expense_stats))
        .route("/:id", get(get_expense).put(update_expense).delete(delete_expense))
}

/// Filters: `?category=`, `?date_from=`, `?date_to=`.
pub async fn list_expenses(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Query(query): Query<dto::ExpenseQuery>,
) -> Response {
    let filter = match query.into_filter() {
        Ok(v) => v,
        Err(r) => return r,
    };
    respond_list(services.office.list_expenses(ctx.actor(), filter).await, dto::expense_to_json)
}

pub async fn expense_stats(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Query(query): Query<dto::ExpenseQuery>,
) -> Response {
    let mut filter = match query.into_filter() {
        Ok(v) => v,
        Err(r) => return r,
    };
    filter.category = None;
    let result = services.office.expense_stats(ctx.actor(), filter).await;
    respond(result, StatusCode::OK, dto::expense_stats_to_json)
}

pub async fn create_expense(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Json(body): Json<NewExpense>,
) -> Response {
    let result = services.office.create_expense(ctx.actor(), body).await;
    respond(result, StatusCode::CREATED, dto::expense_to_json)
}

pub async fn get_expense(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let id = match errors::parse::<ExpenseId>(&id) {
        Ok(v) => v,
        Err(r) => return r,
    };
    respond(services.office.get_expense(ctx.actor(), id).await, StatusCode::OK, dto::expense_to_json)
}

pub async fn update_expense(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<ExpensePatch>,
) -> Response {
    let id = match errors::parse::<ExpenseId>(&id) {
        Ok(v) => v,
        Err(r) => return r,
    };
    let result = services.office.update_expense(ctx.actor(), id, body).await;
    respond(result, StatusCode::OK, dto::expense_to_json)
}

pub async fn delete_expense(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let id = match errors::parse::<ExpenseId>(&id) {
        Ok(v) => v,
        Err(r) => return r,
    };
    no_content(services.office.delete_expense(ctx.actor(), id).await)
}
