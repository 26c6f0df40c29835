//! Back-office notification inbox. Admins only.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, put},
};
use serde_json::json;

use fabdesk_auth::require_admin;
use fabdesk_core::{DomainError, NotificationId};
use fabdesk_events::Notification;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_notifications))
        .route("/unread", get(list_unread))
        .route("/count", get(unread_count))
        .route("/read-all", put(mark_all_read))
        .route("/:id/read", put(mark_read))
        .route("/:id", delete(delete_notification))
}

fn admin_only(ctx: &ActorContext) -> Result<(), Response> {
    require_admin(ctx.actor()).map_err(|e| errors::domain_error_to_response(e.into()))
}

fn items(notifications: &[Notification]) -> Response {
    let items = notifications.iter().map(dto::notification_to_json).collect::<Vec<_>>();
    (StatusCode::OK, Json(json!({ "items": items }))).into_response()
}

fn acknowledged(found: bool) -> Response {
    if found {
        StatusCode::NO_CONTENT.into_response()
    } else {
        errors::domain_error_to_response(DomainError::not_found("notification"))
    }
}

/// Most recent notifications, newest first.
pub async fn list_notifications(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
) -> Response {
    if let Err(r) = admin_only(&ctx) {
        return r;
    }
    items(&services.notifications().recent())
}

pub async fn list_unread(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
) -> Response {
    if let Err(r) = admin_only(&ctx) {
        return r;
    }
    items(&services.notifications().unread())
}

pub async fn unread_count(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
) -> Response {
    if let Err(r) = admin_only(&ctx) {
        return r;
    }
    let count = services.notifications().unread_count();
    (StatusCode::OK, Json(json!({ "unread": count }))).into_response()
}

pub async fn mark_all_read(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
) -> Response {
    if let Err(r) = admin_only(&ctx) {
        return r;
    }
    let updated = services.notifications().mark_all_read();
    (StatusCode::OK, Json(json!({ "updated": updated }))).into_response()
}

pub async fn mark_read(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(r) = admin_only(&ctx) {
        return r;
    }
    let id = match errors::parse::<NotificationId>(&id) {
        Ok(v) => v,
        Err(r) => return r,
    };
    acknowledged(services.notifications().mark_read(id))
}

pub async fn delete_notification(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(r) = admin_only(&ctx) {
        return r;
    }
    let id = match errors::parse::<NotificationId>(&id) {
        Ok(v) => v,
        Err(r) => return r,
    };
    acknowledged(services.notifications().remove(id))
}
