use std::sync::Arc;

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use fabdesk_auth::require_admin;

use crate::app::errors;
use crate::app::services::{self, AppServices};
use crate::context::ActorContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(ctx): Extension<ActorContext>) -> impl IntoResponse {
    let actor = ctx.actor();
    Json(serde_json::json!({
        "user_id": actor.user_id.to_string(),
        "role": actor.role.as_str(),
        "allowed_machines": actor.allowed_machines.iter().map(|m| m.as_str()).collect::<Vec<_>>(),
    }))
}

/// Live notifications as server-sent events. Admins only.
pub async fn stream(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
) -> Response {
    if let Err(e) = require_admin(ctx.actor()) {
        return errors::domain_error_to_response(e.into());
    }
    services::notification_sse_stream(services).into_response()
}
