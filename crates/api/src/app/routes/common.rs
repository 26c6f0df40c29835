use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use fabdesk_infra::ServiceResult;

use crate::app::errors;

/// Map a service result to `status` + JSON body, or to the error response.
pub fn respond<T>(result: ServiceResult<T>, status: StatusCode, to_json: impl FnOnce(&T) -> Value) -> Response {
    match result {
        Ok(value) => (status, Json(to_json(&value))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// `{ "items": [...] }` listing.
pub fn respond_list<T>(result: ServiceResult<Vec<T>>, to_json: impl Fn(&T) -> Value) -> Response {
    respond(result, StatusCode::OK, |items| {
        serde_json::json!({ "items": items.iter().map(to_json).collect::<Vec<_>>() })
    })
}

pub fn no_content(result: ServiceResult<()>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
