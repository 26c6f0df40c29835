use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::{get, put},
};

use fabdesk_core::{FixedServiceId, MachineType, MaterialId};
use fabdesk_pricing::{FixedServicePatch, MaterialPatch, NewFixedService, NewMaterial};

use crate::app::routes::common::{no_content, respond, respond_list};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/machines", get(list_machine_pricing))
        .route("/machines/mine", get(my_machines))
        .route("/machines/:machine_type", put(set_machine_pricing))
        .route("/materials", get(list_materials).post(create_material))
        .route("/materials/:id", put(update_material).delete(deactivate_material))
        .route("/services", get(list_fixed_services).post(create_fixed_service))
        .route("/services/:id", put(update_fixed_service).delete(deactivate_fixed_service))
}

pub async fn list_machine_pricing(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
) -> Response {
    respond_list(
        services.office.list_machine_pricing(ctx.actor()).await,
        dto::machine_pricing_to_json,
    )
}

/// Machines the caller may put on a quote, with their prices.
pub async fn my_machines(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
) -> Response {
    respond_list(
        services.office.authorized_machines(ctx.actor()).await,
        dto::machine_pricing_to_json,
    )
}

pub async fn set_machine_pricing(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(machine_type): Path<String>,
    Json(body): Json<dto::MachinePricingRequest>,
) -> Response {
    let machine_type = match errors::parse::<MachineType>(&machine_type) {
        Ok(v) => v,
        Err(r) => return r,
    };
    let result = services
        .office
        .set_machine_pricing(ctx.actor(), machine_type, body.price_per_unit, body.description)
        .await;
    respond(result, StatusCode::OK, dto::machine_pricing_to_json)
}

pub async fn list_materials(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
) -> Response {
    respond_list(services.office.list_materials(ctx.actor()).await, dto::material_to_json)
}

pub async fn create_material(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Json(body): Json<NewMaterial>,
) -> Response {
    let result = services.office.create_material(ctx.actor(), body).await;
    respond(result, StatusCode::CREATED, dto::material_to_json)
}

pub async fn update_material(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<MaterialPatch>,
) -> Response {
    let id = match errors::parse::<MaterialId>(&id) {
        Ok(v) => v,
        Err(r) => return r,
    };
    let result = services.office.update_material(ctx.actor(), id, body).await;
    respond(result, StatusCode::OK, dto::material_to_json)
}

pub async fn deactivate_material(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let id = match errors::parse::<MaterialId>(&id) {
        Ok(v) => v,
        Err(r) => return r,
    };
    no_content(services.office.deactivate_material(ctx.actor(), id).await)
}

pub async fn list_fixed_services(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
) -> Response {
    respond_list(
        services.office.list_fixed_services(ctx.actor()).await,
        dto::fixed_service_to_json,
    )
}

pub async fn create_fixed_service(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Json(body): Json<NewFixedService>,
) -> Response {
    let result = services.office.create_fixed_service(ctx.actor(), body).await;
    respond(result, StatusCode::CREATED, dto::fixed_service_to_json)
}

pub async fn update_fixed_service(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<FixedServicePatch>,
) -> Response {
    let id = match errors::parse::<FixedServiceId>(&id) {
        Ok(v) => v,
        Err(r) => return r,
    };
    let result = services.office.update_fixed_service(ctx.actor(), id, body).await;
    respond(result, StatusCode::OK, dto::fixed_service_to_json)
}

pub async fn deactivate_fixed_service(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Response {
    let id = match errors::parse::<FixedServiceId>(&id) {
        Ok(v) => v,
        Err(r) => return r,
    };
    no_content(services.office.deactivate_fixed_service(ctx.actor(), id).await)
}
