//! Shipment CRUD, event history, and refresh endpoints (base spec §6).

use std::sync::Arc;

use rocket::response::status::{Created, NoContent};
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use sqlx::PgPool;

use crate::cache::RefreshCache;
use crate::carriers::CarrierRegistry;
use crate::config::TrackerConfig;
use crate::error::ApiError;
use crate::models::{
    CreateShipmentRequest, ProcessedEmail, RefreshResponse, Shipment, TrackingEvent,
    UpdateShipmentRequest, VALID_CARRIER_CODES,
};
use crate::refresh::manual::refresh_shipment;
use crate::store;

#[openapi(tag = "Shipments")]
#[get("/shipments")]
pub async fn list_shipments(pool: &State<PgPool>) -> Result<Json<Vec<Shipment>>, ApiError> {
    let shipments = store::shipments::get_all(pool.inner()).await?;
    Ok(Json(shipments))
}

#[openapi(tag = "Shipments")]
#[post("/shipments", data = "<request>")]
pub async fn create_shipment(
    pool: &State<PgPool>,
    request: Json<CreateShipmentRequest>,
) -> Result<Created<Json<Shipment>>, ApiError> {
    let req = request.into_inner();

    if req.tracking_number.trim().is_empty() {
        return Err(ApiError::Validation("tracking_number must not be empty".to_string()));
    }
    if req.description.trim().is_empty() {
        return Err(ApiError::Validation("description must not be empty".to_string()));
    }
    if !VALID_CARRIER_CODES.contains(&req.carrier.as_str()) {
        return Err(ApiError::Validation(format!(
            "carrier must be one of {VALID_CARRIER_CODES:?}"
        )));
    }

    let shipment = store::shipments::create(pool.inner(), &req).await?;
    let location = format!("/api/shipments/{}", shipment.id);
    Ok(Created::new(location).body(Json(shipment)))
}

#[openapi(tag = "Shipments")]
#[get("/shipments/<id>")]
pub async fn get_shipment(pool: &State<PgPool>, id: i32) -> Result<Json<Shipment>, ApiError> {
    let shipment = store::shipments::get_by_id(pool.inner(), id).await?;
    Ok(Json(shipment))
}

#[openapi(tag = "Shipments")]
#[put("/shipments/<id>", data = "<request>")]
pub async fn update_shipment(
    pool: &State<PgPool>,
    cache: &State<Arc<RefreshCache>>,
    id: i32,
    request: Json<UpdateShipmentRequest>,
) -> Result<Json<Shipment>, ApiError> {
    let req = request.into_inner();
    let mut shipment = store::shipments::get_by_id(pool.inner(), id).await?;

    if let Some(description) = req.description {
        shipment.description = description;
    }
    if let Some(status) = req.status {
        shipment.status = status;
    }
    if let Some(auto_refresh_enabled) = req.auto_refresh_enabled {
        shipment.auto_refresh_enabled = auto_refresh_enabled;
    }
    if let Some(expected_delivery) = req.expected_delivery {
        shipment.expected_delivery = Some(expected_delivery);
    }

    let updated = store::shipments::update(pool.inner(), &shipment).await?;
    cache.delete(id).await?;

    Ok(Json(updated))
}

#[openapi(tag = "Shipments")]
#[delete("/shipments/<id>")]
pub async fn delete_shipment(
    pool: &State<PgPool>,
    cache: &State<Arc<RefreshCache>>,
    id: i32,
) -> Result<NoContent, ApiError> {
    store::shipments::delete(pool.inner(), id).await?;
    cache.delete(id).await?;
    Ok(NoContent)
}

#[openapi(tag = "Shipments")]
#[get("/shipments/<id>/events")]
pub async fn get_shipment_events(
    pool: &State<PgPool>,
    id: i32,
) -> Result<Json<Vec<TrackingEvent>>, ApiError> {
    store::shipments::get_by_id(pool.inner(), id).await?;
    let events = store::events::get_by_shipment_id(pool.inner(), id).await?;
    Ok(Json(events))
}

#[openapi(tag = "Shipments")]
#[get("/shipments/<id>/emails")]
pub async fn get_shipment_emails(
    pool: &State<PgPool>,
    id: i32,
) -> Result<Json<Vec<ProcessedEmail>>, ApiError> {
    let emails = store::emails::get_by_shipment_id(pool.inner(), id).await?;
    Ok(Json(emails))
}

#[openapi(tag = "Shipments")]
#[post("/shipments/<id>/refresh?<force>")]
pub async fn refresh(
    pool: &State<PgPool>,
    cache: &State<Arc<RefreshCache>>,
    registry: &State<Arc<CarrierRegistry>>,
    config: &State<TrackerConfig>,
    id: i32,
    force: Option<bool>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let response = refresh_shipment(
        pool.inner(),
        cache.inner(),
        registry.inner(),
        config.inner(),
        id,
        force.unwrap_or(false),
    )
    .await?;
    Ok(Json(response))
}
