//! Admin surface (base spec §6): tracking-updater worker control and
//! on-demand description enhancement. Every handler requires `AdminUser`.

use std::collections::HashMap;
use std::sync::Arc;

use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use serde::Serialize;

use crate::admin_auth::AdminUser;
use crate::email::enhancer::{DescriptionEnhancer, EnhancementPreview};
use crate::error::ApiError;
use crate::models::{EnhanceDescriptionsRequest, WorkerStatus};
use crate::workers::WorkerHandle;

/// Every background worker the tracking-updater surface can pause/resume:
/// one auto-refresh supervisor per carrier, plus the email ingestor.
pub struct TrackingUpdaterHandles(pub Vec<(String, WorkerHandle)>);

#[derive(Debug, Serialize, JsonSchema)]
pub struct TrackingUpdaterStatus {
    pub workers: HashMap<String, WorkerStatus>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct EnhanceDescriptionsResponse {
    pub changed: Vec<EnhancementPreview>,
    pub dry_run: bool,
}

#[openapi(tag = "Admin")]
#[get("/admin/tracking-updater/status")]
pub async fn status(
    _admin: AdminUser,
    handles: &State<TrackingUpdaterHandles>,
) -> Json<TrackingUpdaterStatus> {
    let mut workers = HashMap::with_capacity(handles.0.len());
    for (name, handle) in &handles.0 {
        workers.insert(name.clone(), handle.status().await);
    }
    Json(TrackingUpdaterStatus { workers })
}

#[openapi(tag = "Admin")]
#[post("/admin/tracking-updater/pause")]
pub async fn pause(
    _admin: AdminUser,
    handles: &State<TrackingUpdaterHandles>,
) -> Json<MessageResponse> {
    for (_, handle) in &handles.0 {
        handle.pause();
    }
    Json(MessageResponse {
        message: "tracking updater paused".to_string(),
    })
}

#[openapi(tag = "Admin")]
#[post("/admin/tracking-updater/resume")]
pub async fn resume(
    _admin: AdminUser,
    handles: &State<TrackingUpdaterHandles>,
) -> Json<MessageResponse> {
    for (_, handle) in &handles.0 {
        handle.resume();
    }
    Json(MessageResponse {
        message: "tracking updater resumed".to_string(),
    })
}

#[openapi(tag = "Admin")]
#[post("/admin/enhance-descriptions", data = "<request>")]
pub async fn enhance_descriptions(
    _admin: AdminUser,
    enhancer: &State<Arc<DescriptionEnhancer>>,
    request: Json<EnhanceDescriptionsRequest>,
) -> Result<Json<EnhanceDescriptionsResponse>, ApiError> {
    let req = request.into_inner();
    let dry_run = req.dry_run.unwrap_or(false);

    if req.associate.unwrap_or(false) {
        enhancer.associate_emails_with_shipments().await?;
    }

    let changed = enhancer
        .enhance(req.shipment_id, req.limit.unwrap_or(0), dry_run)
        .await?;

    Ok(Json(EnhanceDescriptionsResponse { changed, dry_run }))
}
