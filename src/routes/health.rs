//! Liveness/readiness endpoint (base spec §6: `GET /api/health`).

use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket_db_pools::{sqlx, Connection};
use rocket_okapi::openapi;

use crate::db::TrackerDb;
use crate::models::HealthStatus;

#[openapi(tag = "Health")]
#[get("/health")]
pub async fn health(mut db: Connection<TrackerDb>) -> Custom<Json<HealthStatus>> {
    match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&mut **db).await {
        Ok(_) => Custom(
            Status::Ok,
            Json(HealthStatus {
                status: "healthy".to_string(),
                database: "up".to_string(),
                message: None,
            }),
        ),
        Err(e) => Custom(
            Status::ServiceUnavailable,
            Json(HealthStatus {
                status: "unhealthy".to_string(),
                database: "down".to_string(),
                message: Some(e.to_string()),
            }),
        ),
    }
}
