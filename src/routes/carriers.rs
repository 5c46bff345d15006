//! Carrier registry listing (base spec §6: `GET /api/carriers`).

use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use sqlx::PgPool;

use crate::error::ApiError;
use crate::models::Carrier;
use crate::store;

#[openapi(tag = "Carriers")]
#[get("/carriers?<active>")]
pub async fn list_carriers(
    pool: &State<PgPool>,
    active: Option<bool>,
) -> Result<Json<Vec<Carrier>>, ApiError> {
    let carriers = store::carriers::get_all(pool.inner(), active.unwrap_or(false)).await?;
    Ok(Json(carriers))
}
