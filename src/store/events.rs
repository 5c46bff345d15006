//! Tracking event repository. Events are append-only; dedup key is
//! `(shipment_id, timestamp, description)` (base spec §3, §8 invariant 1).

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::TrackingEvent;
use crate::store::StoreError;

pub async fn get_by_shipment_id(
    pool: &PgPool,
    shipment_id: i32,
) -> Result<Vec<TrackingEvent>, StoreError> {
    sqlx::query_as::<_, TrackingEvent>(
        "SELECT * FROM tracking_events WHERE shipment_id = $1 ORDER BY timestamp ASC, id ASC",
    )
    .bind(shipment_id)
    .fetch_all(pool)
    .await
    .map_err(StoreError::Db)
}

/// Inserts an event, first checking the dedup key inside a transaction; a
/// duplicate is silently skipped and treated as success (base spec §4.1).
pub async fn create_event(
    pool: &PgPool,
    shipment_id: i32,
    timestamp: DateTime<Utc>,
    location: Option<&str>,
    status: &str,
    description: &str,
) -> Result<(), StoreError> {
    let mut tx = pool.begin().await.map_err(StoreError::Db)?;
    create_event_tx(&mut tx, shipment_id, timestamp, location, status, description).await?;
    tx.commit().await.map_err(StoreError::Db)?;
    Ok(())
}

pub async fn create_event_tx(
    tx: &mut Transaction<'_, Postgres>,
    shipment_id: i32,
    timestamp: DateTime<Utc>,
    location: Option<&str>,
    status: &str,
    description: &str,
) -> Result<bool, StoreError> {
    let existing: Option<(i32,)> = sqlx::query_as(
        "SELECT id FROM tracking_events WHERE shipment_id = $1 AND timestamp = $2 AND description = $3",
    )
    .bind(shipment_id)
    .bind(timestamp)
    .bind(description)
    .fetch_optional(&mut **tx)
    .await
    .map_err(StoreError::Db)?;

    if existing.is_some() {
        return Ok(false);
    }

    sqlx::query(
        r#"
        INSERT INTO tracking_events (shipment_id, timestamp, location, status, description)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(shipment_id)
    .bind(timestamp)
    .bind(location)
    .bind(status)
    .bind(description)
    .execute(&mut **tx)
    .await
    .map_err(StoreError::Db)?;

    Ok(true)
}
