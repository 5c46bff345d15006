//! Shipment repository (base spec §4.1, "Shipments:" operation list).

use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::{CreateShipmentRequest, Shipment, ShipmentStats};
use crate::store::StoreError;

/// The pattern `GetShipmentsWithPoorDescriptions` matches, spelled out in
/// base spec §9 ("Weak descriptions"): empty, exactly `"Package from "`, or
/// `"Package from <anything>"`.
const WEAK_DESCRIPTION_SQL: &str =
    "(description = '' OR description = 'Package from ' OR description LIKE 'Package from %')";

pub async fn create(pool: &PgPool, req: &CreateShipmentRequest) -> Result<Shipment, StoreError> {
    if req.tracking_number.trim().is_empty() {
        return Err(StoreError::Conflict("tracking_number must not be empty".into()));
    }

    let row = sqlx::query_as::<_, Shipment>(
        r#"
        INSERT INTO shipments (
            tracking_number, carrier, description, status, is_delivered,
            amazon_order_number, is_amazon_logistics
        )
        VALUES ($1, $2, $3, 'pending', false, $4, false)
        RETURNING *
        "#,
    )
    .bind(&req.tracking_number)
    .bind(&req.carrier)
    .bind(&req.description)
    .bind(&req.amazon_order_number)
    .fetch_one(pool)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            StoreError::Conflict(format!(
                "tracking number {} already exists",
                req.tracking_number
            ))
        }
        _ => StoreError::Db(e),
    })?;

    Ok(row)
}

pub async fn get_by_id(pool: &PgPool, id: i32) -> Result<Shipment, StoreError> {
    sqlx::query_as::<_, Shipment>("SELECT * FROM shipments WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(|e| StoreError::from_sqlx(e, format!("shipment {id} not found")))
}

pub async fn get_by_tracking_number(
    pool: &PgPool,
    tracking_number: &str,
) -> Result<Option<Shipment>, StoreError> {
    sqlx::query_as::<_, Shipment>("SELECT * FROM shipments WHERE tracking_number = $1")
        .bind(tracking_number)
        .fetch_optional(pool)
        .await
        .map_err(StoreError::Db)
}

pub async fn get_all(pool: &PgPool) -> Result<Vec<Shipment>, StoreError> {
    sqlx::query_as::<_, Shipment>("SELECT * FROM shipments ORDER BY created_at DESC")
        .fetch_all(pool)
        .await
        .map_err(StoreError::Db)
}

pub async fn get_active_by_carrier(pool: &PgPool, carrier: &str) -> Result<Vec<Shipment>, StoreError> {
    sqlx::query_as::<_, Shipment>(
        "SELECT * FROM shipments WHERE carrier = $1 AND is_delivered = false ORDER BY created_at DESC",
    )
    .bind(carrier)
    .fetch_all(pool)
    .await
    .map_err(StoreError::Db)
}

/// Shipments eligible for the automatic refresh supervisor: not delivered,
/// auto-refresh enabled, under the failure threshold, and created after
/// `cutoff` (base spec §4.1).
pub async fn get_active_for_auto_update(
    pool: &PgPool,
    carrier: &str,
    cutoff: DateTime<Utc>,
    fail_threshold: i32,
) -> Result<Vec<Shipment>, StoreError> {
    sqlx::query_as::<_, Shipment>(
        r#"
        SELECT * FROM shipments
        WHERE carrier = $1
          AND is_delivered = false
          AND auto_refresh_enabled = true
          AND auto_refresh_fail_count < $2
          AND created_at > $3
        ORDER BY created_at ASC
        "#,
    )
    .bind(carrier)
    .bind(fail_threshold)
    .bind(cutoff)
    .fetch_all(pool)
    .await
    .map_err(StoreError::Db)
}

pub async fn update(pool: &PgPool, shipment: &Shipment) -> Result<Shipment, StoreError> {
    update_tx(&mut *pool.begin().await.map_err(StoreError::Db)?, shipment).await
}

async fn update_tx(
    tx: &mut Transaction<'_, Postgres>,
    shipment: &Shipment,
) -> Result<Shipment, StoreError> {
    let row = sqlx::query_as::<_, Shipment>(
        r#"
        UPDATE shipments SET
            description = $2, status = $3, is_delivered = $4, expected_delivery = $5,
            delegated_carrier = $6, delegated_tracking_number = $7, is_amazon_logistics = $8,
            auto_refresh_enabled = $9, updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(shipment.id)
    .bind(&shipment.description)
    .bind(&shipment.status)
    .bind(shipment.is_delivered)
    .bind(shipment.expected_delivery)
    .bind(&shipment.delegated_carrier)
    .bind(&shipment.delegated_tracking_number)
    .bind(shipment.is_amazon_logistics)
    .bind(shipment.auto_refresh_enabled)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| StoreError::from_sqlx(e, format!("shipment {} not found", shipment.id)))?;

    Ok(row)
}

pub async fn update_description(
    pool: &PgPool,
    id: i32,
    description: &str,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE shipments SET description = $2, updated_at = now() WHERE id = $1",
    )
    .bind(id)
    .bind(description)
    .execute(pool)
    .await
    .map_err(StoreError::Db)?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(format!("shipment {id} not found")));
    }
    Ok(())
}

pub async fn update_refresh_tracking(pool: &PgPool, id: i32) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        UPDATE shipments SET
            last_manual_refresh = now(),
            manual_refresh_count = manual_refresh_count + 1,
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .execute(pool)
    .await
    .map_err(StoreError::Db)?;
    Ok(())
}

pub async fn update_auto_refresh_tracking(
    pool: &PgPool,
    id: i32,
    success: bool,
    error_msg: Option<&str>,
) -> Result<(), StoreError> {
    update_auto_refresh_tracking_tx(&mut *pool.begin().await.map_err(StoreError::Db)?, id, success, error_msg)
        .await?;
    Ok(())
}

async fn update_auto_refresh_tracking_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: i32,
    success: bool,
    error_msg: Option<&str>,
) -> Result<(), StoreError> {
    if success {
        sqlx::query(
            r#"
            UPDATE shipments SET
                last_auto_refresh = now(),
                auto_refresh_count = auto_refresh_count + 1,
                auto_refresh_fail_count = 0,
                auto_refresh_error = NULL,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&mut **tx)
        .await
    } else {
        sqlx::query(
            r#"
            UPDATE shipments SET
                auto_refresh_fail_count = auto_refresh_fail_count + 1,
                auto_refresh_error = $2,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error_msg)
        .execute(&mut **tx)
        .await
    }
    .map_err(StoreError::Db)?;

    Ok(())
}

/// Atomically updates the shipment row and its auto-refresh bookkeeping in
/// one transaction (base spec §4.1, §8 invariant 6 and scenario S8).
pub async fn update_shipment_with_auto_refresh(
    pool: &PgPool,
    shipment: &Shipment,
    success: bool,
    error_msg: Option<&str>,
) -> Result<Shipment, StoreError> {
    let mut tx = pool.begin().await.map_err(StoreError::Db)?;
    let updated = update_tx(&mut tx, shipment).await?;
    update_auto_refresh_tracking_tx(&mut tx, shipment.id, success, error_msg).await?;
    tx.commit().await.map_err(StoreError::Db)?;
    Ok(updated)
}

pub async fn reset_auto_refresh_fail_count(pool: &PgPool, id: i32) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE shipments SET auto_refresh_fail_count = 0, auto_refresh_error = NULL, updated_at = now() WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await
    .map_err(StoreError::Db)?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(format!("shipment {id} not found")));
    }
    Ok(())
}

/// Deletes a shipment; events, links and the cache row cascade via FK.
pub async fn delete(pool: &PgPool, id: i32) -> Result<(), StoreError> {
    let result = sqlx::query("DELETE FROM shipments WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(StoreError::Db)?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(format!("shipment {id} not found")));
    }
    Ok(())
}

/// `limit == 0` means unbounded, per base spec §4.1.
pub async fn get_shipments_with_poor_descriptions(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<Shipment>, StoreError> {
    let query = format!(
        "SELECT * FROM shipments WHERE {WEAK_DESCRIPTION_SQL} ORDER BY created_at ASC{}",
        if limit > 0 { " LIMIT $1" } else { "" }
    );

    let rows = if limit > 0 {
        sqlx::query_as::<_, Shipment>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
    } else {
        sqlx::query_as::<_, Shipment>(&query).fetch_all(pool).await
    }
    .map_err(StoreError::Db)?;

    Ok(rows)
}

/// `GetStats` (base spec §4.1): shipment counts plus a per-carrier breakdown.
pub async fn get_stats(pool: &PgPool) -> Result<ShipmentStats, StoreError> {
    let (total, active, delivered): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COUNT(*),
            COUNT(*) FILTER (WHERE is_delivered = false),
            COUNT(*) FILTER (WHERE is_delivered = true)
        FROM shipments
        "#,
    )
    .fetch_one(pool)
    .await
    .map_err(StoreError::Db)?;

    let rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT carrier, COUNT(*) FROM shipments GROUP BY carrier")
            .fetch_all(pool)
            .await
            .map_err(StoreError::Db)?;

    let mut map = serde_json::Map::new();
    for (carrier, count) in rows {
        map.insert(carrier, json!(count));
    }

    Ok(ShipmentStats {
        total_shipments: total,
        active_shipments: active,
        delivered_shipments: delivered,
        shipments_by_carrier: serde_json::Value::Object(map),
    })
}
