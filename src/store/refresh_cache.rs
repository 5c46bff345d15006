//! Durable tier of the two-tier refresh cache (base spec §3 `RefreshCacheRow`,
//! §4.1 `RefreshCache:` operations). The in-memory tier lives in `crate::cache`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::RefreshResponse;
use crate::store::StoreError;

/// Row shape as stored; `response_data` is the serialized `RefreshResponse`.
#[derive(sqlx::FromRow)]
struct CacheRow {
    response_data: serde_json::Value,
    #[allow(dead_code)]
    cached_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// Returns `None` on miss or on an expired row; an expired row found during
/// the lookup is opportunistically deleted.
pub async fn get(pool: &PgPool, shipment_id: i32) -> Result<Option<RefreshResponse>, StoreError> {
    let row = sqlx::query_as::<_, CacheRow>(
        "SELECT response_data, cached_at, expires_at FROM refresh_cache WHERE shipment_id = $1",
    )
    .bind(shipment_id)
    .fetch_optional(pool)
    .await
    .map_err(StoreError::Db)?;

    let Some(row) = row else {
        return Ok(None);
    };

    if row.expires_at <= Utc::now() {
        let _ = delete(pool, shipment_id).await;
        return Ok(None);
    }

    let response: RefreshResponse =
        serde_json::from_value(row.response_data).map_err(|e| {
            StoreError::Db(sqlx::Error::Decode(Box::new(e)))
        })?;
    Ok(Some(response))
}

pub async fn set(
    pool: &PgPool,
    shipment_id: i32,
    response: &RefreshResponse,
    ttl_secs: i64,
) -> Result<(), StoreError> {
    let payload = serde_json::to_value(response)
        .map_err(|e| StoreError::Db(sqlx::Error::Encode(Box::new(e))))?;
    let now = Utc::now();
    let expires_at = now + chrono::Duration::seconds(ttl_secs);

    sqlx::query(
        r#"
        INSERT INTO refresh_cache (shipment_id, response_data, cached_at, expires_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (shipment_id) DO UPDATE SET
            response_data = EXCLUDED.response_data,
            cached_at = EXCLUDED.cached_at,
            expires_at = EXCLUDED.expires_at
        "#,
    )
    .bind(shipment_id)
    .bind(payload)
    .bind(now)
    .bind(expires_at)
    .execute(pool)
    .await
    .map_err(StoreError::Db)?;

    Ok(())
}

/// Never fails if the row is absent.
pub async fn delete(pool: &PgPool, shipment_id: i32) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM refresh_cache WHERE shipment_id = $1")
        .bind(shipment_id)
        .execute(pool)
        .await
        .map_err(StoreError::Db)?;
    Ok(())
}

pub async fn delete_expired(pool: &PgPool) -> Result<u64, StoreError> {
    let result = sqlx::query("DELETE FROM refresh_cache WHERE expires_at <= now()")
        .execute(pool)
        .await
        .map_err(StoreError::Db)?;
    Ok(result.rows_affected())
}

/// Loads every non-expired row, used to warm the in-memory tier on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<(i32, RefreshResponse)>, StoreError> {
    let rows = sqlx::query_as::<_, (i32, serde_json::Value)>(
        "SELECT shipment_id, response_data FROM refresh_cache WHERE expires_at > now()",
    )
    .fetch_all(pool)
    .await
    .map_err(StoreError::Db)?;

    let mut out = Vec::with_capacity(rows.len());
    for (id, data) in rows {
        if let Ok(resp) = serde_json::from_value::<RefreshResponse>(data) {
            out.push((id, resp));
        }
    }
    Ok(out)
}

pub async fn database_total(pool: &PgPool) -> Result<i64, StoreError> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM refresh_cache")
        .fetch_one(pool)
        .await
        .map_err(StoreError::Db)?;
    Ok(count)
}

pub async fn expired_count(pool: &PgPool) -> Result<i64, StoreError> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM refresh_cache WHERE expires_at <= now()")
            .fetch_one(pool)
            .await
            .map_err(StoreError::Db)?;
    Ok(count)
}
