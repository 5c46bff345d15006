//! Manual (on-demand) refresh path (base spec §4.4 `RefreshShipment`).

use chrono::Utc;
use sqlx::PgPool;

use crate::cache::RefreshCache;
use crate::carriers::CarrierRegistry;
use crate::config::{TrackerConfig, MANUAL_REFRESH_BUDGET, MANUAL_REFRESH_MIN_INTERVAL};
use crate::error::ApiError;
use crate::models::{CacheStatus, RefreshResponse};
use crate::refresh::fetch_and_merge;
use crate::store;

pub async fn refresh_shipment(
    pool: &PgPool,
    cache: &RefreshCache,
    registry: &CarrierRegistry,
    config: &TrackerConfig,
    shipment_id: i32,
    force: bool,
) -> Result<RefreshResponse, ApiError> {
    let shipment = store::shipments::get_by_id(pool, shipment_id).await?;

    if shipment.is_delivered {
        return Err(ApiError::Conflict("shipment is already delivered".to_string()));
    }

    let mut previous_cache_age_ms = None;
    let cache_status;

    if !cache.is_enabled() {
        cache_status = CacheStatus::Disabled;
    } else if force {
        previous_cache_age_ms = cache
            .force_invalidate(shipment_id)
            .await?
            .map(|d| d.as_millis() as u64);
        cache_status = CacheStatus::Forced;
    } else {
        if let Some(mut cached) = cache.get(shipment_id).await? {
            cached.cache_status = CacheStatus::Hit;
            return Ok(cached);
        }
        cache_status = CacheStatus::Miss;
    }

    if !config.disable_rate_limit && !force {
        if let Some(last) = shipment.last_manual_refresh {
            let elapsed = Utc::now().signed_duration_since(last);
            let min_interval = chrono::Duration::from_std(MANUAL_REFRESH_MIN_INTERVAL).unwrap();
            if elapsed < min_interval {
                let remaining = (min_interval - elapsed).num_seconds().max(0) as u64;
                return Err(ApiError::RateLimited {
                    message: format!("manual refresh rate limited; retry in {remaining}s"),
                    retry_after_secs: remaining,
                });
            }
        }
    }

    let client = registry
        .get_default(&shipment.carrier)
        .map_err(ApiError::from)?;
    let carrier_code = shipment.carrier.clone();

    let snapshot_count = store::events::get_by_shipment_id(pool, shipment_id)
        .await?
        .len();

    let started = std::time::Instant::now();
    let outcome = tokio::time::timeout(
        MANUAL_REFRESH_BUDGET,
        fetch_and_merge(pool, client.as_ref(), shipment, snapshot_count),
    )
    .await
    .map_err(|_| ApiError::UpstreamFailed {
        carrier: carrier_code,
        message: "refresh exceeded its time budget".to_string(),
    })?
    .map_err(ApiError::from)?;

    let updated_shipment = store::shipments::update(pool, &outcome.shipment).await?;
    store::shipments::update_refresh_tracking(pool, shipment_id).await?;

    let response = RefreshResponse {
        shipment_id,
        updated_at: updated_shipment.updated_at,
        events_added: outcome.events_added,
        total_events: outcome.events.len(),
        events: outcome.events,
        cache_status,
        refresh_duration_ms: started.elapsed().as_millis() as u64,
        previous_cache_age_ms,
    };

    if cache.is_enabled() {
        cache.set(shipment_id, &response).await?;
    }

    Ok(response)
}
