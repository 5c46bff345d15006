//! Refresh orchestration (component D, base spec §4.4): manual (on-demand)
//! and automatic (scheduled) paths that call pluggable carrier clients,
//! merge results into the store with dedup, and maintain per-shipment
//! failure state.

pub mod auto;
pub mod manual;

use chrono::Utc;

use crate::carriers::{CarrierClient, TrackRequest};
use crate::models::{Shipment, TrackingEvent};
use crate::store;

/// Shared by the manual and automatic paths: calls `Track` for a single
/// shipment's tracking number, merges the resulting events (dedup-safe,
/// best-effort per event per base spec §7), and updates `status`/
/// `is_delivered` in place on the given shipment snapshot without
/// persisting it — the caller decides how to persist (plain `update` for
/// manual, `update_shipment_with_auto_refresh` for automatic).
pub struct MergeOutcome {
    pub shipment: Shipment,
    pub events_added: usize,
    pub events: Vec<TrackingEvent>,
}

pub async fn fetch_and_merge(
    pool: &sqlx::PgPool,
    client: &dyn CarrierClient,
    mut shipment: Shipment,
    snapshot_count: usize,
) -> Result<MergeOutcome, crate::carriers::CarrierError> {
    let tracking_number = shipment
        .delegated_tracking_number
        .clone()
        .unwrap_or_else(|| shipment.tracking_number.clone());

    let response = client
        .track(TrackRequest {
            tracking_numbers: vec![tracking_number.clone()],
            carrier: shipment.carrier.clone(),
        })
        .await?;

    if let Some(detail) = response
        .errors
        .iter()
        .find(|e| e.carrier == shipment.carrier)
        .filter(|_| !response.results.iter().any(|r| r.tracking_number == tracking_number))
    {
        return Err(if detail.rate_limit {
            crate::carriers::CarrierError::RateLimited {
                carrier: detail.carrier.clone(),
            }
        } else {
            crate::carriers::CarrierError::Upstream {
                carrier: detail.carrier.clone(),
                message: detail.message.clone(),
            }
        });
    }

    if let Some(result) = response.results.into_iter().find(|r| r.tracking_number == tracking_number) {
        if !result.status.is_empty() && result.status != shipment.status {
            shipment.status = result.status.clone();
        }

        let is_delivered = result.status.eq_ignore_ascii_case("delivered");
        if is_delivered {
            shipment.is_delivered = true;
            if let Some(delivered_at) = result.actual_delivery.or(result.last_updated) {
                shipment.expected_delivery = Some(delivered_at);
            }
        }

        // Per-event insert failures are swallowed (base spec §7): a single
        // bad event never aborts an otherwise-successful merge.
        for event in &result.events {
            if let Err(e) = store::events::create_event(
                pool,
                shipment.id,
                event.timestamp,
                event.location.as_deref(),
                &event.status,
                &event.description,
            )
            .await
            {
                log::warn!("failed to persist tracking event for shipment {}: {e}", shipment.id);
            }
        }
    }

    let events = store::events::get_by_shipment_id(pool, shipment.id)
        .await
        .unwrap_or_default();
    let events_added = events.len().saturating_sub(snapshot_count);
    shipment.updated_at = Utc::now();

    Ok(MergeOutcome {
        shipment,
        events_added,
        events,
    })
}
