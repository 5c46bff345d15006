//! Automatic (scheduled) refresh supervisor, one per carrier (base spec §4.4
//! "Automatic refresh"). Spawned from an `AdHoc::on_liftoff` fairing exactly
//! as the teacher spawns `SyncDispatcher::run`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;

use crate::cache::RefreshCache;
use crate::carriers::CarrierRegistry;
use crate::refresh::fetch_and_merge;
use crate::store;
use crate::workers::WorkerHandle;

pub struct AutoRefreshSupervisor {
    pub carrier: String,
    pool: PgPool,
    cache: Arc<RefreshCache>,
    registry: Arc<CarrierRegistry>,
    interval: Duration,
    fail_threshold: i32,
    handle: WorkerHandle,
}

impl AutoRefreshSupervisor {
    pub fn new(
        carrier: String,
        pool: PgPool,
        cache: Arc<RefreshCache>,
        registry: Arc<CarrierRegistry>,
        interval: Duration,
        fail_threshold: i32,
    ) -> Self {
        Self {
            carrier,
            pool,
            cache,
            registry,
            interval,
            fail_threshold,
            handle: WorkerHandle::new(),
        }
    }

    pub fn handle(&self) -> WorkerHandle {
        self.handle.clone()
    }

    /// Runs until the worker's cancellation token fires. Honors pause/resume
    /// as a cooperative flag checked between ticks.
    pub async fn run(self) {
        let cancel = self.handle.cancellation_token();
        let mut ticker = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    log::info!("auto-refresh supervisor for {} shutting down", self.carrier);
                    return;
                }
                _ = ticker.tick() => {
                    if self.handle.is_paused() {
                        continue;
                    }
                    self.handle.mark_pass_started().await;
                    let result = self.run_pass().await;
                    self.handle.mark_pass_finished(result.err()).await;
                }
            }
        }
    }

    /// One pass: loads every eligible shipment for this carrier and refreshes
    /// each independently. An individual shipment's failure never aborts the
    /// batch (base spec §4.4, §7).
    async fn run_pass(&self) -> Result<(), String> {
        // A shipment older than this is assumed abandoned and is excluded
        // from auto-refresh regardless of fail count.
        let cutoff = Utc::now() - chrono::Duration::days(365);

        let shipments = store::shipments::get_active_for_auto_update(
            &self.pool,
            &self.carrier,
            cutoff,
            self.fail_threshold,
        )
        .await
        .map_err(|e| e.to_string())?;

        let client = match self.registry.get_fresh_data_client(&self.carrier) {
            Ok(c) => c,
            Err(e) => return Err(e.to_string()),
        };

        for shipment in shipments {
            let shipment_id = shipment.id;
            let snapshot_count = store::events::get_by_shipment_id(&self.pool, shipment_id)
                .await
                .map(|v| v.len())
                .unwrap_or(0);

            match fetch_and_merge(&self.pool, client.as_ref(), shipment, snapshot_count).await {
                Ok(outcome) => {
                    match store::shipments::update_shipment_with_auto_refresh(
                        &self.pool,
                        &outcome.shipment,
                        true,
                        None,
                    )
                    .await
                    {
                        Ok(updated) => {
                            if self.cache.is_enabled() {
                                let response = crate::models::RefreshResponse {
                                    shipment_id,
                                    updated_at: updated.updated_at,
                                    events_added: outcome.events_added,
                                    total_events: outcome.events.len(),
                                    events: outcome.events,
                                    cache_status: crate::models::CacheStatus::Miss,
                                    refresh_duration_ms: 0,
                                    previous_cache_age_ms: None,
                                };
                                if let Err(e) = self.cache.set(shipment_id, &response).await {
                                    log::warn!("cache write failed for shipment {shipment_id}: {e}");
                                }
                            }
                        }
                        Err(e) => log::error!(
                            "failed to persist auto-refresh update for shipment {shipment_id}: {e}"
                        ),
                    }
                }
                Err(e) => {
                    log::warn!("auto-refresh failed for shipment {shipment_id} ({}): {e}", self.carrier);
                    if let Ok(current) = store::shipments::get_by_id(&self.pool, shipment_id).await {
                        if let Err(persist_err) = store::shipments::update_shipment_with_auto_refresh(
                            &self.pool,
                            &current,
                            false,
                            Some(&e.to_string()),
                        )
                        .await
                        {
                            log::error!(
                                "failed to record auto-refresh failure for shipment {shipment_id}: {persist_err}"
                            );
                        }
                    }
                }
            }
        }

        Ok(())
    }
}
