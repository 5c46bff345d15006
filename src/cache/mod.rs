//! Two-tier refresh cache (component C, base spec §4.3).
//!
//! Write-through: reads consult memory first, then the store; writes and
//! invalidations touch both tiers. Grounded on
//! `threading::cache::MailingListCache`'s use of `DashMap` for concurrent
//! access during population, generalized from "one unified cache per
//! mailing list" to "one entry per shipment id".

use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use sqlx::PgPool;

use crate::models::{CacheStats, RefreshResponse};
use crate::store::{self, StoreError};

struct MemoryEntry {
    response: RefreshResponse,
    expires_at: chrono::DateTime<Utc>,
}

pub struct RefreshCache {
    memory: DashMap<i32, MemoryEntry>,
    pool: PgPool,
    ttl: Duration,
    enabled: bool,
}

impl RefreshCache {
    pub fn new(pool: PgPool, ttl: Duration, enabled: bool) -> Self {
        Self {
            memory: DashMap::new(),
            pool,
            ttl,
            enabled,
        }
    }

    /// Warms the memory tier from every non-expired durable row, called once
    /// at startup so a restart doesn't force every shipment to miss.
    pub async fn warm_from_store(&self) -> Result<usize, StoreError> {
        if !self.enabled {
            return Ok(0);
        }
        let rows = store::refresh_cache::load_all(&self.pool).await?;
        let count = rows.len();
        for (id, response) in rows {
            let expires_at = response.updated_at + chrono::Duration::from_std(self.ttl).unwrap_or_default();
            self.memory.insert(id, MemoryEntry { response, expires_at });
        }
        Ok(count)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Consults memory first, then the durable store on a miss, copying any
    /// store hit back into memory (base spec §4.3).
    pub async fn get(&self, shipment_id: i32) -> Result<Option<RefreshResponse>, StoreError> {
        if !self.enabled {
            return Ok(None);
        }

        if let Some(entry) = self.memory.get(&shipment_id) {
            if entry.expires_at > Utc::now() {
                return Ok(Some(entry.response.clone()));
            }
            drop(entry);
            self.memory.remove(&shipment_id);
        }

        let Some(response) = store::refresh_cache::get(&self.pool, shipment_id).await? else {
            return Ok(None);
        };

        let expires_at = Utc::now() + chrono::Duration::from_std(self.ttl).unwrap_or_default();
        self.memory.insert(
            shipment_id,
            MemoryEntry { response: response.clone(), expires_at },
        );
        Ok(Some(response))
    }

    /// Serializes and upserts the response with `expires_at = now + ttl`.
    pub async fn set(&self, shipment_id: i32, response: &RefreshResponse) -> Result<(), StoreError> {
        if !self.enabled {
            return Ok(());
        }

        let ttl_secs = self.ttl.as_secs() as i64;
        store::refresh_cache::set(&self.pool, shipment_id, response, ttl_secs).await?;

        let expires_at = Utc::now() + chrono::Duration::seconds(ttl_secs);
        self.memory.insert(
            shipment_id,
            MemoryEntry { response: response.clone(), expires_at },
        );
        Ok(())
    }

    /// Removes both tiers; never fails if the entry is absent.
    pub async fn delete(&self, shipment_id: i32) -> Result<(), StoreError> {
        self.memory.remove(&shipment_id);
        store::refresh_cache::delete(&self.pool, shipment_id).await
    }

    /// Like `delete`, but reports the age of the removed entry (if any) for
    /// operator observability (base spec §4.3, §8 invariant 3).
    pub async fn force_invalidate(
        &self,
        shipment_id: i32,
    ) -> Result<Option<Duration>, StoreError> {
        let memory_age = self.memory.remove(&shipment_id).and_then(|(_, entry)| {
            let cached_at = entry.expires_at - chrono::Duration::from_std(self.ttl).unwrap_or_default();
            (Utc::now() - cached_at).to_std().ok()
        });

        let age = if memory_age.is_some() {
            memory_age
        } else {
            // Not resident in memory; check whether a durable row existed by
            // reading it before deleting (a `Get` would also lazily evict it).
            store::refresh_cache::get(&self.pool, shipment_id)
                .await?
                .and_then(|resp| (Utc::now() - resp.updated_at).to_std().ok())
        };

        store::refresh_cache::delete(&self.pool, shipment_id).await?;
        Ok(age)
    }

    /// Deletes every expired durable row; called from the eviction ticker.
    pub async fn evict_expired(&self) -> Result<u64, StoreError> {
        self.memory.retain(|_, entry| entry.expires_at > Utc::now());
        store::refresh_cache::delete_expired(&self.pool).await
    }

    pub async fn stats(&self) -> Result<CacheStats, StoreError> {
        if !self.enabled {
            return Ok(CacheStats {
                memory_total: 0,
                database_total: 0,
                expired: 0,
                ttl_secs: self.ttl.as_secs(),
                disabled: true,
            });
        }

        let database_total = store::refresh_cache::database_total(&self.pool).await?;
        let expired = store::refresh_cache::expired_count(&self.pool).await?;

        Ok(CacheStats {
            memory_total: self.memory.len(),
            database_total,
            expired,
            ttl_secs: self.ttl.as_secs(),
            disabled: false,
        })
    }
}
