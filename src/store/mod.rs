//! Durable relational storage (component A of base spec §2): shipments,
//! events, carriers, processed emails, email<->shipment links, and cache
//! rows. Owns schema migrations.
//!
//! Repository functions take `&PgPool` (or a live transaction) rather than
//! a Rocket `Connection` guard so the same code path serves HTTP handlers
//! and background workers, mirroring how `sync::worker::SyncWorker` in the
//! sibling codebase holds a cloned `PgPool` outside of any request cycle.

pub mod carriers;
pub mod emails;
pub mod events;
pub mod links;
pub mod refresh_cache;
pub mod shipments;
pub mod threads;

use sqlx::PgPool;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

impl StoreError {
    pub fn from_sqlx(err: sqlx::Error, not_found_msg: impl Into<String>) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound(not_found_msg.into()),
            other => StoreError::Db(other),
        }
    }
}

/// Creates every table idempotently and adds any missing additive columns.
///
/// Run once on startup via an `AdHoc::try_on_ignite` fairing, matching
/// `sync::run_migrations` in the sibling codebase. Backed by sqlx's
/// reversible file migrations under `migrations/` so `cargo sqlx migrate`
/// tooling and the `tests/migrations.rs` round-trip test both work against
/// the same source of truth.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
    MIGRATOR
        .run(pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))
}
