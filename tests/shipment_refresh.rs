use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use package_tracker::cache::RefreshCache;
use package_tracker::carriers::client::{ClientKind, TrackEvent, TrackResult};
use package_tracker::carriers::mock::MockCarrierClient;
use package_tracker::carriers::CarrierRegistry;
use package_tracker::config::TrackerConfig;
use package_tracker::error::ApiError;
use package_tracker::models::{CacheStatus, CreateShipmentRequest};
use package_tracker::refresh::manual::refresh_shipment;
use package_tracker::store;
use package_tracker::test_support::{TestDatabase, TestDatabaseError};

fn test_config() -> TrackerConfig {
    TrackerConfig {
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        database_url: String::new(),
        disable_rate_limit: false,
        disable_cache: false,
        cache_ttl: Duration::from_secs(300),
        admin_api_key: None,
        auto_update_interval: Duration::from_secs(1800),
        auto_update_fail_threshold: 5,
        email_check_interval: Duration::from_secs(300),
        email_max_per_run: 50,
        email_rate_limit_delay: Duration::from_millis(0),
        fedex_client_id: None,
        fedex_client_secret: None,
        fedex_api_url: None,
        llm_enabled: false,
    }
}

async fn provision() -> Option<TestDatabase> {
    match TestDatabase::new_from_env().await {
        Ok(db) => Some(db),
        Err(TestDatabaseError::MissingUrl) => {
            eprintln!("skipping refresh orchestration test: container tests disabled");
            None
        }
        Err(err) => panic!("failed to provision test database: {err:?}"),
    }
}

/// S1: manual refresh misses the cache, merges two events, then a second
/// call hits the cache and returns the identical event list.
#[tokio::test]
async fn manual_refresh_miss_then_hit() {
    let Some(test_db) = provision().await else { return };
    let pool = test_db.pool_clone();

    let shipment = store::shipments::create(
        &pool,
        &CreateShipmentRequest {
            tracking_number: "1Z999AA10123456784".to_string(),
            carrier: "ups".to_string(),
            description: "Test package".to_string(),
            amazon_order_number: None,
        },
    )
    .await
    .expect("shipment created");

    let client = MockCarrierClient::new("ups", ClientKind::Scraping).with_result(
        "1Z999AA10123456784",
        TrackResult {
            tracking_number: "1Z999AA10123456784".to_string(),
            status: "in_transit".to_string(),
            events: vec![
                TrackEvent {
                    timestamp: Utc::now() - chrono::Duration::hours(2),
                    location: Some("Louisville, KY".to_string()),
                    status: "in_transit".to_string(),
                    description: "Departed facility".to_string(),
                },
                TrackEvent {
                    timestamp: Utc::now() - chrono::Duration::hours(1),
                    location: Some("Memphis, TN".to_string()),
                    status: "in_transit".to_string(),
                    description: "Arrived at facility".to_string(),
                },
            ],
            last_updated: Some(Utc::now()),
            actual_delivery: None,
        },
    );
    let registry = CarrierRegistry::with_client("ups", Arc::new(client));
    let cache = RefreshCache::new(pool.clone(), Duration::from_secs(300), true);
    let config = test_config();

    let first = refresh_shipment(&pool, &cache, &registry, &config, shipment.id, false)
        .await
        .expect("first refresh succeeds");
    assert_eq!(first.cache_status, CacheStatus::Miss);
    assert_eq!(first.events_added, 2);
    assert_eq!(first.total_events, 2);

    let second = refresh_shipment(&pool, &cache, &registry, &config, shipment.id, false)
        .await
        .expect("second refresh succeeds");
    assert_eq!(second.cache_status, CacheStatus::Hit);
    assert_eq!(second.events_added, 2);
    assert_eq!(second.events.len(), first.events.len());

    test_db.close().await.expect("failed to drop test database");
}

/// S2: forcing a refresh bypasses the cache hit and reports the age of the
/// entry it invalidated.
#[tokio::test]
async fn forced_refresh_reports_previous_cache_age() {
    let Some(test_db) = provision().await else { return };
    let pool = test_db.pool_clone();

    let shipment = store::shipments::create(
        &pool,
        &CreateShipmentRequest {
            tracking_number: "1Z999AA10123456784".to_string(),
            carrier: "ups".to_string(),
            description: "Test package".to_string(),
            amazon_order_number: None,
        },
    )
    .await
    .expect("shipment created");

    let client = MockCarrierClient::new("ups", ClientKind::Scraping).with_result(
        "1Z999AA10123456784",
        TrackResult {
            tracking_number: "1Z999AA10123456784".to_string(),
            status: "in_transit".to_string(),
            events: vec![TrackEvent {
                timestamp: Utc::now(),
                location: None,
                status: "in_transit".to_string(),
                description: "Picked up".to_string(),
            }],
            last_updated: Some(Utc::now()),
            actual_delivery: None,
        },
    );
    let registry = CarrierRegistry::with_client("ups", Arc::new(client));
    let cache = RefreshCache::new(pool.clone(), Duration::from_secs(300), true);
    let config = test_config();

    refresh_shipment(&pool, &cache, &registry, &config, shipment.id, false)
        .await
        .expect("first refresh succeeds");

    let forced = refresh_shipment(&pool, &cache, &registry, &config, shipment.id, true)
        .await
        .expect("forced refresh succeeds");

    assert_eq!(forced.cache_status, CacheStatus::Forced);
    assert!(forced.previous_cache_age_ms.is_some());

    test_db.close().await.expect("failed to drop test database");
}

/// S3: a delivered shipment short-circuits with a conflict and never calls
/// the carrier client (no result is registered on the mock for it).
#[tokio::test]
async fn already_delivered_shipment_returns_conflict() {
    let Some(test_db) = provision().await else { return };
    let pool = test_db.pool_clone();

    let shipment = store::shipments::create(
        &pool,
        &CreateShipmentRequest {
            tracking_number: "1Z999AA10123456784".to_string(),
            carrier: "ups".to_string(),
            description: "Test package".to_string(),
            amazon_order_number: None,
        },
    )
    .await
    .expect("shipment created");

    let mut delivered = shipment.clone();
    delivered.is_delivered = true;
    delivered.status = "delivered".to_string();
    store::shipments::update(&pool, &delivered).await.expect("marked delivered");

    let registry = CarrierRegistry::with_client(
        "ups",
        Arc::new(MockCarrierClient::new("ups", ClientKind::Scraping)),
    );
    let cache = RefreshCache::new(pool.clone(), Duration::from_secs(300), true);
    let config = test_config();

    let result = refresh_shipment(&pool, &cache, &registry, &config, shipment.id, false).await;
    assert!(matches!(result, Err(ApiError::Conflict(_))));

    test_db.close().await.expect("failed to drop test database");
}

/// S4: within the 5-minute manual rate-limit window, a non-forced refresh
/// is rejected with a remaining-time message.
#[tokio::test]
async fn rate_limit_rejects_refresh_within_window() {
    let Some(test_db) = provision().await else { return };
    let pool = test_db.pool_clone();

    let shipment = store::shipments::create(
        &pool,
        &CreateShipmentRequest {
            tracking_number: "1Z999AA10123456784".to_string(),
            carrier: "ups".to_string(),
            description: "Test package".to_string(),
            amazon_order_number: None,
        },
    )
    .await
    .expect("shipment created");

    sqlx::query("UPDATE shipments SET last_manual_refresh = now() - interval '1 minute' WHERE id = $1")
        .bind(shipment.id)
        .execute(&pool)
        .await
        .expect("seeded last_manual_refresh");

    let registry = CarrierRegistry::with_client(
        "ups",
        Arc::new(MockCarrierClient::new("ups", ClientKind::Scraping)),
    );
    let cache = RefreshCache::new(pool.clone(), Duration::from_secs(300), false);
    let config = test_config();

    let result = refresh_shipment(&pool, &cache, &registry, &config, shipment.id, false).await;
    assert!(matches!(result, Err(ApiError::RateLimited { .. })));

    test_db.close().await.expect("failed to drop test database");
}

/// S5: a carrier response containing a duplicate event merges to exactly
/// one stored row per dedup key.
#[tokio::test]
async fn duplicate_events_are_deduplicated_on_merge() {
    let Some(test_db) = provision().await else { return };
    let pool = test_db.pool_clone();

    let shipment = store::shipments::create(
        &pool,
        &CreateShipmentRequest {
            tracking_number: "1Z999AA10123456784".to_string(),
            carrier: "ups".to_string(),
            description: "Test package".to_string(),
            amazon_order_number: None,
        },
    )
    .await
    .expect("shipment created");

    let timestamp = Utc::now() - chrono::Duration::hours(1);
    let duplicate_event = TrackEvent {
        timestamp,
        location: Some("Louisville, KY".to_string()),
        status: "in_transit".to_string(),
        description: "Departed facility".to_string(),
    };
    let unique_event = TrackEvent {
        timestamp: Utc::now(),
        location: Some("Memphis, TN".to_string()),
        status: "in_transit".to_string(),
        description: "Arrived at facility".to_string(),
    };

    let client = MockCarrierClient::new("ups", ClientKind::Scraping).with_result(
        "1Z999AA10123456784",
        TrackResult {
            tracking_number: "1Z999AA10123456784".to_string(),
            status: "in_transit".to_string(),
            events: vec![duplicate_event.clone(), duplicate_event, unique_event],
            last_updated: Some(Utc::now()),
            actual_delivery: None,
        },
    );
    let registry = CarrierRegistry::with_client("ups", Arc::new(client));
    let cache = RefreshCache::new(pool.clone(), Duration::from_secs(300), false);
    let config = test_config();

    let response = refresh_shipment(&pool, &cache, &registry, &config, shipment.id, false)
        .await
        .expect("refresh succeeds");

    assert_eq!(response.events_added, 2);
    assert_eq!(response.total_events, 2);

    let stored = store::events::get_by_shipment_id(&pool, shipment.id)
        .await
        .expect("events fetched");
    assert_eq!(stored.len(), 2);

    test_db.close().await.expect("failed to drop test database");
}

/// A per-tracking-number error in the batch response (distinct from a
/// whole-call `CarrierError`) surfaces as `bad_gateway`, not a silent no-op.
#[tokio::test]
async fn per_item_carrier_error_surfaces_as_upstream_failed() {
    let Some(test_db) = provision().await else { return };
    let pool = test_db.pool_clone();

    let shipment = store::shipments::create(
        &pool,
        &CreateShipmentRequest {
            tracking_number: "1Z999AA10123456784".to_string(),
            carrier: "ups".to_string(),
            description: "Test package".to_string(),
            amazon_order_number: None,
        },
    )
    .await
    .expect("shipment created");

    let client = MockCarrierClient::new("ups", ClientKind::Scraping).with_error(
        "1Z999AA10123456784",
        package_tracker::carriers::client::CarrierError::Upstream {
            carrier: "ups".to_string(),
            message: "carrier returned HTTP 503".to_string(),
        },
    );
    let registry = CarrierRegistry::with_client("ups", Arc::new(client));
    let cache = RefreshCache::new(pool.clone(), Duration::from_secs(300), false);
    let config = test_config();

    let result = refresh_shipment(&pool, &cache, &registry, &config, shipment.id, false).await;
    assert!(matches!(result, Err(ApiError::UpstreamFailed { .. })), "{result:?}");

    test_db.close().await.expect("failed to drop test database");
}
