//! Data transfer objects exposed by the API and shared across subsystems.
//!
//! Every struct here derives `JsonSchema` so `rocket_okapi` can describe the
//! payload shapes in the generated OpenAPI document, the same way the rest
//! of this codebase documents its wire types.

use chrono::{DateTime, Utc};
use rocket_db_pools::sqlx::FromRow;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Carrier codes accepted by `POST /api/shipments` (base spec §6).
pub const VALID_CARRIER_CODES: &[&str] = &["ups", "usps", "fedex", "dhl", "amazon"];

/// A user-tracked package identified by `tracking_number` + `carrier`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, JsonSchema)]
pub struct Shipment {
    pub id: i32,
    pub tracking_number: String,
    pub carrier: String,
    pub description: String,
    pub status: String,
    pub is_delivered: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expected_delivery: Option<DateTime<Utc>>,

    pub last_manual_refresh: Option<DateTime<Utc>>,
    pub manual_refresh_count: i32,
    pub last_auto_refresh: Option<DateTime<Utc>>,
    pub auto_refresh_count: i32,
    pub auto_refresh_enabled: bool,
    pub auto_refresh_error: Option<String>,
    pub auto_refresh_fail_count: i32,

    pub amazon_order_number: Option<String>,
    pub delegated_carrier: Option<String>,
    pub delegated_tracking_number: Option<String>,
    pub is_amazon_logistics: bool,
}

/// A dated status line (pickup, transit, delivery, exception) for a shipment.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, JsonSchema)]
pub struct TrackingEvent {
    pub id: i32,
    pub shipment_id: i32,
    pub timestamp: DateTime<Utc>,
    pub location: Option<String>,
    pub status: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Static registry row describing a supported carrier.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, JsonSchema)]
pub struct Carrier {
    pub id: i32,
    pub name: String,
    pub code: String,
    pub api_endpoint: Option<String>,
    pub active: bool,
}

/// An inbound email the ingestor has seen, in one of two processing phases.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, JsonSchema)]
pub struct ProcessedEmail {
    pub id: i32,
    pub gmail_message_id: String,
    pub gmail_thread_id: String,
    pub from_address: String,
    pub subject: String,
    pub date: DateTime<Utc>,
    pub body_text: Option<String>,
    pub body_html: Option<String>,
    /// Gzip of the plaintext body, or absent if the body hasn't been fetched
    /// yet or was empty (an empty plaintext never serializes as a gzip blob).
    pub body_compressed: Option<Vec<u8>>,
    pub internal_timestamp: DateTime<Utc>,
    pub scan_method: String,
    pub processed_at: DateTime<Utc>,
    pub status: String,
    /// JSON array of extracted tracking numbers; `[]` until extraction runs.
    pub tracking_numbers: serde_json::Value,
    pub error_message: Option<String>,

    pub processing_phase: String,
    pub relevance_score: f64,
    pub snippet: String,
    pub has_content: bool,
    pub metadata_extracted_at: Option<DateTime<Utc>>,
    pub content_extracted_at: Option<DateTime<Utc>>,
}

/// Gmail thread grouping for a set of processed emails.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, JsonSchema)]
pub struct EmailThread {
    pub id: i32,
    pub gmail_thread_id: String,
    pub subject: String,
    /// JSON array of participant addresses.
    pub participants: serde_json::Value,
    pub message_count: i32,
    pub first_message_date: DateTime<Utc>,
    pub last_message_date: DateTime<Utc>,
}

/// A many-to-many association between an email and a shipment it mentions.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, JsonSchema)]
pub struct EmailShipmentLink {
    pub email_id: i32,
    pub shipment_id: i32,
    pub link_type: String,
    pub tracking_number: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Aggregate counts surfaced by `GET /api/shipments` tooling and dashboards.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ShipmentStats {
    pub total_shipments: i64,
    pub active_shipments: i64,
    pub delivered_shipments: i64,
    pub shipments_by_carrier: serde_json::Value,
}

/// One of `hit`, `miss`, `forced`, `disabled` — carried in every refresh response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Hit,
    Miss,
    Forced,
    Disabled,
}

/// Result of a refresh, whether served from cache or fetched upstream.
///
/// Collapses the source's two structurally distinct `RefreshResponse` shapes
/// (one in the store, one in the HTTP layer) into the single schema base
/// spec §9 calls for.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RefreshResponse {
    pub shipment_id: i32,
    pub updated_at: DateTime<Utc>,
    pub events_added: usize,
    pub total_events: usize,
    pub events: Vec<TrackingEvent>,
    pub cache_status: CacheStatus,
    pub refresh_duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_cache_age_ms: Option<u64>,
}

/// Refresh cache health, returned by the admin surface.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheStats {
    pub memory_total: usize,
    pub database_total: i64,
    pub expired: i64,
    pub ttl_secs: u64,
    pub disabled: bool,
}

/// Body for `POST /api/shipments`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateShipmentRequest {
    pub tracking_number: String,
    pub carrier: String,
    pub description: String,
    pub amazon_order_number: Option<String>,
}

/// Body for `PUT /api/shipments/{id}`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct UpdateShipmentRequest {
    pub description: Option<String>,
    pub status: Option<String>,
    pub auto_refresh_enabled: Option<bool>,
    pub expected_delivery: Option<DateTime<Utc>>,
}

/// Body for `POST /api/emails/{email_id}/link/{shipment_id}`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct LinkEmailRequest {
    pub link_type: Option<String>,
    pub tracking_number: String,
    pub created_by: Option<String>,
}

/// Body for `POST /api/admin/enhance-descriptions`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct EnhanceDescriptionsRequest {
    pub shipment_id: Option<i32>,
    pub limit: Option<i64>,
    pub dry_run: Option<bool>,
    pub associate: Option<bool>,
}

/// `{plain_text, html_text, subject, from, date}` body projection for the email reader.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct EmailBody {
    pub plain_text: Option<String>,
    pub html_text: Option<String>,
    pub subject: String,
    pub from: String,
    pub date: DateTime<Utc>,
}

/// `{thread, messages}` payload for `GET /api/emails/{thread_id}/thread`.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct EmailThreadDetail {
    pub thread: EmailThread,
    pub messages: Vec<ProcessedEmail>,
}

/// Health check payload for `GET /api/health`.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct HealthStatus {
    pub status: String,
    pub database: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Background worker lifecycle, reported by the admin status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum WorkerRunState {
    Idle,
    Running,
    Paused,
}

/// `GET /api/admin/tracking-updater/status` payload.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct WorkerStatus {
    pub state: WorkerRunState,
    pub is_running: bool,
    pub is_paused: bool,
    pub last_pass_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Generic pagination metadata for list endpoints.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct PageMetadata {
    pub page: i64,
    pub size: i64,
    #[serde(rename = "totalElements")]
    pub total_elements: i64,
}

/// Generic wrapper used by paginated list endpoints.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub page: PageMetadata,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, page: i64, size: i64, total_elements: i64) -> Self {
        Self {
            data,
            page: PageMetadata {
                page,
                size,
                total_elements,
            },
        }
    }
}
