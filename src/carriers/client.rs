//! The capability interface every carrier client implements (base spec §4.2,
//! §9: "model as a capability interface... not subclass hierarchies").

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a client reaches the carrier: a real API, a headless browser driving
/// the carrier's own site, or a plain HTML scrape. Used only for selection
/// in the registry (base spec §4.2); clients never branch on their own kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientKind {
    Api,
    Headless,
    Scraping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackRequest {
    pub tracking_numbers: Vec<String>,
    pub carrier: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackEvent {
    pub timestamp: DateTime<Utc>,
    pub location: Option<String>,
    pub status: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackResult {
    pub tracking_number: String,
    pub status: String,
    pub events: Vec<TrackEvent>,
    pub last_updated: Option<DateTime<Utc>>,
    pub actual_delivery: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackErrorDetail {
    pub carrier: String,
    pub code: String,
    pub message: String,
    pub rate_limit: bool,
    pub retryable: bool,
}

/// A batched `Track` call returns independent result and error lists: some
/// tracking numbers in a batch may succeed while others fail.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TrackResponse {
    pub results: Vec<TrackResult>,
    pub errors: Vec<TrackErrorDetail>,
}

#[derive(Debug, thiserror::Error)]
pub enum CarrierError {
    #[error("{carrier}: rate limited")]
    RateLimited { carrier: String },
    #[error("{carrier}: {message}")]
    Upstream { carrier: String, message: String },
    #[error("no client available for carrier {0}")]
    NoClientAvailable(String),
}

impl CarrierError {
    pub fn carrier_code(&self) -> &str {
        match self {
            CarrierError::RateLimited { carrier } => carrier,
            CarrierError::Upstream { carrier, .. } => carrier,
            CarrierError::NoClientAvailable(carrier) => carrier,
        }
    }
}

/// Capability interface implemented by every carrier client, regardless of
/// whether it talks to a real API, a headless browser, or a scraper.
#[async_trait]
pub trait CarrierClient: Send + Sync {
    fn kind(&self) -> ClientKind;

    async fn track(&self, request: TrackRequest) -> Result<TrackResponse, CarrierError>;

    /// Pre-filters batches; an invalid number is skipped, not counted as a failure.
    fn validate(&self, tracking_number: &str) -> bool;
}
