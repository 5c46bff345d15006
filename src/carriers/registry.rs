//! Builds and selects carrier clients (base spec §4.2 Carrier Registry).
//!
//! Each carrier may have more than one client registered, ordered by
//! preference. `get_default` returns the first; `get_fresh_data_client`
//! prefers a non-API client so scheduled refreshes don't burn API quota on
//! carriers that also have a scraping path, and refuses API-only carriers
//! outright (base spec §4.4 step 5).

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Client;

use crate::carriers::client::{CarrierClient, CarrierError, ClientKind};
use crate::carriers::fedex::FedexApiClient;
use crate::carriers::http::WebCarrierClient;
use crate::config::TrackerConfig;

pub struct CarrierRegistry {
    clients: HashMap<&'static str, Vec<Arc<dyn CarrierClient>>>,
}

impl CarrierRegistry {
    /// Registers a single client for a single carrier, for tests that need
    /// full control over `Track`/`Validate` without any network access.
    pub fn with_client(carrier: &'static str, client: Arc<dyn CarrierClient>) -> Self {
        let mut clients = HashMap::new();
        clients.insert(carrier, vec![client]);
        Self { clients }
    }

    /// Wires one `CarrierClient` per configured carrier, preferring an API
    /// client where credentials are available and falling back to the
    /// headless/scraping client otherwise (base spec §4.9).
    pub fn from_config(config: &TrackerConfig, http: Client) -> Self {
        let mut clients: HashMap<&'static str, Vec<Arc<dyn CarrierClient>>> = HashMap::new();

        let mut fedex_clients: Vec<Arc<dyn CarrierClient>> = Vec::new();
        if let (Some(id), Some(secret)) = (&config.fedex_client_id, &config.fedex_client_secret) {
            let api_url = config
                .fedex_api_url
                .clone()
                .unwrap_or_else(|| "https://apis.fedex.com".to_string());
            fedex_clients.push(Arc::new(FedexApiClient::new(
                id.clone(),
                secret.clone(),
                api_url,
                http.clone(),
            )));
        }
        fedex_clients.push(Arc::new(WebCarrierClient::new(
            "fedex",
            ClientKind::Scraping,
            "https://www.fedex.com/fedextrack/?trknbr={tn}",
            http.clone(),
        )));
        clients.insert("fedex", fedex_clients);

        clients.insert(
            "ups",
            vec![Arc::new(WebCarrierClient::new(
                "ups",
                ClientKind::Scraping,
                "https://www.ups.com/track?tracknum={tn}",
                http.clone(),
            ))],
        );
        clients.insert(
            "usps",
            vec![Arc::new(WebCarrierClient::new(
                "usps",
                ClientKind::Scraping,
                "https://tools.usps.com/go/TrackConfirmAction?tLabels={tn}",
                http.clone(),
            ))],
        );
        clients.insert(
            "dhl",
            vec![Arc::new(WebCarrierClient::new(
                "dhl",
                ClientKind::Scraping,
                "https://www.dhl.com/en/express/tracking.html?AWB={tn}",
                http.clone(),
            ))],
        );
        clients.insert(
            "amazon",
            vec![Arc::new(WebCarrierClient::new(
                "amazon",
                ClientKind::Headless,
                "https://www.amazon.com/progress-tracker/package/ref={tn}",
                http,
            ))],
        );

        Self { clients }
    }

    pub fn get_default(&self, carrier: &str) -> Result<Arc<dyn CarrierClient>, CarrierError> {
        self.clients
            .get(carrier)
            .and_then(|v| v.first())
            .cloned()
            .ok_or_else(|| CarrierError::NoClientAvailable(carrier.to_string()))
    }

    /// Returns the first registered client that isn't API-backed. Auto-refresh
    /// uses this so scheduled polling prefers quota-free paths; a carrier with
    /// only an API client is rejected rather than silently burning quota.
    pub fn get_fresh_data_client(&self, carrier: &str) -> Result<Arc<dyn CarrierClient>, CarrierError> {
        let candidates = self
            .clients
            .get(carrier)
            .ok_or_else(|| CarrierError::NoClientAvailable(carrier.to_string()))?;

        candidates
            .iter()
            .find(|c| c.kind() != ClientKind::Api)
            .cloned()
            .ok_or_else(|| CarrierError::NoClientAvailable(carrier.to_string()))
    }
}
