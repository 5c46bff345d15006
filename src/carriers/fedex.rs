//! FedEx API client (base spec §4.9): OAuth2 client-credentials grant, falls
//! back to scraping in the registry when credentials are absent.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use reqwest::Client;
use serde::Deserialize;

use crate::carriers::client::{
    CarrierClient, CarrierError, ClientKind, TrackEvent, TrackErrorDetail, TrackRequest,
    TrackResponse, TrackResult,
};
use crate::carriers::validators;

struct CachedToken {
    access_token: String,
    expires_at: chrono::DateTime<Utc>,
}

pub struct FedexApiClient {
    client_id: String,
    client_secret: String,
    api_url: String,
    http: Client,
    token: Mutex<Option<CachedToken>>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Deserialize)]
struct FedexTrackResponse {
    output: FedexOutput,
}

#[derive(Deserialize)]
struct FedexOutput {
    #[serde(rename = "completeTrackResults")]
    complete_track_results: Vec<FedexTrackResult>,
}

#[derive(Deserialize)]
struct FedexTrackResult {
    #[serde(rename = "trackingNumber")]
    tracking_number: String,
    #[serde(rename = "trackResults")]
    track_results: Vec<FedexEventGroup>,
}

#[derive(Deserialize)]
struct FedexEventGroup {
    #[serde(rename = "latestStatusDetail")]
    latest_status_detail: Option<FedexStatusDetail>,
    #[serde(rename = "scanEvents", default)]
    scan_events: Vec<FedexScanEvent>,
}

#[derive(Deserialize)]
struct FedexStatusDetail {
    #[serde(rename = "statusByLocale")]
    status_by_locale: String,
}

#[derive(Deserialize)]
struct FedexScanEvent {
    date: chrono::DateTime<Utc>,
    #[serde(rename = "eventDescription")]
    event_description: String,
    #[serde(rename = "scanLocation")]
    scan_location: Option<FedexLocation>,
}

#[derive(Deserialize)]
struct FedexLocation {
    city: Option<String>,
}

impl FedexApiClient {
    pub fn new(client_id: String, client_secret: String, api_url: String, http: Client) -> Self {
        Self {
            client_id,
            client_secret,
            api_url,
            http,
            token: Mutex::new(None),
        }
    }

    async fn access_token(&self) -> Result<String, CarrierError> {
        if let Some(cached) = self.token.lock().as_ref() {
            if cached.expires_at > Utc::now() {
                return Ok(cached.access_token.clone());
            }
        }

        let resp = self
            .http
            .post(format!("{}/oauth/token", self.api_url))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| CarrierError::Upstream {
                carrier: "fedex".to_string(),
                message: format!("token request failed: {e}"),
            })?;

        if !resp.status().is_success() {
            return Err(CarrierError::Upstream {
                carrier: "fedex".to_string(),
                message: format!("token request returned HTTP {}", resp.status()),
            });
        }

        let parsed: TokenResponse = resp.json().await.map_err(|e| CarrierError::Upstream {
            carrier: "fedex".to_string(),
            message: format!("token response decode failed: {e}"),
        })?;

        let expires_at = Utc::now() + chrono::Duration::seconds(parsed.expires_in - 30);
        *self.token.lock() = Some(CachedToken {
            access_token: parsed.access_token.clone(),
            expires_at,
        });

        Ok(parsed.access_token)
    }
}

#[async_trait]
impl CarrierClient for FedexApiClient {
    fn kind(&self) -> ClientKind {
        ClientKind::Api
    }

    fn validate(&self, tracking_number: &str) -> bool {
        validators::validate("fedex", tracking_number)
    }

    async fn track(&self, request: TrackRequest) -> Result<TrackResponse, CarrierError> {
        let token = self.access_token().await?;
        let mut response = TrackResponse::default();

        let valid_numbers: Vec<&String> = request
            .tracking_numbers
            .iter()
            .filter(|tn| self.validate(tn))
            .collect();

        if valid_numbers.is_empty() {
            return Ok(response);
        }

        let track_requests: Vec<_> = valid_numbers
            .iter()
            .map(|tn| {
                serde_json::json!({
                    "trackingNumberInfo": { "trackingNumber": tn }
                })
            })
            .collect();

        let resp = self
            .http
            .post(format!("{}/track/v1/trackingnumbers", self.api_url))
            .bearer_auth(&token)
            .json(&serde_json::json!({ "trackingInfo": track_requests }))
            .send()
            .await
            .map_err(|e| CarrierError::Upstream {
                carrier: "fedex".to_string(),
                message: e.to_string(),
            })?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CarrierError::RateLimited {
                carrier: "fedex".to_string(),
            });
        }

        if !resp.status().is_success() {
            response.errors.push(TrackErrorDetail {
                carrier: "fedex".to_string(),
                code: resp.status().as_str().to_string(),
                message: format!("FedEx API returned HTTP {}", resp.status()),
                rate_limit: false,
                retryable: resp.status().is_server_error(),
            });
            return Ok(response);
        }

        let parsed: FedexTrackResponse = resp.json().await.map_err(|e| CarrierError::Upstream {
            carrier: "fedex".to_string(),
            message: format!("response decode failed: {e}"),
        })?;

        for result in parsed.output.complete_track_results {
            let Some(group) = result.track_results.into_iter().next() else {
                continue;
            };

            let status = group
                .latest_status_detail
                .map(|d| d.status_by_locale)
                .unwrap_or_else(|| "in_transit".to_string());

            let mut events: Vec<TrackEvent> = group
                .scan_events
                .into_iter()
                .map(|e| TrackEvent {
                    timestamp: e.date,
                    location: e.scan_location.and_then(|l| l.city),
                    status: status.clone(),
                    description: e.event_description,
                })
                .collect();
            events.sort_by_key(|e| e.timestamp);

            let is_delivered = status.eq_ignore_ascii_case("delivered");
            let last_updated = events.last().map(|e| e.timestamp);

            response.results.push(TrackResult {
                tracking_number: result.tracking_number,
                status,
                actual_delivery: if is_delivered { last_updated } else { None },
                last_updated,
                events,
            });
        }

        Ok(response)
    }
}
