//! Headless/scraping client shared by the four carriers that have no public
//! credential-free tracking API (base spec §1: "the specific HTML layouts
//! of carrier web pages" are out of scope — only the consumed interface is
//! specified here, so parsing is a best-effort keyword scan of the fetched
//! page text rather than a layout-specific scraper).

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;

use crate::carriers::client::{
    CarrierClient, CarrierError, ClientKind, TrackEvent, TrackErrorDetail, TrackRequest,
    TrackResponse, TrackResult,
};
use crate::carriers::validators;

/// Keyword -> normalized status, checked in order against the fetched page text.
const STATUS_KEYWORDS: &[(&str, &str)] = &[
    ("delivered", "delivered"),
    ("out for delivery", "out_for_delivery"),
    ("exception", "exception"),
    ("delay", "exception"),
    ("in transit", "in_transit"),
    ("picked up", "in_transit"),
    ("label created", "pending"),
];

pub struct WebCarrierClient {
    carrier_code: &'static str,
    kind: ClientKind,
    tracking_url_template: &'static str,
    http: Client,
}

impl WebCarrierClient {
    pub fn new(
        carrier_code: &'static str,
        kind: ClientKind,
        tracking_url_template: &'static str,
        http: Client,
    ) -> Self {
        Self {
            carrier_code,
            kind,
            tracking_url_template,
            http,
        }
    }

    fn url_for(&self, tracking_number: &str) -> String {
        self.tracking_url_template.replace("{tn}", tracking_number)
    }

    fn status_from_page(&self, body: &str) -> String {
        let lower = body.to_lowercase();
        STATUS_KEYWORDS
            .iter()
            .find(|(kw, _)| lower.contains(kw))
            .map(|(_, status)| status.to_string())
            .unwrap_or_else(|| "in_transit".to_string())
    }
}

#[async_trait]
impl CarrierClient for WebCarrierClient {
    fn kind(&self) -> ClientKind {
        self.kind
    }

    fn validate(&self, tracking_number: &str) -> bool {
        validators::validate(self.carrier_code, tracking_number)
    }

    async fn track(&self, request: TrackRequest) -> Result<TrackResponse, CarrierError> {
        let mut response = TrackResponse::default();

        for tracking_number in &request.tracking_numbers {
            if !self.validate(tracking_number) {
                continue;
            }

            let url = self.url_for(tracking_number);
            let fetch = self.http.get(&url).send().await;

            match fetch {
                Ok(resp) if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS => {
                    return Err(CarrierError::RateLimited {
                        carrier: self.carrier_code.to_string(),
                    });
                }
                Ok(resp) if !resp.status().is_success() => {
                    response.errors.push(TrackErrorDetail {
                        carrier: self.carrier_code.to_string(),
                        code: resp.status().as_str().to_string(),
                        message: format!("carrier returned HTTP {}", resp.status()),
                        rate_limit: false,
                        retryable: resp.status().is_server_error(),
                    });
                }
                Ok(resp) => {
                    let body = resp.text().await.unwrap_or_default();
                    let status = self.status_from_page(&body);
                    let now = Utc::now();
                    response.results.push(TrackResult {
                        tracking_number: tracking_number.clone(),
                        status: status.clone(),
                        events: vec![TrackEvent {
                            timestamp: now,
                            location: None,
                            status: status.clone(),
                            description: format!("Status updated: {status}"),
                        }],
                        last_updated: Some(now),
                        actual_delivery: if status == "delivered" { Some(now) } else { None },
                    });
                }
                Err(e) => {
                    response.errors.push(TrackErrorDetail {
                        carrier: self.carrier_code.to_string(),
                        code: "fetch_failed".to_string(),
                        message: e.to_string(),
                        rate_limit: false,
                        retryable: true,
                    });
                }
            }
        }

        Ok(response)
    }
}
