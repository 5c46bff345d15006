//! In-memory carrier client for tests (base spec §0.5 test tooling):
//! configurable per-tracking-number results and errors, no network I/O.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::carriers::client::{
    CarrierClient, CarrierError, ClientKind, TrackRequest, TrackResponse, TrackResult,
};
use crate::carriers::validators;

pub struct MockCarrierClient {
    carrier_code: &'static str,
    kind: ClientKind,
    results: DashMap<String, TrackResult>,
    errors: DashMap<String, CarrierError>,
    fail_all_with: Option<CarrierError>,
}

impl MockCarrierClient {
    pub fn new(carrier_code: &'static str, kind: ClientKind) -> Self {
        Self {
            carrier_code,
            kind,
            results: DashMap::new(),
            errors: DashMap::new(),
            fail_all_with: None,
        }
    }

    pub fn with_result(self, tracking_number: &str, result: TrackResult) -> Self {
        self.results.insert(tracking_number.to_string(), result);
        self
    }

    pub fn with_rate_limit(mut self) -> Self {
        self.fail_all_with = Some(CarrierError::RateLimited {
            carrier: self.carrier_code.to_string(),
        });
        self
    }

    /// Records a per-tracking-number error returned alongside (rather than
    /// instead of) the batch's other results, exercising the `TrackResponse.errors`
    /// path distinct from `with_rate_limit`'s whole-call failure.
    pub fn with_error(self, tracking_number: &str, error: CarrierError) -> Self {
        self.errors.insert(tracking_number.to_string(), error);
        self
    }
}

#[async_trait]
impl CarrierClient for MockCarrierClient {
    fn kind(&self) -> ClientKind {
        self.kind
    }

    fn validate(&self, tracking_number: &str) -> bool {
        validators::validate(self.carrier_code, tracking_number)
    }

    async fn track(&self, request: TrackRequest) -> Result<TrackResponse, CarrierError> {
        if let Some(err) = &self.fail_all_with {
            return Err(match err {
                CarrierError::RateLimited { carrier } => CarrierError::RateLimited {
                    carrier: carrier.clone(),
                },
                CarrierError::Upstream { carrier, message } => CarrierError::Upstream {
                    carrier: carrier.clone(),
                    message: message.clone(),
                },
                CarrierError::NoClientAvailable(c) => CarrierError::NoClientAvailable(c.clone()),
            });
        }

        let mut response = TrackResponse::default();
        for tn in &request.tracking_numbers {
            if let Some(err) = self.errors.get(tn) {
                response.errors.push(crate::carriers::client::TrackErrorDetail {
                    carrier: self.carrier_code.to_string(),
                    code: "mock_error".to_string(),
                    message: err.to_string(),
                    rate_limit: matches!(*err, CarrierError::RateLimited { .. }),
                    retryable: true,
                });
                continue;
            }

            if let Some(result) = self.results.get(tn) {
                response.results.push(result.clone());
            }
        }

        Ok(response)
    }
}
