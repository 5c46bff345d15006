//! The single error type surfaced at the HTTP edge.
//!
//! Every subsystem (store, cache, carrier clients, extractor) has its own
//! `thiserror` error enum; this module is the one place those get converted
//! into an HTTP status, following base spec §7's kind-to-status table.

use chrono::Utc;
use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::{Request, Response};
use rocket_okapi::OpenApiError;
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::Responses;
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use rocket_okapi::response::OpenApiResponderInner;
use serde::Serialize;
use std::io::Cursor;

use crate::carriers::CarrierError;
use crate::store::StoreError;

#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    NotFound(String),
    Conflict(String),
    RateLimited { message: String, retry_after_secs: u64 },
    UpstreamFailed { carrier: String, message: String },
    ServiceUnavailable(String),
    Internal(String),
}

/// RFC 7807-style problem details payload.
#[derive(Debug, Serialize, JsonSchema)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let (status, title, detail, problem_type, retry_after) = match self {
            ApiError::Validation(msg) => {
                log::debug!("validation error: {}", msg);
                (
                    Status::BadRequest,
                    "Validation Failed",
                    msg,
                    "https://docs.tracker/errors/validation",
                    None,
                )
            }
            ApiError::NotFound(msg) => {
                log::debug!("not found: {}", msg);
                (
                    Status::NotFound,
                    "Resource Not Found",
                    msg,
                    "https://docs.tracker/errors/not-found",
                    None,
                )
            }
            ApiError::Conflict(msg) => {
                log::info!("conflict: {}", msg);
                (
                    Status::Conflict,
                    "Conflict",
                    msg,
                    "https://docs.tracker/errors/conflict",
                    None,
                )
            }
            ApiError::RateLimited { message, retry_after_secs } => {
                log::info!("rate limited: {}", message);
                (
                    Status::TooManyRequests,
                    "Rate Limited",
                    message,
                    "https://docs.tracker/errors/rate-limited",
                    Some(retry_after_secs),
                )
            }
            ApiError::UpstreamFailed { carrier, message } => {
                log::warn!("upstream failed ({}): {}", carrier, message);
                (
                    Status::BadGateway,
                    "Upstream Carrier Error",
                    format!("{carrier}: {message}"),
                    "https://docs.tracker/errors/upstream-failed",
                    None,
                )
            }
            ApiError::ServiceUnavailable(msg) => {
                log::warn!("service unavailable: {}", msg);
                (
                    Status::ServiceUnavailable,
                    "Service Unavailable",
                    msg,
                    "https://docs.tracker/errors/service-unavailable",
                    None,
                )
            }
            ApiError::Internal(msg) => {
                log::error!("internal error: {}", msg);
                (
                    Status::InternalServerError,
                    "Internal Server Error",
                    "An internal server error occurred".to_string(),
                    "https://docs.tracker/errors/internal",
                    None,
                )
            }
        };

        let body = ProblemDetails {
            problem_type: problem_type.to_string(),
            title: title.to_string(),
            status: status.code,
            detail,
            instance: None,
            timestamp: Some(Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
        };

        let json = serde_json::to_string(&body).unwrap_or_else(|_| {
            r#"{"type":"about:blank","title":"Internal Server Error","status":500,"detail":"Failed to serialize error"}"#
                .to_string()
        });

        let mut builder = Response::build();
        builder
            .status(status)
            .header(rocket::http::ContentType::JSON)
            .sized_body(json.len(), Cursor::new(json));
        if let Some(secs) = retry_after {
            builder.raw_header("Retry-After", secs.to_string());
        }
        builder.ok()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("resource not found".to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => ApiError::NotFound(msg),
            StoreError::Conflict(msg) => ApiError::Conflict(msg),
            StoreError::Db(e) => ApiError::from(e),
        }
    }
}

impl From<CarrierError> for ApiError {
    fn from(err: CarrierError) -> Self {
        match err {
            CarrierError::RateLimited { .. } => ApiError::RateLimited {
                message: err.to_string(),
                retry_after_secs: 60,
            },
            CarrierError::NoClientAvailable(carrier) => {
                ApiError::ServiceUnavailable(format!("no client available for carrier {carrier}"))
            }
            other => ApiError::UpstreamFailed {
                carrier: other.carrier_code().to_string(),
                message: other.to_string(),
            },
        }
    }
}

impl OpenApiResponderInner for ApiError {
    fn responses(_generator: &mut OpenApiGenerator) -> Result<Responses, OpenApiError> {
        use rocket_okapi::okapi::openapi3::*;

        Ok(Responses {
            responses: rocket_okapi::okapi::map! {
                "400".to_string() => RefOr::Object(Response {
                    description: "Bad Request - validation failed".to_string(),
                    ..Default::default()
                }),
                "404".to_string() => RefOr::Object(Response {
                    description: "Not Found".to_string(),
                    ..Default::default()
                }),
                "409".to_string() => RefOr::Object(Response {
                    description: "Conflict - duplicate tracking number or already delivered".to_string(),
                    ..Default::default()
                }),
                "429".to_string() => RefOr::Object(Response {
                    description: "Rate Limited".to_string(),
                    ..Default::default()
                }),
                "502".to_string() => RefOr::Object(Response {
                    description: "Bad Gateway - carrier returned an error".to_string(),
                    ..Default::default()
                }),
                "503".to_string() => RefOr::Object(Response {
                    description: "Service Unavailable - no suitable carrier client".to_string(),
                    ..Default::default()
                }),
                "500".to_string() => RefOr::Object(Response {
                    description: "Internal Server Error".to_string(),
                    ..Default::default()
                }),
            },
            ..Default::default()
        })
    }
}
