//! Pluggable carrier tracking clients (base spec §4.2, §4.9).

pub mod client;
pub mod fedex;
pub mod http;
pub mod mock;
pub mod registry;
pub mod validators;

pub use client::{CarrierClient, CarrierError, ClientKind, TrackRequest, TrackResponse, TrackResult};
pub use registry::CarrierRegistry;
