//! Courier aggregator gateway.
//!
//! [`CourierGateway`] is the seam the shipment and lookup services depend on;
//! [`HttpCourierGateway`] is the reqwest implementation used in production.

pub mod client;
pub mod types;

use async_trait::async_trait;
use thiserror::Error;

use crate::errors::ServiceError;
pub use client::HttpCourierGateway;
pub use types::*;

/// Failures talking to the courier aggregator
#[derive(Debug, Error)]
pub enum CourierError {
    /// The provider answered with `status: false` or an error body
    #[error("{0}")]
    Rejected(String),

    #[error("courier request timed out")]
    Timeout,

    #[error("courier request failed: {0}")]
    Transport(String),

    #[error("unexpected courier response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for CourierError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CourierError::Timeout
        } else if err.is_decode() {
            CourierError::Decode(err.to_string())
        } else {
            CourierError::Transport(err.to_string())
        }
    }
}

impl From<CourierError> for ServiceError {
    fn from(err: CourierError) -> Self {
        ServiceError::ExternalServiceError(err.to_string())
    }
}

pub type CourierResult<T> = Result<T, CourierError>;

/// Operations offered by the courier aggregator. Implementations are stateless and
/// return only positively acknowledged responses.
#[async_trait]
pub trait CourierGateway: Send + Sync {
    async fn check_rate(&self, query: &RateQuery) -> CourierResult<Vec<CourierRate>>;

    async fn request_pickup(&self, request: &PickupRequest) -> CourierResult<PickupResponse>;

    async fn track(&self, awb: &str) -> CourierResult<TrackingResponse>;

    /// Voids a booking by our order number
    async fn void_order(&self, order_number: &str, reason: &str) -> CourierResult<CancelResponse>;

    async fn cancel_awb(&self, awb: &str, reason: &str) -> CourierResult<CancelResponse>;

    async fn provinces(&self) -> CourierResult<serde_json::Value>;

    async fn cities(&self, province_id: i64) -> CourierResult<serde_json::Value>;

    async fn districts(&self, city_id: i64) -> CourierResult<serde_json::Value>;

    async fn sub_districts(&self, district_id: i64) -> CourierResult<serde_json::Value>;

    async fn search_address(&self, keyword: &str) -> CourierResult<serde_json::Value>;

    async fn pickup_schedules(&self) -> CourierResult<serde_json::Value>;

    async fn couriers(&self) -> CourierResult<serde_json::Value>;
}
