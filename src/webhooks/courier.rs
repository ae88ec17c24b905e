//! Courier status callbacks.
//!
//! The courier retries any non-200 answer, so every path here ends in a
//! [`WebhookOutcome`] that the HTTP layer acknowledges with 200. Errors are
//! logged and never surfaced to the caller.

use crate::{
    db::DbPool,
    entities::order::OrderStatus,
    errors::ServiceError,
    repositories::{OrderLookup, OrderRepository},
};
use chrono::Utc;
use metrics::counter;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Provider milestone codes. Failed delivery (400) and voided (500) both land
/// on CANCELLED; the order model has no separate failed state.
const STATUS_CODE_MAP: &[(i64, OrderStatus)] = &[
    (100, OrderStatus::Processing),
    (200, OrderStatus::Shipped),
    (300, OrderStatus::Delivered),
    (400, OrderStatus::Cancelled),
    (500, OrderStatus::Cancelled),
];

/// Re-reads allowed when the order status moves between our read and write
const MAX_APPLY_ATTEMPTS: usize = 3;

pub fn map_status_code(code: i64) -> Option<OrderStatus> {
    STATUS_CODE_MAP
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, status)| *status)
}

/// Callback body. Only the references and `status_code` drive reconciliation;
/// the rest is kept for logging.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CourierWebhookPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    pub awb: Option<String>,
    /// Our order number
    #[serde(default, deserialize_with = "lenient_string")]
    pub order_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub kj_order_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_code")]
    pub status_code: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub service: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub service_type: Option<String>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_code<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// How a callback was handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Malformed,
    MissingReference,
    OrderNotFound,
    AlreadyDelivered,
    AlreadyCancelled,
    UnknownStatusCode(Option<i64>),
    StatusUnchanged,
    Applied {
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        awb_backfilled: bool,
    },
    Failed,
}

impl WebhookOutcome {
    fn terminal(status: OrderStatus) -> Self {
        if status == OrderStatus::Delivered {
            WebhookOutcome::AlreadyDelivered
        } else {
            WebhookOutcome::AlreadyCancelled
        }
    }

    /// False only when the callback could not be acted on at all
    pub fn is_success(&self) -> bool {
        !matches!(
            self,
            WebhookOutcome::Malformed | WebhookOutcome::MissingReference | WebhookOutcome::Failed
        )
    }

    pub fn message(&self) -> &'static str {
        match self {
            WebhookOutcome::Malformed => "Invalid payload, ignored",
            WebhookOutcome::MissingReference => "Missing awb or order_id",
            WebhookOutcome::OrderNotFound => "Order not found, ignored",
            WebhookOutcome::AlreadyDelivered => "Already delivered, skipped",
            WebhookOutcome::AlreadyCancelled => "Already cancelled, skipped",
            WebhookOutcome::UnknownStatusCode(_) => "Unknown status_code, ignored",
            WebhookOutcome::StatusUnchanged => "Status unchanged",
            WebhookOutcome::Applied { .. } => "Webhook processed successfully",
            WebhookOutcome::Failed => "Internal error, has been logged",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            WebhookOutcome::Malformed => "malformed",
            WebhookOutcome::MissingReference => "missing_reference",
            WebhookOutcome::OrderNotFound => "not_found",
            WebhookOutcome::AlreadyDelivered => "already_delivered",
            WebhookOutcome::AlreadyCancelled => "already_cancelled",
            WebhookOutcome::UnknownStatusCode(_) => "unknown_code",
            WebhookOutcome::StatusUnchanged => "unchanged",
            WebhookOutcome::Applied { .. } => "applied",
            WebhookOutcome::Failed => "failed",
        }
    }
}

/// Body returned to the courier, always with HTTP 200
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookAck {
    pub success: bool,
    pub message: String,
}

impl From<&WebhookOutcome> for WebhookAck {
    fn from(outcome: &WebhookOutcome) -> Self {
        Self {
            success: outcome.is_success(),
            message: outcome.message().to_string(),
        }
    }
}

#[derive(Clone)]
pub struct CourierWebhookReconciler {
    orders: OrderRepository,
}

impl CourierWebhookReconciler {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self {
            orders: OrderRepository::new(db_pool),
        }
    }

    /// Parses and reconciles a raw callback body
    pub async fn handle_raw(&self, body: &[u8]) -> WebhookOutcome {
        match serde_json::from_slice::<CourierWebhookPayload>(body) {
            Ok(payload) => self.handle(payload).await,
            Err(err) => {
                warn!(error = %err, "courier webhook body is not valid JSON");
                record(WebhookOutcome::Malformed)
            }
        }
    }

    #[instrument(skip(self, payload), fields(awb = ?payload.awb, order_number = ?payload.order_id, status_code = ?payload.status_code))]
    pub async fn handle(&self, payload: CourierWebhookPayload) -> WebhookOutcome {
        let outcome = match self.reconcile(&payload).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(error = %err, "courier webhook processing failed");
                WebhookOutcome::Failed
            }
        };
        record(outcome)
    }

    async fn reconcile(
        &self,
        payload: &CourierWebhookPayload,
    ) -> Result<WebhookOutcome, ServiceError> {
        if payload.awb.is_none() && payload.order_id.is_none() {
            return Ok(WebhookOutcome::MissingReference);
        }
        let lookup = OrderLookup::AwbOrOrderNumber {
            awb: payload.awb.as_deref(),
            order_number: payload.order_id.as_deref(),
        };

        for _ in 0..MAX_APPLY_ATTEMPTS {
            let Some(order) = self.orders.find_order(lookup).await? else {
                return Ok(WebhookOutcome::OrderNotFound);
            };

            if order.status.is_terminal() {
                return Ok(WebhookOutcome::terminal(order.status));
            }

            let Some(next) = payload.status_code.and_then(map_status_code) else {
                return Ok(WebhookOutcome::UnknownStatusCode(payload.status_code));
            };
            if next == order.status {
                return Ok(WebhookOutcome::StatusUnchanged);
            }

            let backfill = payload.awb.as_deref().filter(|_| order.delivery_number.is_none());
            if self
                .orders
                .apply_courier_status(order.id, order.status, next, backfill, Utc::now())
                .await?
            {
                info!(
                    order_id = %order.id,
                    from = %order.status,
                    to = %next,
                    location = ?payload.location,
                    awb_backfilled = backfill.is_some(),
                    "order status updated from courier"
                );
                return Ok(WebhookOutcome::Applied {
                    order_id: order.id,
                    from: order.status,
                    to: next,
                    awb_backfilled: backfill.is_some(),
                });
            }

            debug!(order_id = %order.id, "order status moved during webhook, re-reading");
        }

        Err(ServiceError::Conflict(
            "order status kept changing while applying courier webhook".to_string(),
        ))
    }
}

fn record(outcome: WebhookOutcome) -> WebhookOutcome {
    counter!("courier_webhooks.received", 1, "outcome" => outcome.label());
    outcome
}
