/// Inbound webhook processing for external integrations
pub mod courier;

pub use courier::{
    map_status_code, CourierWebhookPayload, CourierWebhookReconciler, WebhookAck, WebhookOutcome,
};
