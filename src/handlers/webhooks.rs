use axum::{extract::State, Json};
use bytes::Bytes;

use crate::{webhooks::WebhookAck, AppState};

/// Courier status callback. Always answers 200 so the courier stops retrying;
/// the body says whether the callback was acted on.
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/courier",
    request_body = crate::webhooks::CourierWebhookPayload,
    responses(
        (status = 200, description = "Callback acknowledged", body = WebhookAck),
        (status = 401, description = "Shared secret mismatch (only when a secret is configured)")
    ),
    tag = "Webhooks"
)]
pub async fn courier_webhook(State(state): State<AppState>, body: Bytes) -> Json<WebhookAck> {
    let outcome = state.services.courier_webhooks.handle_raw(&body).await;
    Json(WebhookAck::from(&outcome))
}
