use axum::{routing::get, Json, Router};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Courier Orders API",
        version = "1.0.0",
        description = r#"
# Courier Orders API

Order management with courier shipment booking.

## Features

- **Orders**: create, update and soft-delete orders with snapshot pricing
- **Shipping**: courier rates, pickup booking, tracking and cancellation
- **Webhooks**: courier status callbacks reconciled onto orders

## Authentication

Order and shipping endpoints require a JWT bearer token carrying the `SUPER_ADMIN` or `ADMIN` role:

```
Authorization: Bearer <your-jwt-token>
```

The courier webhook is not bearer-authenticated. When a shared secret is configured it must be sent in `x-webhook-secret`.

## Error Handling

```json
{
  "error": "Bad Request",
  "message": "Order must contain at least one item",
  "request_id": "3f0c…",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Orders", description = "Order lifecycle endpoints"),
        (name = "Shipping", description = "Courier shipment endpoints"),
        (name = "Webhooks", description = "Inbound courier callbacks"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        // Orders
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::create_order,
        crate::handlers::orders::update_order,
        crate::handlers::orders::delete_order,

        // Shipping
        crate::handlers::shipping::check_rate,
        crate::handlers::shipping::create_shipment,
        crate::handlers::shipping::track_by_order_id,
        crate::handlers::shipping::track_by_awb,
        crate::handlers::shipping::cancel_shipment,
        crate::handlers::shipping::cancel_by_awb,
        crate::handlers::shipping::search_districts,
        crate::handlers::shipping::provinces,
        crate::handlers::shipping::cities,
        crate::handlers::shipping::districts,
        crate::handlers::shipping::sub_districts,
        crate::handlers::shipping::pickup_schedules,
        crate::handlers::shipping::couriers,

        // Webhooks
        crate::handlers::webhooks::courier_webhook,

        // Health
        crate::handlers::health::health_check,
    ),
    components(
        schemas(
            crate::entities::OrderStatus,
            crate::services::orders::OrderItemInput,
            crate::services::orders::OrderItemResponse,
            crate::services::orders::OrderSummary,
            crate::courier::TrackingDetails,
            crate::courier::TrackingHistory,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDocV1;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "Bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Serves the generated document at `/api-docs/openapi.json`
pub fn openapi_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDocV1::openapi()) }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_order_and_shipping_paths() {
        let doc = ApiDocV1::openapi();
        assert!(doc.paths.paths.contains_key("/api/v1/orders"));
        assert!(doc.paths.paths.contains_key("/api/v1/orders/{id}"));
        assert!(doc.paths.paths.contains_key("/api/v1/shipping/create"));
        assert!(doc.paths.paths.contains_key("/api/v1/webhooks/courier"));
        assert!(doc
            .components
            .as_ref()
            .map(|c| c.security_schemes.contains_key("Bearer"))
            .unwrap_or(false));
    }
}
