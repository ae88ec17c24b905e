//! Courier Orders API
//!
//! Order lifecycle management with courier shipment booking, tracking and
//! webhook reconciliation.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod courier;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod repositories;
pub mod services;
pub mod tracing;
pub mod webhooks;

use axum::{
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use http::HeaderValue;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};
use utoipa::ToSchema;

use crate::auth::{roles, AuthRouterExt, AuthService};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
    pub auth: Arc<AuthService>,
}

// Common response wrappers
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}


/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Routes mounted under `/api/v1`
pub fn api_v1_routes(webhook_secret: Option<&str>) -> Router<AppState> {
    // Orders routes gated on order-manager roles
    let orders = Router::new()
        .route(
            "/orders",
            get(handlers::orders::list_orders).post(handlers::orders::create_order),
        )
        .route(
            "/orders/:id",
            get(handlers::orders::get_order)
                .put(handlers::orders::update_order)
                .delete(handlers::orders::delete_order),
        )
        .with_roles(roles::ORDER_MANAGERS);

    let shipping = Router::new()
        .route(
            "/shipping/check-rate",
            post(handlers::shipping::check_rate),
        )
        .route(
            "/shipping/create",
            post(handlers::shipping::create_shipment),
        )
        .route(
            "/shipping/track/order/:id",
            get(handlers::shipping::track_by_order_id),
        )
        .route(
            "/shipping/track/awb/:awb",
            get(handlers::shipping::track_by_awb),
        )
        .route(
            "/shipping/cancel/:id",
            post(handlers::shipping::cancel_shipment),
        )
        .route(
            "/shipping/cancel/awb/:awb",
            post(handlers::shipping::cancel_by_awb),
        )
        .route(
            "/shipping/districts/search",
            get(handlers::shipping::search_districts),
        )
        .route("/shipping/provinces", get(handlers::shipping::provinces))
        .route(
            "/shipping/provinces/:id/cities",
            get(handlers::shipping::cities),
        )
        .route(
            "/shipping/cities/:id/districts",
            get(handlers::shipping::districts),
        )
        .route(
            "/shipping/districts/:id/sub-districts",
            get(handlers::shipping::sub_districts),
        )
        .route(
            "/shipping/schedules",
            get(handlers::shipping::pickup_schedules),
        )
        .route("/shipping/couriers", get(handlers::shipping::couriers))
        .with_roles(roles::ORDER_MANAGERS);

    // Courier callbacks carry no bearer token; optionally gated on a shared secret
    let mut courier_webhook = Router::new().route(
        "/webhooks/courier",
        post(handlers::webhooks::courier_webhook),
    );
    if let Some(secret) = webhook_secret.map(str::trim).filter(|s| !s.is_empty()) {
        courier_webhook = courier_webhook.layer(axum::middleware::from_fn_with_state(
            Arc::new(secret.to_string()),
            middleware_helpers::webhook_secret_middleware,
        ));
    }

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .merge(orders)
        .merge(shipping)
        .merge(courier_webhook)
}

/// CORS from a comma-separated origin list; permissive only in development
pub fn cors_layer(cfg: &config::AppConfig) -> CorsLayer {
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    match configured_origins {
        Some(origins) => CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any),
        None if cfg.is_development() => CorsLayer::permissive(),
        None => CorsLayer::new(),
    }
}

/// Full application router with the shared middleware stack
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    let webhook_secret = state.config.webhook_secret.clone();

    Router::<AppState>::new()
        .nest("/api/v1", api_v1_routes(webhook_secret.as_deref()))
        .merge(openapi::openapi_routes())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(cors)
        // Inject AuthService into request extensions for auth middleware
        .layer(axum::middleware::from_fn_with_state(
            state.auth.clone(),
            |axum::extract::State(auth): axum::extract::State<Arc<AuthService>>,
             mut req: axum::http::Request<axum::body::Body>,
             next: axum::middleware::Next| async move {
                req.extensions_mut().insert(auth);
                next.run(req).await
            },
        ))
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
}
