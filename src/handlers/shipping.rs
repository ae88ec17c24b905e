use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    courier::CourierRate,
    services::shipments::{
        CancelShipmentInput, CancellationConfirmation, CheckRateInput, CreateShipmentInput,
        ShipmentConfirmation, ShipmentTracking,
    },
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateShipmentRequest {
    pub order_id: Uuid,
    /// `YYYY-MM-DD HH:MM:SS`, business local time
    #[serde(default)]
    pub schedule: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DistrictSearchQuery {
    /// District or sub-district name, at least 3 characters
    pub q: String,
}

/// Quote courier services for a route
#[utoipa::path(
    post,
    path = "/api/v1/shipping/check-rate",
    request_body = CheckRateInput,
    responses(
        (status = 200, description = "Available courier services", body = ApiResponse<Vec<CourierRate>>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 502, description = "Courier rejected the request", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Shipping"
)]
pub async fn check_rate(
    State(state): State<AppState>,
    Json(input): Json<CheckRateInput>,
) -> ApiResult<Vec<CourierRate>> {
    let rates = state.services.shipments.check_rate(input).await?;
    Ok(Json(ApiResponse::success(rates)))
}

/// Book a courier pickup for an order
#[utoipa::path(
    post,
    path = "/api/v1/shipping/create",
    request_body = CreateShipmentRequest,
    responses(
        (status = 200, description = "Shipment booked", body = ApiResponse<ShipmentConfirmation>),
        (status = 400, description = "Order is not ready to ship", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order already booked", body = crate::errors::ErrorResponse),
        (status = 502, description = "Courier rejected the booking", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Shipping"
)]
pub async fn create_shipment(
    State(state): State<AppState>,
    Json(request): Json<CreateShipmentRequest>,
) -> ApiResult<ShipmentConfirmation> {
    let confirmation = state
        .services
        .shipments
        .create_shipment(
            request.order_id,
            CreateShipmentInput {
                schedule: request.schedule,
            },
        )
        .await?;
    Ok(Json(ApiResponse::success(confirmation)))
}

#[utoipa::path(
    get,
    path = "/api/v1/shipping/track/order/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Tracking detail", body = ApiResponse<ShipmentTracking>),
        (status = 400, description = "Order has no AWB yet", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Shipping"
)]
pub async fn track_by_order_id(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ShipmentTracking> {
    let tracking = state.services.shipments.track_by_order_id(id).await?;
    Ok(Json(ApiResponse::success(tracking)))
}

#[utoipa::path(
    get,
    path = "/api/v1/shipping/track/awb/{awb}",
    params(("awb" = String, Path, description = "Airway bill number")),
    responses(
        (status = 200, description = "Tracking detail", body = ApiResponse<ShipmentTracking>),
        (status = 502, description = "Courier rejected the request", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Shipping"
)]
pub async fn track_by_awb(
    State(state): State<AppState>,
    Path(awb): Path<String>,
) -> ApiResult<ShipmentTracking> {
    let tracking = state.services.shipments.track_by_awb(&awb).await?;
    Ok(Json(ApiResponse::success(tracking)))
}

/// Void the courier booking of an order
#[utoipa::path(
    post,
    path = "/api/v1/shipping/cancel/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = CancelShipmentInput,
    responses(
        (status = 200, description = "Shipment cancelled", body = ApiResponse<CancellationConfirmation>),
        (status = 400, description = "Order has no AWB", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Order already cancelled or delivered", body = crate::errors::ErrorResponse),
        (status = 502, description = "Courier rejected the cancellation", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Shipping"
)]
pub async fn cancel_shipment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    input: Option<Json<CancelShipmentInput>>,
) -> ApiResult<CancellationConfirmation> {
    let input = input.map(|Json(input)| input).unwrap_or_default();
    let confirmation = state
        .services
        .shipments
        .cancel_shipment(id, input, &user.user_id)
        .await?;
    Ok(Json(ApiResponse::success(confirmation)))
}

/// Cancel a shipment by AWB
#[utoipa::path(
    post,
    path = "/api/v1/shipping/cancel/awb/{awb}",
    params(("awb" = String, Path, description = "Airway bill number")),
    request_body = CancelShipmentInput,
    responses(
        (status = 200, description = "Shipment cancelled", body = ApiResponse<CancellationConfirmation>),
        (status = 404, description = "No order with this AWB", body = crate::errors::ErrorResponse),
        (status = 422, description = "Order already cancelled or delivered", body = crate::errors::ErrorResponse),
        (status = 502, description = "Courier rejected the cancellation", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Shipping"
)]
pub async fn cancel_by_awb(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(awb): Path<String>,
    input: Option<Json<CancelShipmentInput>>,
) -> ApiResult<CancellationConfirmation> {
    let input = input.map(|Json(input)| input).unwrap_or_default();
    let confirmation = state
        .services
        .shipments
        .cancel_by_awb(&awb, input, &user.user_id)
        .await?;
    Ok(Json(ApiResponse::success(confirmation)))
}

#[utoipa::path(
    get,
    path = "/api/v1/shipping/districts/search",
    params(DistrictSearchQuery),
    responses((status = 200, description = "Matching areas", body = ApiResponse<Value>)),
    security(("Bearer" = [])),
    tag = "Shipping"
)]
pub async fn search_districts(
    State(state): State<AppState>,
    Query(query): Query<DistrictSearchQuery>,
) -> ApiResult<Value> {
    let data = state.services.shipments.search_districts(&query.q).await?;
    Ok(Json(ApiResponse::success(data)))
}

#[utoipa::path(
    get,
    path = "/api/v1/shipping/provinces",
    responses((status = 200, description = "Provinces", body = ApiResponse<Value>)),
    security(("Bearer" = [])),
    tag = "Shipping"
)]
pub async fn provinces(State(state): State<AppState>) -> ApiResult<Value> {
    let data = state.services.shipments.provinces().await?;
    Ok(Json(ApiResponse::success(data)))
}

#[utoipa::path(
    get,
    path = "/api/v1/shipping/provinces/{id}/cities",
    params(("id" = i64, Path, description = "Province ID")),
    responses((status = 200, description = "Cities of the province", body = ApiResponse<Value>)),
    security(("Bearer" = [])),
    tag = "Shipping"
)]
pub async fn cities(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Value> {
    let data = state.services.shipments.cities(id).await?;
    Ok(Json(ApiResponse::success(data)))
}

#[utoipa::path(
    get,
    path = "/api/v1/shipping/cities/{id}/districts",
    params(("id" = i64, Path, description = "City ID")),
    responses((status = 200, description = "Districts of the city", body = ApiResponse<Value>)),
    security(("Bearer" = [])),
    tag = "Shipping"
)]
pub async fn districts(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Value> {
    let data = state.services.shipments.districts(id).await?;
    Ok(Json(ApiResponse::success(data)))
}

#[utoipa::path(
    get,
    path = "/api/v1/shipping/districts/{id}/sub-districts",
    params(("id" = i64, Path, description = "District ID")),
    responses((status = 200, description = "Sub-districts of the district", body = ApiResponse<Value>)),
    security(("Bearer" = [])),
    tag = "Shipping"
)]
pub async fn sub_districts(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Value> {
    let data = state.services.shipments.sub_districts(id).await?;
    Ok(Json(ApiResponse::success(data)))
}

#[utoipa::path(
    get,
    path = "/api/v1/shipping/schedules",
    responses((status = 200, description = "Available pickup schedules", body = ApiResponse<Value>)),
    security(("Bearer" = [])),
    tag = "Shipping"
)]
pub async fn pickup_schedules(State(state): State<AppState>) -> ApiResult<Value> {
    let data = state.services.shipments.pickup_schedules().await?;
    Ok(Json(ApiResponse::success(data)))
}

#[utoipa::path(
    get,
    path = "/api/v1/shipping/couriers",
    responses((status = 200, description = "Supported couriers", body = ApiResponse<Value>)),
    security(("Bearer" = [])),
    tag = "Shipping"
)]
pub async fn couriers(State(state): State<AppState>) -> ApiResult<Value> {
    let data = state.services.shipments.couriers().await?;
    Ok(Json(ApiResponse::success(data)))
}
