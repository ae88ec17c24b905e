use crate::{
    config::{AppConfig, ShipperConfig},
    courier::{
        CourierGateway, CourierPackage, CourierRate, PickupRequest, RateQuery, TrackingDetails,
        TrackingHistory,
    },
    db::DbPool,
    entities::{
        order::{self, OrderStatus},
        order_item,
    },
    errors::ServiceError,
    repositories::{OrderLookup, OrderRepository},
};
use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, NaiveDateTime, Offset, Utc};
use metrics::counter;
use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

pub const SCHEDULE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DEFAULT_CANCEL_REASON: &str = "Pembatalan oleh sistem";
/// Centimetres, used when no item carries dimensions
const DEFAULT_DIMENSION: i64 = 10;
const PACKAGE_TYPE_ID: u8 = 7;
const DEFAULT_PICKUP_LEAD_HOURS: i64 = 2;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CheckRateInput {
    /// Defaults to the shipper's district
    #[validate(range(min = 1))]
    pub origin_district_id: Option<i64>,
    #[validate(range(min = 1))]
    pub destination_district_id: i64,
    /// Grams
    #[validate(range(min = 1, message = "weight must be positive"))]
    pub weight: i64,
    #[validate(range(min = 0))]
    pub item_value: Option<i64>,
    #[serde(default)]
    pub cod: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateShipmentInput {
    /// `YYYY-MM-DD HH:MM:SS` in business local time; defaults to two hours from now
    #[validate(length(min = 1))]
    pub schedule: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct CancelShipmentInput {
    #[validate(length(min = 1, max = 255))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShipmentConfirmation {
    pub order_id: Uuid,
    pub order_number: String,
    /// May be null when the courier assigns it later; a webhook fills it in
    pub awb: Option<String>,
    pub pickup_number: Option<String>,
    pub schedule: String,
    pub status: OrderStatus,
    pub payment_status: Option<String>,
    pub qr_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShipmentTracking {
    pub awb: String,
    pub details: Option<TrackingDetails>,
    pub histories: Vec<TrackingHistory>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CancellationConfirmation {
    pub order_id: Uuid,
    pub order_number: String,
    pub awb: String,
    pub status: OrderStatus,
    pub reason: String,
    /// Provider's acknowledgement text
    pub message: Option<String>,
}

/// Process-wide shipment settings taken from [`AppConfig`]
#[derive(Debug, Clone)]
pub struct ShipmentSettings {
    pub shipper: ShipperConfig,
    pub business_offset: FixedOffset,
    pub claim_ttl: Duration,
}

impl From<&AppConfig> for ShipmentSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            shipper: config.shipper.clone(),
            business_offset: FixedOffset::east_opt(config.business_utc_offset_hours * 3600)
                .unwrap_or_else(|| Utc.fix()),
            claim_ttl: config.shipment_claim_ttl(),
        }
    }
}

/// Pickup time two hours from `now`, rendered in the business timezone
pub fn default_pickup_schedule(now: DateTime<Utc>, offset: FixedOffset) -> String {
    (now + ChronoDuration::hours(DEFAULT_PICKUP_LEAD_HOURS))
        .with_timezone(&offset)
        .format(SCHEDULE_FORMAT)
        .to_string()
}

fn parse_schedule(schedule: &str) -> Result<String, ServiceError> {
    let schedule = schedule.trim();
    NaiveDateTime::parse_from_str(schedule, SCHEDULE_FORMAT)
        .map(|parsed| parsed.format(SCHEDULE_FORMAT).to_string())
        .map_err(|_| {
            ServiceError::ValidationError(format!(
                "schedule must look like YYYY-MM-DD HH:MM:SS, got '{}'",
                schedule
            ))
        })
}

/// Rupiah amounts go to the courier as whole units, half rounded away from zero
fn whole_units(value: Decimal, field: &str) -> Result<i64, ServiceError> {
    value
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| {
            ServiceError::ValidationError(format!("{} is out of range: {}", field, value))
        })
}

fn ceil_dimension(values: impl Iterator<Item = Option<Decimal>>) -> Option<i64> {
    values
        .flatten()
        .filter(|v| *v > Decimal::ZERO)
        .max()
        .and_then(|v| v.ceil().to_i64())
}

/// Shipping readiness checks that do not depend on the items
fn ensure_shippable(order: &order::Model) -> Result<(String, String, i64, i64), ServiceError> {
    let service = order
        .service
        .clone()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| {
            ServiceError::ValidationError(format!(
                "Order {} has no courier service selected",
                order.order_number
            ))
        })?;
    let service_type = order
        .service_type
        .clone()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| {
            ServiceError::ValidationError(format!(
                "Order {} has no courier service type selected",
                order.order_number
            ))
        })?;

    match (order.shipping_district_id, order.shipping_sub_district_id) {
        (Some(district), Some(sub_district)) if district > 0 && sub_district > 0 => {
            Ok((service, service_type, district, sub_district))
        }
        _ => Err(ServiceError::ValidationError(format!(
            "Order {} shipping address has no courier district/sub-district codes",
            order.order_number
        ))),
    }
}

/// Builds the single-package pickup request for an order. Dimensions take the
/// largest item on each axis.
pub fn build_pickup_request(
    shipper: &ShipperConfig,
    order: &order::Model,
    items: &[order_item::Model],
    schedule: String,
) -> Result<PickupRequest, ServiceError> {
    let (service, service_type, district_id, sub_district_id) = ensure_shippable(order)?;

    let weight: i64 = items
        .iter()
        .map(|item| i64::from(item.weight.unwrap_or(0)) * i64::from(item.quantity))
        .sum();
    if weight <= 0 {
        return Err(ServiceError::ValidationError(format!(
            "Order {} has zero total weight",
            order.order_number
        )));
    }

    let item_value = whole_units(items.iter().map(|item| item.subtotal).sum(), "item value")?;
    let item_name = items
        .iter()
        .map(|item| format!("{} {}", item.quantity, item.product_name))
        .collect::<Vec<_>>()
        .join(", ");

    let package = CourierPackage {
        order_id: order.order_number.clone(),
        destination_name: order.customer_name.clone(),
        destination_phone: format!("{}{}", order.customer_country_code, order.customer_phone),
        destination_address: order.shipping_address.clone(),
        destination_kecamatan_id: district_id,
        destination_kelurahan_id: sub_district_id,
        destination_zipcode: order.shipping_zip_code.clone().unwrap_or_default(),
        weight,
        width: ceil_dimension(items.iter().map(|i| i.width)).unwrap_or(DEFAULT_DIMENSION),
        height: ceil_dimension(items.iter().map(|i| i.height)).unwrap_or(DEFAULT_DIMENSION),
        length: ceil_dimension(items.iter().map(|i| i.length)).unwrap_or(DEFAULT_DIMENSION),
        item_value,
        shipping_cost: whole_units(order.shipping_cost, "shipping cost")?,
        service,
        service_type,
        item_name,
        package_type_id: PACKAGE_TYPE_ID,
        cod: if order.is_cod { item_value } else { 0 },
        drop: order.is_drop_off,
        note: order.notes.clone().filter(|n| !n.trim().is_empty()),
    };

    Ok(PickupRequest {
        name: shipper.name.clone(),
        phone: shipper.phone.clone(),
        address: shipper.address.clone(),
        kecamatan_id: shipper.district_id,
        kelurahan_id: shipper.sub_district_id,
        zipcode: shipper.zip_code.clone(),
        schedule,
        packages: vec![package],
    })
}

fn ensure_cancellable(order: &order::Model) -> Result<(), ServiceError> {
    if order.status.is_terminal() {
        return Err(ServiceError::InvalidState(format!(
            "Order {} is already {} and can no longer be cancelled",
            order.order_number, order.status
        )));
    }
    Ok(())
}

fn cancel_reason(reason: Option<String>) -> String {
    reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| DEFAULT_CANCEL_REASON.to_string())
}

/// Courier-facing order operations: rates, booking, tracking and cancellation,
/// plus passthrough location lookups.
#[derive(Clone)]
pub struct ShipmentService {
    orders: OrderRepository,
    gateway: Arc<dyn CourierGateway>,
    settings: ShipmentSettings,
}

impl ShipmentService {
    pub fn new(
        db_pool: Arc<DbPool>,
        gateway: Arc<dyn CourierGateway>,
        settings: ShipmentSettings,
    ) -> Self {
        Self {
            orders: OrderRepository::new(db_pool),
            gateway,
            settings,
        }
    }

    #[instrument(skip(self, input))]
    pub async fn check_rate(&self, input: CheckRateInput) -> Result<Vec<CourierRate>, ServiceError> {
        input.validate()?;
        let query = RateQuery {
            origin_district_id: input
                .origin_district_id
                .unwrap_or(self.settings.shipper.district_id),
            destination_district_id: input.destination_district_id,
            weight: input.weight,
            item_value: input.item_value.unwrap_or(0),
            cod: u8::from(input.cod),
        };
        Ok(self.gateway.check_rate(&query).await?)
    }

    /// Books a courier pickup for the order. At most one booking per order:
    /// the order is claimed in the database before the courier is called.
    #[instrument(skip(self, input), fields(order_id = %order_id))]
    pub async fn create_shipment(
        &self,
        order_id: Uuid,
        input: CreateShipmentInput,
    ) -> Result<ShipmentConfirmation, ServiceError> {
        input.validate()?;
        let (order, items) = self
            .orders
            .find_order_with_items(order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if let Some(awb) = &order.delivery_number {
            return Err(ServiceError::Conflict(format!(
                "Order {} already has AWB {}",
                order.order_number, awb
            )));
        }
        if order.is_booked() {
            return Err(ServiceError::Conflict(format!(
                "Order {} is already booked and awaiting its AWB",
                order.order_number
            )));
        }
        if !matches!(order.status, OrderStatus::Pending | OrderStatus::Confirmed) {
            return Err(ServiceError::InvalidState(format!(
                "Order {} is {} and cannot be shipped",
                order.order_number, order.status
            )));
        }

        let now = Utc::now();
        let schedule = match input.schedule.as_deref() {
            Some(schedule) => parse_schedule(schedule)?,
            None => default_pickup_schedule(now, self.settings.business_offset),
        };
        let request = build_pickup_request(&self.settings.shipper, &order, &items, schedule)?;

        if !self
            .orders
            .claim_shipment(order.id, now, self.settings.claim_ttl)
            .await?
        {
            return Err(ServiceError::Conflict(format!(
                "Shipment booking for order {} is already in progress or completed",
                order.order_number
            )));
        }

        let response = match self.gateway.request_pickup(&request).await {
            Ok(response) => response,
            Err(err) => {
                counter!("shipments.booking_failures", 1);
                if let Err(release_err) = self.orders.release_shipment_claim(order.id).await {
                    error!(order_id = %order.id, error = %release_err, "failed to release shipment claim");
                }
                return Err(err.into());
            }
        };

        let awb = response.awb_for(&order.order_number);
        let recorded = match self
            .orders
            .record_shipment_booking(
                order.id,
                awb.clone(),
                response.pickup_number.clone(),
                &request.schedule,
                Utc::now(),
            )
            .await
        {
            Ok(recorded) => recorded,
            Err(err) => {
                self.keep_booked(&order, response.pickup_number.clone()).await;
                return Err(err);
            }
        };

        let mut status = OrderStatus::Confirmed;
        if !recorded {
            self.keep_booked(&order, response.pickup_number.clone()).await;
            // A courier callback may have stored the same AWB first
            let current = self.orders.find_order(OrderLookup::Id(order.id)).await?;
            match current {
                Some(current) if awb.is_some() && current.delivery_number == awb => {
                    status = current.status;
                }
                _ => {
                    error!(
                        order_id = %order.id,
                        awb = ?awb,
                        pickup_number = ?response.pickup_number,
                        "courier booking could not be recorded"
                    );
                    return Err(ServiceError::Conflict(format!(
                        "Order {} changed while the shipment was being booked",
                        order.order_number
                    )));
                }
            }
        }

        counter!("shipments.booked", 1, "service" => request.packages[0].service.clone());
        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            awb = ?awb,
            pickup_number = ?response.pickup_number,
            "shipment booked"
        );
        if awb.is_none() {
            warn!(order_id = %order.id, "courier returned no AWB yet; awaiting webhook");
        }

        Ok(ShipmentConfirmation {
            order_id: order.id,
            order_number: order.order_number,
            awb,
            pickup_number: response.pickup_number,
            schedule: request.schedule,
            status,
            payment_status: response.payment_status,
            qr_url: response.qr_url,
        })
    }

    /// The courier holds a booking for this order; make sure it is never claimed again
    async fn keep_booked(&self, order: &order::Model, pickup_number: Option<String>) {
        if let Err(err) = self
            .orders
            .mark_shipment_booked(order.id, pickup_number, Utc::now())
            .await
        {
            error!(
                order_id = %order.id,
                order_number = %order.order_number,
                error = %err,
                "failed to mark order as booked after courier acknowledgement"
            );
        }
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn track_by_order_id(&self, order_id: Uuid) -> Result<ShipmentTracking, ServiceError> {
        let order = self.find_order(order_id).await?;
        let awb = order.delivery_number.ok_or_else(|| {
            ServiceError::ValidationError(format!(
                "Order {} has no AWB to track yet",
                order.order_number
            ))
        })?;
        self.track_by_awb(&awb).await
    }

    #[instrument(skip(self))]
    pub async fn track_by_awb(&self, awb: &str) -> Result<ShipmentTracking, ServiceError> {
        let awb = awb.trim();
        if awb.is_empty() {
            return Err(ServiceError::ValidationError("awb is required".to_string()));
        }
        let response = self.gateway.track(awb).await?;
        Ok(ShipmentTracking {
            awb: awb.to_string(),
            details: response.details,
            histories: response.histories,
        })
    }

    /// Voids the courier booking by order number, then marks the order CANCELLED
    #[instrument(skip(self, input), fields(order_id = %order_id))]
    pub async fn cancel_shipment(
        &self,
        order_id: Uuid,
        input: CancelShipmentInput,
        actor_id: &str,
    ) -> Result<CancellationConfirmation, ServiceError> {
        input.validate()?;
        let order = self.find_order(order_id).await?;
        let awb = order.delivery_number.clone().ok_or_else(|| {
            ServiceError::ValidationError(format!(
                "Order {} has no AWB; there is no shipment to cancel",
                order.order_number
            ))
        })?;
        ensure_cancellable(&order)?;

        let reason = cancel_reason(input.reason);
        let response = self
            .gateway
            .void_order(&order.order_number, &reason)
            .await?;

        self.finish_cancellation(order, awb, reason, response.text, actor_id)
            .await
    }

    /// Cancels by AWB through the courier's shipment-cancel endpoint
    #[instrument(skip(self, input))]
    pub async fn cancel_by_awb(
        &self,
        awb: &str,
        input: CancelShipmentInput,
        actor_id: &str,
    ) -> Result<CancellationConfirmation, ServiceError> {
        input.validate()?;
        let awb = awb.trim();
        if awb.is_empty() {
            return Err(ServiceError::ValidationError("awb is required".to_string()));
        }
        let order = self
            .orders
            .find_order(OrderLookup::Awb(awb))
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("No order with AWB {}", awb)))?;
        ensure_cancellable(&order)?;

        let reason = cancel_reason(input.reason);
        let response = self.gateway.cancel_awb(awb, &reason).await?;

        self.finish_cancellation(order, awb.to_string(), reason, response.text, actor_id)
            .await
    }

    async fn finish_cancellation(
        &self,
        order: order::Model,
        awb: String,
        reason: String,
        message: Option<String>,
        actor_id: &str,
    ) -> Result<CancellationConfirmation, ServiceError> {
        let actor = Some(actor_id).filter(|a| !a.trim().is_empty());
        if !self.orders.mark_cancelled(order.id, actor, Utc::now()).await? {
            let current = self.find_order(order.id).await?;
            if current.status != OrderStatus::Cancelled {
                warn!(
                    order_id = %order.id,
                    status = %current.status,
                    "courier cancelled the shipment but the order reached a terminal status first"
                );
                return Err(ServiceError::InvalidState(format!(
                    "Order {} is {} and was not marked cancelled",
                    current.order_number, current.status
                )));
            }
        }

        counter!("shipments.cancelled", 1);
        info!(order_id = %order.id, awb = %awb, reason = %reason, "shipment cancelled");

        Ok(CancellationConfirmation {
            order_id: order.id,
            order_number: order.order_number,
            awb,
            status: OrderStatus::Cancelled,
            reason,
            message,
        })
    }

    async fn find_order(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        self.orders
            .find_order(OrderLookup::Id(order_id))
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    pub async fn provinces(&self) -> Result<serde_json::Value, ServiceError> {
        Ok(self.gateway.provinces().await?)
    }

    pub async fn cities(&self, province_id: i64) -> Result<serde_json::Value, ServiceError> {
        Ok(self.gateway.cities(province_id).await?)
    }

    pub async fn districts(&self, city_id: i64) -> Result<serde_json::Value, ServiceError> {
        Ok(self.gateway.districts(city_id).await?)
    }

    pub async fn sub_districts(&self, district_id: i64) -> Result<serde_json::Value, ServiceError> {
        Ok(self.gateway.sub_districts(district_id).await?)
    }

    pub async fn search_districts(&self, keyword: &str) -> Result<serde_json::Value, ServiceError> {
        let keyword = keyword.trim();
        if keyword.chars().count() < 3 {
            return Err(ServiceError::ValidationError(
                "search keyword must have at least 3 characters".to_string(),
            ));
        }
        Ok(self.gateway.search_address(keyword).await?)
    }

    pub async fn pickup_schedules(&self) -> Result<serde_json::Value, ServiceError> {
        Ok(self.gateway.pickup_schedules().await?)
    }

    pub async fn couriers(&self) -> Result<serde_json::Value, ServiceError> {
        Ok(self.gateway.couriers().await?)
    }
}
