//! Wire types for the courier aggregator API.
//!
//! Field names follow the provider's JSON. Every response carries `status` and `text`;
//! a `false` status is a rejection whatever the HTTP code was.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

/// Fields common to every provider response
pub trait Acknowledged {
    fn is_ok(&self) -> bool;
    fn text(&self) -> Option<&str>;
}

macro_rules! acknowledged {
    ($($ty:ty),* $(,)?) => {
        $(impl Acknowledged for $ty {
            fn is_ok(&self) -> bool {
                self.status
            }

            fn text(&self) -> Option<&str> {
                self.text.as_deref()
            }
        })*
    };
}

/// Query for `GET /api/mitra/v2/check-price`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateQuery {
    pub origin_district_id: i64,
    pub destination_district_id: i64,
    /// Grams
    pub weight: i64,
    pub item_value: i64,
    /// Provider expects `1`/`0`
    pub cod: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CourierRate {
    pub service: String,
    pub service_type: String,
    #[serde(default)]
    pub service_label: Option<String>,
    #[schema(value_type = f64)]
    pub price: Decimal,
    #[serde(default, alias = "etd")]
    pub estimated_day: Option<String>,
    #[serde(default)]
    pub cod: bool,
    #[serde(default)]
    pub insurance: bool,
    #[serde(default)]
    #[schema(value_type = f64)]
    pub insurance_fee: Decimal,
    #[serde(default)]
    #[schema(value_type = f64)]
    pub cod_fee: Decimal,
    #[serde(default)]
    pub weight: Option<i64>,
    #[serde(default)]
    pub min_weight: Option<i64>,
    #[serde(default)]
    pub group: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckPricingResponse {
    pub status: bool,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Vec<CourierRate>,
}

/// One parcel in a pickup request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourierPackage {
    /// Our order number
    pub order_id: String,
    pub destination_name: String,
    pub destination_phone: String,
    pub destination_address: String,
    pub destination_kecamatan_id: i64,
    pub destination_kelurahan_id: i64,
    pub destination_zipcode: String,
    /// Grams
    pub weight: i64,
    /// Centimetres
    pub width: i64,
    pub height: i64,
    pub length: i64,
    pub item_value: i64,
    pub shipping_cost: i64,
    pub service: String,
    pub service_type: String,
    pub item_name: String,
    pub package_type_id: u8,
    /// COD amount to collect, 0 when prepaid
    pub cod: i64,
    pub drop: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Body for `POST /api/mitra/v5/request_pickup`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PickupRequest {
    pub name: String,
    pub phone: String,
    pub address: String,
    pub kecamatan_id: i64,
    pub kelurahan_id: i64,
    pub zipcode: String,
    /// `YYYY-MM-DD HH:MM:SS`
    pub schedule: String,
    pub packages: Vec<CourierPackage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PickupDetail {
    pub order_id: String,
    #[serde(default)]
    pub kj_order_id: Option<String>,
    /// Can still be null right after booking
    #[serde(default)]
    pub awb: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub service_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PickupResponse {
    pub status: bool,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub qr_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub details: Vec<PickupDetail>,
    #[serde(default)]
    pub pickup_number: Option<String>,
}

impl PickupResponse {
    /// AWB for the given order number, falling back to the first detail
    pub fn awb_for(&self, order_number: &str) -> Option<String> {
        self.details
            .iter()
            .find(|d| d.order_id == order_number)
            .or_else(|| self.details.first())
            .and_then(|d| d.awb.clone())
            .filter(|awb| !awb.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TrackingHistory {
    pub created_at: String,
    pub status: String,
    #[serde(default)]
    pub status_code: Option<i64>,
    #[serde(default)]
    pub driver: Option<String>,
    #[serde(default)]
    pub receiver: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TrackingDetails {
    pub awb: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub status_code: Option<i64>,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub estimation: Option<String>,
    #[serde(default)]
    pub shipped_at: Option<String>,
    #[serde(default)]
    pub delivered: bool,
    #[serde(default)]
    pub delivered_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackingResponse {
    pub status: bool,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub details: Option<TrackingDetails>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub histories: Vec<TrackingHistory>,
}

/// Body for `POST /api/mitra/v2/order/void`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoidOrderRequest {
    pub order_id: String,
    pub reason: String,
}

/// Body for `POST /api/mitra/v3/cancel_shipment`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CancelAwbRequest {
    pub awb: String,
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelResponse {
    pub status: bool,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

/// Location and catalogue lookups are passed through untouched
#[derive(Debug, Clone, Deserialize)]
pub struct LookupResponse {
    pub status: bool,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, alias = "datas", alias = "results")]
    pub data: serde_json::Value,
}

acknowledged!(
    CheckPricingResponse,
    PickupResponse,
    TrackingResponse,
    CancelResponse,
    LookupResponse,
);

/// Error body the provider sends on non-2xx responses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderErrorBody {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ProviderErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.text
            .filter(|t| !t.trim().is_empty())
            .or(self.message.filter(|m| !m.trim().is_empty()))
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
