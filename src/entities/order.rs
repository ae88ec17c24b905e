use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Fulfillment status of an order. DELIVERED and CANCELLED are terminal.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum OrderStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "CONFIRMED")]
    Confirmed,
    #[sea_orm(string_value = "PROCESSING")]
    Processing,
    #[sea_orm(string_value = "SHIPPED")]
    Shipped,
    #[sea_orm(string_value = "DELIVERED")]
    Delivered,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Orders already in the fulfillment pipeline cannot be deleted.
    pub fn allows_deletion(self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Cancelled)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub order_number: String,

    pub customer_id: Uuid,
    pub customer_address_id: Uuid,
    pub payment_method_id: Uuid,

    // Snapshots taken from the referenced records at write time
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_country_code: String,
    #[sea_orm(column_type = "Text")]
    pub shipping_address: String,
    pub shipping_province: Option<String>,
    pub shipping_city: Option<String>,
    pub shipping_district: Option<String>,
    pub shipping_sub_district: Option<String>,
    pub shipping_district_id: Option<i64>,
    pub shipping_sub_district_id: Option<i64>,
    pub shipping_zip_code: Option<String>,
    pub payment_method_name: String,

    pub service: Option<String>,
    pub service_name: Option<String>,
    pub service_type: Option<String>,
    pub is_cod: bool,
    pub is_drop_off: bool,
    /// Requested pickup time, `YYYY-MM-DD HH:MM:SS` in business local time
    pub schedule: Option<String>,

    pub total_amount: Decimal,
    pub shipping_cost: Decimal,
    pub add_cost: Decimal,
    pub grand_total: Decimal,

    pub status: OrderStatus,
    /// AWB assigned by the courier
    #[sea_orm(unique)]
    pub delivery_number: Option<String>,
    pub pickup_number: Option<String>,
    pub shipment_claimed_at: Option<DateTime<Utc>>,
    /// Set once the courier acknowledged a booking; never cleared
    pub shipment_booked_at: Option<DateTime<Utc>>,

    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,

    pub created_by: String,
    pub updated_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItem,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// True once a courier booking exists for the order, whether or not the
    /// AWB has arrived yet.
    pub fn is_booked(&self) -> bool {
        self.delivery_number.is_some()
            || self.pickup_number.is_some()
            || self.shipment_booked_at.is_some()
    }
}
