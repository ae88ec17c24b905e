use crate::{
    db::DbPool,
    entities::{
        customer, customer_address,
        order::{self, OrderStatus},
        order_item, payment_method, product,
    },
    errors::ServiceError,
    repositories::{ItemDiff, OrderFilter, OrderLookup, OrderRepository},
    services::order_number::{OrderNumberSource, MAX_ORDER_NUMBER_ATTEMPTS},
    PaginatedResponse,
};
use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        let mut err = ValidationError::new("non_negative");
        err.message = Some("must not be negative".into());
        return Err(err);
    }
    Ok(())
}

/// Line item as submitted by the caller. The unit price is fixed at order time.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct OrderItemInput {
    /// Existing item id. Only meaningful on update; omitted ids create new items.
    #[serde(default)]
    pub id: Option<Uuid>,
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i32,
    #[validate(custom = "non_negative")]
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderInput {
    pub customer_id: Uuid,
    pub customer_address_id: Uuid,
    pub payment_method_id: Uuid,
    #[validate(length(min = 1, max = 50))]
    pub service: Option<String>,
    #[validate(length(max = 100))]
    pub service_name: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub service_type: Option<String>,
    #[serde(default)]
    pub is_cod: bool,
    #[serde(default)]
    pub is_drop_off: bool,
    #[validate(custom = "non_negative")]
    pub shipping_cost: Option<Decimal>,
    #[validate(custom = "non_negative")]
    pub add_cost: Option<Decimal>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Vec<OrderItemInput>,
}

/// Partial update. Absent fields are left untouched; `items`, when present,
/// replaces the item set (matched by id).
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateOrderInput {
    pub customer_id: Option<Uuid>,
    pub customer_address_id: Option<Uuid>,
    pub payment_method_id: Option<Uuid>,
    #[validate(length(min = 1, max = 50))]
    pub service: Option<String>,
    #[validate(length(max = 100))]
    pub service_name: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub service_type: Option<String>,
    pub is_cod: Option<bool>,
    pub is_drop_off: Option<bool>,
    #[validate(custom = "non_negative")]
    pub shipping_cost: Option<Decimal>,
    #[validate(custom = "non_negative")]
    pub add_cost: Option<Decimal>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    pub items: Option<Vec<OrderItemInput>>,
}

#[derive(Debug, Clone, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderListQuery {
    #[serde(default = "default_page")]
    #[validate(range(min = 1))]
    pub page: u64,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: u64,
    /// Order number, AWB or customer name fragment
    pub search: Option<String>,
    pub status: Option<OrderStatus>,
    pub customer_id: Option<Uuid>,
}

impl Default for OrderListQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
            search: None,
            status: None,
            customer_id: None,
        }
    }
}

fn default_page() -> u64 {
    1
}

fn default_limit() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub sku: Option<String>,
    pub weight: Option<i32>,
    pub width: Option<Decimal>,
    pub height: Option<Decimal>,
    pub length: Option<Decimal>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

impl From<order_item::Model> for OrderItemResponse {
    fn from(item: order_item::Model) -> Self {
        Self {
            id: item.id,
            product_id: item.product_id,
            product_name: item.product_name,
            sku: item.sku,
            weight: item.weight,
            width: item.width,
            height: item.height,
            length: item.length,
            quantity: item.quantity,
            unit_price: item.unit_price,
            subtotal: item.subtotal,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub status: OrderStatus,
    pub customer_id: Uuid,
    pub customer_address_id: Uuid,
    pub payment_method_id: Uuid,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_country_code: String,
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
    pub schedule: Option<String>,
    pub total_amount: Decimal,
    pub shipping_cost: Decimal,
    pub add_cost: Decimal,
    pub grand_total: Decimal,
    pub delivery_number: Option<String>,
    pub pickup_number: Option<String>,
    pub notes: Option<String>,
    pub created_by: String,
    pub updated_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItemResponse>,
}

impl OrderResponse {
    fn from_models(order: order::Model, items: Vec<order_item::Model>) -> Self {
        Self {
            id: order.id,
            order_number: order.order_number,
            status: order.status,
            customer_id: order.customer_id,
            customer_address_id: order.customer_address_id,
            payment_method_id: order.payment_method_id,
            customer_name: order.customer_name,
            customer_phone: order.customer_phone,
            customer_country_code: order.customer_country_code,
            shipping_address: order.shipping_address,
            shipping_province: order.shipping_province,
            shipping_city: order.shipping_city,
            shipping_district: order.shipping_district,
            shipping_sub_district: order.shipping_sub_district,
            shipping_district_id: order.shipping_district_id,
            shipping_sub_district_id: order.shipping_sub_district_id,
            shipping_zip_code: order.shipping_zip_code,
            payment_method_name: order.payment_method_name,
            service: order.service,
            service_name: order.service_name,
            service_type: order.service_type,
            is_cod: order.is_cod,
            is_drop_off: order.is_drop_off,
            schedule: order.schedule,
            total_amount: order.total_amount,
            shipping_cost: order.shipping_cost,
            add_cost: order.add_cost,
            grand_total: order.grand_total,
            delivery_number: order.delivery_number,
            pickup_number: order.pickup_number,
            notes: order.notes,
            created_by: order.created_by,
            updated_by: order.updated_by,
            created_at: order.created_at,
            updated_at: order.updated_at,
            items: items.into_iter().map(OrderItemResponse::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderSummary {
    pub id: Uuid,
    pub order_number: String,
    pub status: OrderStatus,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub customer_phone: String,
    pub service: Option<String>,
    pub service_type: Option<String>,
    pub grand_total: Decimal,
    pub delivery_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<order::Model> for OrderSummary {
    fn from(order: order::Model) -> Self {
        Self {
            id: order.id,
            order_number: order.order_number,
            status: order.status,
            customer_id: order.customer_id,
            customer_name: order.customer_name,
            customer_phone: order.customer_phone,
            service: order.service,
            service_type: order.service_type,
            grand_total: order.grand_total,
            delivery_number: order.delivery_number,
            created_at: order.created_at,
        }
    }
}

/// Monetary totals of an order. `grand_total = total_amount + shipping_cost + add_cost`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub total_amount: Decimal,
    pub shipping_cost: Decimal,
    pub add_cost: Decimal,
    pub grand_total: Decimal,
}

impl OrderTotals {
    pub fn compute(
        subtotals: impl IntoIterator<Item = Decimal>,
        shipping_cost: Decimal,
        add_cost: Decimal,
    ) -> Self {
        let total_amount: Decimal = subtotals.into_iter().sum();
        Self {
            total_amount,
            shipping_cost,
            add_cost,
            grand_total: total_amount + shipping_cost + add_cost,
        }
    }
}

pub fn line_subtotal(quantity: i32, unit_price: Decimal) -> Decimal {
    Decimal::from(quantity) * unit_price
}

fn require_actor(actor_id: &str) -> Result<&str, ServiceError> {
    let actor_id = actor_id.trim();
    if actor_id.is_empty() {
        return Err(ServiceError::Unauthorized(
            "an authenticated actor is required".to_string(),
        ));
    }
    Ok(actor_id)
}

fn validate_items(items: &[OrderItemInput]) -> Result<(), ServiceError> {
    if items.is_empty() {
        return Err(ServiceError::ValidationError(
            "Order must contain at least one item".to_string(),
        ));
    }
    for item in items {
        item.validate()?;
    }
    Ok(())
}

fn apply_customer_snapshot(active: &mut order::ActiveModel, customer: &customer::Model) {
    active.customer_id = Set(customer.id);
    active.customer_name = Set(customer.name.clone());
    active.customer_phone = Set(customer.phone.clone());
    active.customer_country_code = Set(customer.country_code.clone());
}

fn apply_address_snapshot(active: &mut order::ActiveModel, address: &customer_address::Model) {
    active.customer_address_id = Set(address.id);
    active.shipping_address = Set(address.full_address.clone());
    active.shipping_province = Set(address.province_name.clone());
    active.shipping_city = Set(address.city_name.clone());
    active.shipping_district = Set(address.district_name.clone());
    active.shipping_sub_district = Set(address.sub_district_name.clone());
    active.shipping_district_id = Set(address.district_id);
    active.shipping_sub_district_id = Set(address.sub_district_id);
    active.shipping_zip_code = Set(address.zip_code.clone());
}

fn apply_payment_snapshot(active: &mut order::ActiveModel, method: &payment_method::Model) {
    active.payment_method_id = Set(method.id);
    active.payment_method_name = Set(method.name.clone());
}

fn apply_product_snapshot(active: &mut order_item::ActiveModel, product: &product::Model) {
    active.product_id = Set(product.id);
    active.product_name = Set(product.name.clone());
    active.sku = Set(product.sku.clone());
    active.weight = Set(product.weight);
    active.width = Set(product.width);
    active.height = Set(product.height);
    active.length = Set(product.length);
}

fn new_line_item(
    order_id: Uuid,
    product: &product::Model,
    input: &OrderItemInput,
    now: DateTime<Utc>,
) -> order_item::ActiveModel {
    let mut item = order_item::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(order_id),
        quantity: Set(input.quantity),
        unit_price: Set(input.unit_price),
        subtotal: Set(line_subtotal(input.quantity, input.unit_price)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    apply_product_snapshot(&mut item, product);
    item
}

/// Order lifecycle: creation with snapshots, partial update with item
/// reconciliation, and guarded soft deletion.
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    orders: OrderRepository,
    numbers: Arc<dyn OrderNumberSource>,
}

impl OrderService {
    pub fn new(db_pool: Arc<DbPool>, numbers: Arc<dyn OrderNumberSource>) -> Self {
        Self {
            orders: OrderRepository::new(db_pool.clone()),
            db_pool,
            numbers,
        }
    }

    #[instrument(skip(self, input), fields(customer_id = %input.customer_id, items = input.items.len()))]
    pub async fn create(
        &self,
        input: CreateOrderInput,
        actor_id: &str,
    ) -> Result<OrderResponse, ServiceError> {
        let actor_id = require_actor(actor_id)?;
        input.validate()?;
        validate_items(&input.items)?;

        // Every reference is checked before anything is written
        let customer = self.load_customer(input.customer_id).await?;
        let address = self
            .load_address(customer.id, input.customer_address_id)
            .await?;
        let payment_method = self.load_payment_method(input.payment_method_id).await?;
        let product_ids: Vec<Uuid> = input.items.iter().map(|i| i.product_id).collect();
        let products = self.load_products(&product_ids).await?;

        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let mut items = Vec::with_capacity(input.items.len());
        for item in &input.items {
            let product = require_product(&products, item.product_id)?;
            items.push(new_line_item(order_id, product, item, now));
        }

        let totals = OrderTotals::compute(
            input
                .items
                .iter()
                .map(|i| line_subtotal(i.quantity, i.unit_price)),
            input.shipping_cost.unwrap_or_default(),
            input.add_cost.unwrap_or_default(),
        );

        let mut order = order::ActiveModel {
            id: Set(order_id),
            service: Set(input.service),
            service_name: Set(input.service_name),
            service_type: Set(input.service_type),
            is_cod: Set(input.is_cod),
            is_drop_off: Set(input.is_drop_off),
            schedule: Set(None),
            total_amount: Set(totals.total_amount),
            shipping_cost: Set(totals.shipping_cost),
            add_cost: Set(totals.add_cost),
            grand_total: Set(totals.grand_total),
            status: Set(OrderStatus::Pending),
            delivery_number: Set(None),
            pickup_number: Set(None),
            shipment_claimed_at: Set(None),
            shipment_booked_at: Set(None),
            notes: Set(input.notes),
            created_by: Set(actor_id.to_string()),
            updated_by: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
            deleted_by: Set(None),
            ..Default::default()
        };
        apply_customer_snapshot(&mut order, &customer);
        apply_address_snapshot(&mut order, &address);
        apply_payment_snapshot(&mut order, &payment_method);

        let mut attempt = 0;
        let created = loop {
            attempt += 1;
            let mut candidate = order.clone();
            candidate.order_number = Set(self.numbers.next_number());

            match self
                .orders
                .create_order_with_items(candidate, items.clone())
                .await
            {
                Ok(created) => break created,
                Err(err) if err.is_unique_violation() => {
                    if attempt >= MAX_ORDER_NUMBER_ATTEMPTS {
                        return Err(ServiceError::Conflict(
                            "could not allocate a unique order number".to_string(),
                        ));
                    }
                    warn!(attempt, "order number collision, retrying");
                }
                Err(err) => return Err(err),
            }
        };

        counter!("orders.created", 1);
        info!(
            order_id = %created.id,
            order_number = %created.order_number,
            actor = %actor_id,
            grand_total = %created.grand_total,
            "order created"
        );

        self.get(created.id).await
    }

    #[instrument(skip(self, input), fields(order_id = %id))]
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateOrderInput,
        actor_id: &str,
    ) -> Result<OrderResponse, ServiceError> {
        let actor_id = require_actor(actor_id)?;
        input.validate()?;
        if let Some(items) = &input.items {
            validate_items(items)?;
        }

        let existing = self
            .orders
            .find_order(OrderLookup::Id(id))
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id)))?;

        let now = Utc::now();
        let mut active: order::ActiveModel = existing.clone().into();

        let customer_changed = input
            .customer_id
            .is_some_and(|customer_id| customer_id != existing.customer_id);
        let address_changed = input
            .customer_address_id
            .is_some_and(|address_id| address_id != existing.customer_address_id);

        if customer_changed || address_changed {
            let customer_id = input.customer_id.unwrap_or(existing.customer_id);
            let address_id = input
                .customer_address_id
                .unwrap_or(existing.customer_address_id);

            let customer = self.load_customer(customer_id).await?;
            let address = self.load_address(customer.id, address_id).await?;

            if customer_changed {
                apply_customer_snapshot(&mut active, &customer);
            }
            if address_changed {
                apply_address_snapshot(&mut active, &address);
            }
        }

        if let Some(payment_method_id) = input
            .payment_method_id
            .filter(|pm| *pm != existing.payment_method_id)
        {
            let method = self.load_payment_method(payment_method_id).await?;
            apply_payment_snapshot(&mut active, &method);
        }

        if let Some(service) = input.service {
            active.service = Set(Some(service));
        }
        if let Some(service_name) = input.service_name {
            active.service_name = Set(Some(service_name));
        }
        if let Some(service_type) = input.service_type {
            active.service_type = Set(Some(service_type));
        }
        if let Some(is_cod) = input.is_cod {
            active.is_cod = Set(is_cod);
        }
        if let Some(is_drop_off) = input.is_drop_off {
            active.is_drop_off = Set(is_drop_off);
        }
        if let Some(notes) = input.notes {
            active.notes = Set(Some(notes));
        }

        let (diff, total_amount) = match &input.items {
            Some(items) => {
                let existing_items = self.orders.find_items(existing.id).await?;
                let (diff, subtotals) = self
                    .reconcile_items(existing.id, &existing_items, items, now)
                    .await?;
                (Some(diff), subtotals.into_iter().sum::<Decimal>())
            }
            None => (None, existing.total_amount),
        };

        // Totals move only when items or a cost field were supplied
        if input.items.is_some() || input.shipping_cost.is_some() || input.add_cost.is_some() {
            let totals = OrderTotals::compute(
                [total_amount],
                input.shipping_cost.unwrap_or(existing.shipping_cost),
                input.add_cost.unwrap_or(existing.add_cost),
            );
            active.total_amount = Set(totals.total_amount);
            active.shipping_cost = Set(totals.shipping_cost);
            active.add_cost = Set(totals.add_cost);
            active.grand_total = Set(totals.grand_total);
        }

        active.updated_by = Set(Some(actor_id.to_string()));
        active.updated_at = Set(now);

        self.orders.update_order_with_item_diff(active, diff).await?;

        counter!("orders.updated", 1);
        info!(order_id = %id, actor = %actor_id, "order updated");

        self.get(id).await
    }

    /// Soft-deletes a PENDING or CANCELLED order
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn delete(&self, id: Uuid, actor_id: &str) -> Result<(), ServiceError> {
        let actor_id = require_actor(actor_id)?;

        let existing = self
            .orders
            .find_order(OrderLookup::Id(id))
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id)))?;

        if !existing.status.allows_deletion() {
            return Err(ServiceError::InvalidState(format!(
                "Order {} with status {} cannot be deleted; only PENDING or CANCELLED orders can",
                existing.order_number, existing.status
            )));
        }

        if !self
            .orders
            .soft_delete_order(id, actor_id, Utc::now())
            .await?
        {
            // Lost a race: the order moved on or was deleted in between
            return match self.orders.find_order(OrderLookup::Id(id)).await? {
                None => Err(ServiceError::NotFound(format!("Order {} not found", id))),
                Some(current) => Err(ServiceError::InvalidState(format!(
                    "Order {} with status {} cannot be deleted",
                    current.order_number, current.status
                ))),
            };
        }

        counter!("orders.deleted", 1);
        info!(order_id = %id, actor = %actor_id, "order soft-deleted");
        Ok(())
    }

    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn get(&self, id: Uuid) -> Result<OrderResponse, ServiceError> {
        let (order, items) = self
            .orders
            .find_order_with_items(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id)))?;
        Ok(OrderResponse::from_models(order, items))
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        query: OrderListQuery,
    ) -> Result<PaginatedResponse<OrderSummary>, ServiceError> {
        query.validate()?;
        let filter = OrderFilter {
            search: query.search,
            status: query.status,
            customer_id: query.customer_id,
        };

        let (orders, total) = self
            .orders
            .list_orders(&filter, query.page, query.limit)
            .await?;

        Ok(PaginatedResponse {
            items: orders.into_iter().map(OrderSummary::from).collect(),
            total,
            page: query.page,
            limit: query.limit,
            total_pages: total.div_ceil(query.limit),
        })
    }

    /// Builds the item diff for an update and returns the new subtotals.
    /// Items keep their snapshot unless their product changes.
    async fn reconcile_items(
        &self,
        order_id: Uuid,
        existing: &[order_item::Model],
        inputs: &[OrderItemInput],
        now: DateTime<Utc>,
    ) -> Result<(ItemDiff, Vec<Decimal>), ServiceError> {
        let existing_by_id: HashMap<Uuid, &order_item::Model> =
            existing.iter().map(|item| (item.id, item)).collect();

        let mut seen = HashSet::new();
        let mut needs_product = Vec::new();
        for input in inputs {
            match input.id {
                Some(item_id) => {
                    if !seen.insert(item_id) {
                        return Err(ServiceError::ValidationError(format!(
                            "Item {} appears more than once",
                            item_id
                        )));
                    }
                    let current = existing_by_id.get(&item_id).ok_or_else(|| {
                        ServiceError::ValidationError(format!(
                            "Item {} does not belong to order {}",
                            item_id, order_id
                        ))
                    })?;
                    if current.product_id != input.product_id {
                        needs_product.push(input.product_id);
                    }
                }
                None => needs_product.push(input.product_id),
            }
        }
        let products = self.load_products(&needs_product).await?;

        let mut diff = ItemDiff::default();
        let mut subtotals = Vec::with_capacity(inputs.len());

        for input in inputs {
            let subtotal = line_subtotal(input.quantity, input.unit_price);
            subtotals.push(subtotal);

            match input.id.and_then(|id| existing_by_id.get(&id)) {
                Some(current) => {
                    let mut item: order_item::ActiveModel = (*current).clone().into();
                    if current.product_id != input.product_id {
                        let product = require_product(&products, input.product_id)?;
                        apply_product_snapshot(&mut item, product);
                    }
                    item.quantity = Set(input.quantity);
                    item.unit_price = Set(input.unit_price);
                    item.subtotal = Set(subtotal);
                    item.updated_at = Set(now);
                    diff.update.push(item);
                }
                None => {
                    let product = require_product(&products, input.product_id)?;
                    diff.insert.push(new_line_item(order_id, product, input, now));
                }
            }
        }

        diff.delete = existing
            .iter()
            .filter(|item| !seen.contains(&item.id))
            .map(|item| item.id)
            .collect();

        Ok((diff, subtotals))
    }

    async fn load_customer(&self, id: Uuid) -> Result<customer::Model, ServiceError> {
        customer::Entity::find_by_id(id)
            .filter(customer::Column::DeletedAt.is_null())
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::ValidationError(format!("Customer {} not found", id)))
    }

    async fn load_address(
        &self,
        customer_id: Uuid,
        address_id: Uuid,
    ) -> Result<customer_address::Model, ServiceError> {
        customer_address::Entity::find_by_id(address_id)
            .filter(customer_address::Column::CustomerId.eq(customer_id))
            .filter(customer_address::Column::DeletedAt.is_null())
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "Address {} not found for customer {}",
                    address_id, customer_id
                ))
            })
    }

    async fn load_payment_method(&self, id: Uuid) -> Result<payment_method::Model, ServiceError> {
        let method = payment_method::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| {
                ServiceError::ValidationError(format!("Payment method {} not found", id))
            })?;

        if !method.is_active {
            return Err(ServiceError::ValidationError(format!(
                "Payment method {} is inactive",
                method.name
            )));
        }
        Ok(method)
    }

    async fn load_products(
        &self,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, product::Model>, ServiceError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let unique: HashSet<Uuid> = ids.iter().copied().collect();
        let products = product::Entity::find()
            .filter(product::Column::Id.is_in(unique))
            .all(&*self.db_pool)
            .await?;
        Ok(products.into_iter().map(|p| (p.id, p)).collect())
    }
}

fn require_product(
    products: &HashMap<Uuid, product::Model>,
    id: Uuid,
) -> Result<&product::Model, ServiceError> {
    products
        .get(&id)
        .filter(|p| p.is_available())
        .ok_or_else(|| ServiceError::ValidationError(format!("Product {} not found or inactive", id)))
}
