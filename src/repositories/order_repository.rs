use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sea_orm::{
    sea_query::Expr, ActiveEnum, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection,
    DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::entities::order::{self, Column, Entity as Order, OrderStatus};
use crate::entities::order_item::{self, Entity as OrderItem};
use crate::errors::ServiceError;

use super::{BaseRepository, Repository};

/// Ways to address a single live (not soft-deleted) order
#[derive(Debug, Clone, Copy)]
pub enum OrderLookup<'a> {
    Id(Uuid),
    Awb(&'a str),
    OrderNumber(&'a str),
    /// Matches either reference; used for courier callbacks
    AwbOrOrderNumber {
        awb: Option<&'a str>,
        order_number: Option<&'a str>,
    },
}

/// Filters for the order list
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    /// Matched against order number, AWB and customer name
    pub search: Option<String>,
    pub status: Option<OrderStatus>,
    pub customer_id: Option<Uuid>,
}

/// Item set reconciliation applied together with an order update
#[derive(Debug, Default)]
pub struct ItemDiff {
    pub delete: Vec<Uuid>,
    pub update: Vec<order_item::ActiveModel>,
    pub insert: Vec<order_item::ActiveModel>,
}

/// Persistent order store. Multi-row writes run in one transaction and
/// shipment/status writes are compare-and-set updates.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    base: BaseRepository,
}

impl OrderRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn find_order(
        &self,
        lookup: OrderLookup<'_>,
    ) -> Result<Option<order::Model>, ServiceError> {
        let condition = match lookup {
            OrderLookup::Id(id) => Condition::all().add(Column::Id.eq(id)),
            OrderLookup::Awb(awb) => Condition::all().add(Column::DeliveryNumber.eq(awb)),
            OrderLookup::OrderNumber(number) => {
                Condition::all().add(Column::OrderNumber.eq(number))
            }
            OrderLookup::AwbOrOrderNumber { awb, order_number } => {
                let mut any = Condition::any();
                if let Some(awb) = awb {
                    any = any.add(Column::DeliveryNumber.eq(awb));
                }
                if let Some(number) = order_number {
                    any = any.add(Column::OrderNumber.eq(number));
                }
                if awb.is_none() && order_number.is_none() {
                    return Ok(None);
                }
                Condition::all().add(any)
            }
        };

        Ok(Order::find()
            .filter(condition)
            .filter(Column::DeletedAt.is_null())
            .order_by_desc(Column::CreatedAt)
            .one(self.base.get_db())
            .await?)
    }

    pub async fn find_items(&self, order_id: Uuid) -> Result<Vec<order_item::Model>, ServiceError> {
        Ok(OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::CreatedAt)
            .order_by_asc(order_item::Column::Id)
            .all(self.base.get_db())
            .await?)
    }

    pub async fn find_order_with_items(
        &self,
        id: Uuid,
    ) -> Result<Option<(order::Model, Vec<order_item::Model>)>, ServiceError> {
        match self.find_order(OrderLookup::Id(id)).await? {
            Some(order) => {
                let items = self.find_items(order.id).await?;
                Ok(Some((order, items)))
            }
            None => Ok(None),
        }
    }

    /// Page numbers start at 1
    pub async fn list_orders(
        &self,
        filter: &OrderFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let mut query = Order::find().filter(Column::DeletedAt.is_null());

        if let Some(status) = filter.status {
            query = query.filter(Column::Status.eq(status.to_value()));
        }
        if let Some(customer_id) = filter.customer_id {
            query = query.filter(Column::CustomerId.eq(customer_id));
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(Column::OrderNumber.contains(search))
                    .add(Column::DeliveryNumber.contains(search))
                    .add(Column::CustomerName.contains(search)),
            );
        }

        let paginator = query
            .order_by_desc(Column::CreatedAt)
            .paginate(self.base.get_db(), limit.max(1));

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.max(1) - 1).await?;
        Ok((orders, total))
    }

    /// Inserts the order and all of its items atomically
    pub async fn create_order_with_items(
        &self,
        order: order::ActiveModel,
        items: Vec<order_item::ActiveModel>,
    ) -> Result<order::Model, ServiceError> {
        let txn = self.base.get_db().begin().await?;

        let created = order.insert(&txn).await?;
        for item in items {
            item.insert(&txn).await?;
        }

        txn.commit().await?;
        Ok(created)
    }

    /// Applies the order update and the item reconciliation atomically
    pub async fn update_order_with_item_diff(
        &self,
        order: order::ActiveModel,
        diff: Option<ItemDiff>,
    ) -> Result<order::Model, ServiceError> {
        let txn = self.base.get_db().begin().await?;

        let updated = order.update(&txn).await?;
        if let Some(diff) = diff {
            apply_item_diff(&txn, updated.id, diff).await?;
        }

        txn.commit().await?;
        Ok(updated)
    }

    /// Soft-deletes the order if its status still allows deletion.
    /// Returns false when no row matched.
    pub async fn soft_delete_order(
        &self,
        id: Uuid,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        let result = Order::update_many()
            .col_expr(Column::DeletedAt, Expr::value(now))
            .col_expr(Column::DeletedBy, Expr::value(actor_id))
            .col_expr(Column::UpdatedBy, Expr::value(actor_id))
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .filter(Column::Id.eq(id))
            .filter(Column::DeletedAt.is_null())
            .filter(Column::Status.is_in([
                OrderStatus::Pending.to_value(),
                OrderStatus::Cancelled.to_value(),
            ]))
            .exec(self.base.get_db())
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// Takes the exclusive right to book a courier shipment for the order.
    /// Fails (false) when the order is already booked or another claim is still fresh.
    /// A booked order stays unclaimable even when the courier returned no reference.
    pub async fn claim_shipment(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<bool, ServiceError> {
        let ttl = ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::minutes(5));
        let stale_before = now - ttl;

        let result = Order::update_many()
            .col_expr(Column::ShipmentClaimedAt, Expr::value(now))
            .filter(Column::Id.eq(id))
            .filter(Column::DeletedAt.is_null())
            .filter(Column::DeliveryNumber.is_null())
            .filter(Column::PickupNumber.is_null())
            .filter(Column::ShipmentBookedAt.is_null())
            .filter(
                Condition::any()
                    .add(Column::ShipmentClaimedAt.is_null())
                    .add(Column::ShipmentClaimedAt.lt(stale_before)),
            )
            .exec(self.base.get_db())
            .await?;

        debug!(order_id = %id, claimed = result.rows_affected == 1, "shipment claim");
        Ok(result.rows_affected == 1)
    }

    pub async fn release_shipment_claim(&self, id: Uuid) -> Result<(), ServiceError> {
        Order::update_many()
            .col_expr(
                Column::ShipmentClaimedAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .filter(Column::Id.eq(id))
            .filter(Column::DeliveryNumber.is_null())
            .filter(Column::PickupNumber.is_null())
            .filter(Column::ShipmentBookedAt.is_null())
            .exec(self.base.get_db())
            .await?;
        Ok(())
    }

    /// Stores the courier booking, marks the order booked and moves it to
    /// CONFIRMED in one conditional update on `delivery_number IS NULL`.
    pub async fn record_shipment_booking(
        &self,
        id: Uuid,
        awb: Option<String>,
        pickup_number: Option<String>,
        schedule: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        let result = Order::update_many()
            .col_expr(Column::DeliveryNumber, Expr::value(awb))
            .col_expr(Column::PickupNumber, Expr::value(pickup_number))
            .col_expr(Column::Schedule, Expr::value(schedule))
            .col_expr(Column::Status, Expr::value(OrderStatus::Confirmed.to_value()))
            .col_expr(Column::ShipmentBookedAt, Expr::value(now))
            .col_expr(
                Column::ShipmentClaimedAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .filter(Column::Id.eq(id))
            .filter(Column::DeliveryNumber.is_null())
            .filter(Column::Status.is_in([
                OrderStatus::Pending.to_value(),
                OrderStatus::Confirmed.to_value(),
            ]))
            .exec(self.base.get_db())
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// Marks the order booked without touching its status or AWB. Used when the
    /// courier acknowledged a booking that the full write could not record.
    pub async fn mark_shipment_booked(
        &self,
        id: Uuid,
        pickup_number: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        let mut update = Order::update_many()
            .col_expr(Column::ShipmentBookedAt, Expr::value(now))
            .col_expr(
                Column::ShipmentClaimedAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            );
        if let Some(pickup_number) = pickup_number {
            update = update.col_expr(Column::PickupNumber, Expr::value(pickup_number));
        }

        let result = update
            .filter(Column::Id.eq(id))
            .filter(Column::ShipmentBookedAt.is_null())
            .exec(self.base.get_db())
            .await?;
        Ok(result.rows_affected == 1)
    }

    /// Moves the order from `observed` to `next`, backfilling the AWB when the
    /// row has none. Returns false if the status changed underneath us.
    pub async fn apply_courier_status(
        &self,
        id: Uuid,
        observed: OrderStatus,
        next: OrderStatus,
        backfill_awb: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        let txn = self.base.get_db().begin().await?;

        let result = Order::update_many()
            .col_expr(Column::Status, Expr::value(next.to_value()))
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .filter(Column::Id.eq(id))
            .filter(Column::DeletedAt.is_null())
            .filter(Column::Status.eq(observed.to_value()))
            .exec(&txn)
            .await?;

        if result.rows_affected != 1 {
            txn.rollback().await?;
            return Ok(false);
        }

        if let Some(awb) = backfill_awb {
            Order::update_many()
                .col_expr(Column::DeliveryNumber, Expr::value(awb))
                .filter(Column::Id.eq(id))
                .filter(Column::DeliveryNumber.is_null())
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(true)
    }

    /// Sets CANCELLED unless the order already reached a terminal status
    pub async fn mark_cancelled(
        &self,
        id: Uuid,
        actor_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        let mut update = Order::update_many()
            .col_expr(Column::Status, Expr::value(OrderStatus::Cancelled.to_value()))
            .col_expr(Column::UpdatedAt, Expr::value(now));
        if let Some(actor_id) = actor_id {
            update = update.col_expr(Column::UpdatedBy, Expr::value(actor_id));
        }

        let result = update
            .filter(Column::Id.eq(id))
            .filter(Column::DeletedAt.is_null())
            .filter(Column::Status.is_not_in([
                OrderStatus::Delivered.to_value(),
                OrderStatus::Cancelled.to_value(),
            ]))
            .exec(self.base.get_db())
            .await?;

        Ok(result.rows_affected == 1)
    }
}

async fn apply_item_diff(
    txn: &DatabaseTransaction,
    order_id: Uuid,
    diff: ItemDiff,
) -> Result<(), ServiceError> {
    if !diff.delete.is_empty() {
        OrderItem::delete_many()
            .filter(order_item::Column::OrderId.eq(order_id))
            .filter(order_item::Column::Id.is_in(diff.delete))
            .exec(txn)
            .await?;
    }
    for item in diff.update {
        item.update(txn).await?;
    }
    for item in diff.insert {
        item.insert(txn).await?;
    }
    Ok(())
}
