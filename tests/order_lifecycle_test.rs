mod common;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use chrono::Utc;
use common::{TestApp, TEST_ACTOR};
use courier_orders_api::{
    entities::{customer_address, order, order_item, OrderStatus},
    errors::ServiceError,
    repositories::{ItemDiff, OrderRepository},
    services::{
        orders::{OrderItemInput, OrderListQuery, UpdateOrderInput},
        OrderNumberSource, OrderService,
    },
};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

#[tokio::test]
async fn create_prices_items_and_snapshots_references() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture().await;

    let order = app.create_order(&fixture).await;

    assert_eq!(order.status, OrderStatus::Pending);
    assert!(order.order_number.starts_with("AMP"));
    assert_eq!(order.total_amount, dec!(40000));
    assert_eq!(order.shipping_cost, dec!(12000));
    assert_eq!(order.add_cost, dec!(3000));
    assert_eq!(order.grand_total, dec!(55000));
    assert!(order.delivery_number.is_none());
    assert!(order.pickup_number.is_none());
    assert_eq!(order.created_by, TEST_ACTOR);

    assert_eq!(order.customer_name, "Budi Santoso");
    assert_eq!(order.customer_country_code, "62");
    assert_eq!(order.shipping_address, "Jl. Braga No. 10");
    assert_eq!(order.shipping_district_id, Some(548));
    assert_eq!(order.shipping_sub_district_id, Some(31483));
    assert_eq!(order.payment_method_name, "Transfer Bank");

    assert_eq!(order.items.len(), 2);
    let coffee = order
        .items
        .iter()
        .find(|i| i.product_id == fixture.coffee.id)
        .expect("coffee line");
    assert_eq!(coffee.product_name, "Kopi");
    assert_eq!(coffee.weight, Some(500));
    assert_eq!(coffee.subtotal, dec!(30000));
}

#[tokio::test]
async fn item_snapshot_is_not_affected_by_later_catalog_changes() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture().await;
    let order = app.create_order(&fixture).await;

    let mut product: courier_orders_api::entities::product::ActiveModel =
        fixture.coffee.clone().into();
    product.name = Set("Kopi Arabika".into());
    product.price = Set(dec!(99000));
    product
        .update(app.db.as_ref())
        .await
        .expect("update product");

    let reloaded = app.state.services.orders.get(order.id).await.unwrap();
    let coffee = reloaded
        .items
        .iter()
        .find(|i| i.product_id == fixture.coffee.id)
        .unwrap();
    assert_eq!(coffee.product_name, "Kopi");
    assert_eq!(coffee.unit_price, dec!(15000));
    assert_eq!(reloaded.grand_total, dec!(55000));
}

#[tokio::test]
async fn inactive_product_rejects_the_whole_order() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture().await;
    let retired = app
        .seed_product("Gelas", dec!(5000), Some(100), None, false)
        .await;

    let mut input = fixture.order_input();
    input.items.push(OrderItemInput {
        id: None,
        product_id: retired.id,
        quantity: 1,
        unit_price: dec!(5000),
    });

    let result = app.state.services.orders.create(input, TEST_ACTOR).await;

    assert_matches!(result, Err(ServiceError::ValidationError(_)));
    assert_eq!(app.count_orders().await, 0);
    assert_eq!(app.count_items(None).await, 0);
}

#[tokio::test]
async fn unknown_product_is_a_validation_error() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture().await;

    let mut input = fixture.order_input();
    input.items[0].product_id = Uuid::new_v4();

    let result = app.state.services.orders.create(input, TEST_ACTOR).await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));
    assert_eq!(app.count_orders().await, 0);
}

#[tokio::test]
async fn address_must_belong_to_the_customer() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture().await;
    let stranger = app.seed_customer("Siti Aminah").await;
    let foreign_address = app.seed_address(stranger.id).await;

    let mut input = fixture.order_input();
    input.customer_address_id = foreign_address.id;

    let result = app.state.services.orders.create(input, TEST_ACTOR).await;
    assert_matches!(result, Err(ServiceError::ValidationError(msg)) if msg.contains("Address"));
    assert_eq!(app.count_orders().await, 0);
}

#[tokio::test]
async fn inactive_payment_method_is_rejected() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture().await;
    let disabled = app.seed_payment_method("Kartu Kredit", false).await;

    let mut input = fixture.order_input();
    input.payment_method_id = disabled.id;

    let result = app.state.services.orders.create(input, TEST_ACTOR).await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn create_requires_an_actor() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture().await;

    let result = app
        .state
        .services
        .orders
        .create(fixture.order_input(), "  ")
        .await;
    assert_matches!(result, Err(ServiceError::Unauthorized(_)));
}

#[tokio::test]
async fn update_reconciles_items_and_recomputes_totals() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture().await;
    let order = app.create_order(&fixture).await;

    let coffee_line = order
        .items
        .iter()
        .find(|i| i.product_id == fixture.coffee.id)
        .unwrap()
        .clone();

    // Keep coffee with a new quantity, drop the kettle line, add a fresh kettle line
    let input = UpdateOrderInput {
        items: Some(vec![
            OrderItemInput {
                id: Some(coffee_line.id),
                product_id: fixture.coffee.id,
                quantity: 3,
                unit_price: dec!(15000),
            },
            OrderItemInput {
                id: None,
                product_id: fixture.kettle.id,
                quantity: 2,
                unit_price: dec!(10000),
            },
        ]),
        ..Default::default()
    };

    let updated = app
        .state
        .services
        .orders
        .update(order.id, input, TEST_ACTOR)
        .await
        .expect("update order");

    assert_eq!(updated.items.len(), 2);
    assert_eq!(updated.total_amount, dec!(65000));
    assert_eq!(updated.grand_total, dec!(80000));
    assert_eq!(updated.updated_by.as_deref(), Some(TEST_ACTOR));

    let kept = updated
        .items
        .iter()
        .find(|i| i.id == coffee_line.id)
        .expect("existing line keeps its id");
    assert_eq!(kept.quantity, 3);
    assert_eq!(kept.subtotal, dec!(45000));

    let old_kettle_ids: Vec<Uuid> = order
        .items
        .iter()
        .filter(|i| i.product_id == fixture.kettle.id)
        .map(|i| i.id)
        .collect();
    assert!(updated.items.iter().all(|i| !old_kettle_ids.contains(&i.id)));
    assert_eq!(app.count_items(Some(order.id)).await, 2);
}

#[tokio::test]
async fn update_rejects_items_from_another_order() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture().await;
    let first = app.create_order(&fixture).await;
    let second = app.create_order(&fixture).await;

    let foreign_item = second.items[0].clone();
    let input = UpdateOrderInput {
        items: Some(vec![OrderItemInput {
            id: Some(foreign_item.id),
            product_id: foreign_item.product_id,
            quantity: 5,
            unit_price: foreign_item.unit_price,
        }]),
        ..Default::default()
    };

    let result = app
        .state
        .services
        .orders
        .update(first.id, input, TEST_ACTOR)
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));

    let unchanged = app.state.services.orders.get(first.id).await.unwrap();
    assert_eq!(unchanged.items.len(), 2);
    assert_eq!(unchanged.grand_total, dec!(55000));
}

#[tokio::test]
async fn update_without_items_or_costs_keeps_totals() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture().await;
    let order = app.create_order(&fixture).await;

    let input = UpdateOrderInput {
        notes: Some("Titip di satpam".into()),
        ..Default::default()
    };
    let updated = app
        .state
        .services
        .orders
        .update(order.id, input, TEST_ACTOR)
        .await
        .unwrap();

    assert_eq!(updated.notes.as_deref(), Some("Titip di satpam"));
    assert_eq!(updated.total_amount, dec!(40000));
    assert_eq!(updated.grand_total, dec!(55000));
    assert_eq!(updated.items.len(), 2);
}

#[tokio::test]
async fn update_shipping_cost_alone_moves_grand_total() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture().await;
    let order = app.create_order(&fixture).await;

    let input = UpdateOrderInput {
        shipping_cost: Some(dec!(20000)),
        ..Default::default()
    };
    let updated = app
        .state
        .services
        .orders
        .update(order.id, input, TEST_ACTOR)
        .await
        .unwrap();

    assert_eq!(updated.total_amount, dec!(40000));
    assert_eq!(updated.grand_total, dec!(63000));
}

#[tokio::test]
async fn delete_is_refused_once_the_order_has_shipped() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture().await;
    let order = app.create_order(&fixture).await;
    app.set_order_fields(order.id, |o| o.status = Set(OrderStatus::Shipped))
        .await;

    let result = app.state.services.orders.delete(order.id, TEST_ACTOR).await;

    assert_matches!(result, Err(ServiceError::InvalidState(_)));
    assert!(app.order_row(order.id).await.deleted_at.is_none());
}

#[tokio::test]
async fn cancelled_order_is_soft_deleted() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture().await;
    let order = app.create_order(&fixture).await;
    app.set_order_fields(order.id, |o| o.status = Set(OrderStatus::Cancelled))
        .await;

    app.state
        .services
        .orders
        .delete(order.id, TEST_ACTOR)
        .await
        .expect("delete cancelled order");

    let row = app.order_row(order.id).await;
    assert!(row.deleted_at.is_some());
    assert_eq!(row.deleted_by.as_deref(), Some(TEST_ACTOR));
    assert_matches!(
        app.state.services.orders.get(order.id).await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        app.state.services.orders.delete(order.id, TEST_ACTOR).await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn list_filters_by_status_and_search() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture().await;
    let first = app.create_order(&fixture).await;
    let second = app.create_order(&fixture).await;
    let deleted = app.create_order(&fixture).await;
    app.set_order_fields(second.id, |o| o.status = Set(OrderStatus::Confirmed))
        .await;
    app.state
        .services
        .orders
        .delete(deleted.id, TEST_ACTOR)
        .await
        .unwrap();

    let all = app
        .state
        .services
        .orders
        .list(OrderListQuery::default())
        .await
        .unwrap();
    assert_eq!(all.total, 2);
    assert_eq!(all.total_pages, 1);

    let pending = app
        .state
        .services
        .orders
        .list(OrderListQuery {
            status: Some(OrderStatus::Pending),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(pending.total, 1);
    assert_eq!(pending.items[0].id, first.id);

    let by_number = app
        .state
        .services
        .orders
        .list(OrderListQuery {
            search: Some(second.order_number.clone()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_number.total, 1);
    assert_eq!(by_number.items[0].order_number, second.order_number);
}

#[tokio::test]
async fn list_pages_are_bounded_by_limit() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture().await;
    for _ in 0..3 {
        app.create_order(&fixture).await;
    }

    let page = app
        .state
        .services
        .orders
        .list(OrderListQuery {
            page: 2,
            limit: 2,
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(page.total, 3);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.items.len(), 1);
}

/// Hands out a fixed sequence of order numbers
struct ScriptedNumbers(Mutex<VecDeque<String>>);

impl ScriptedNumbers {
    fn service(app: &TestApp, numbers: &[&str]) -> OrderService {
        let numbers = ScriptedNumbers(Mutex::new(
            numbers.iter().map(|n| n.to_string()).collect(),
        ));
        OrderService::new(app.db.clone(), Arc::new(numbers))
    }
}

impl OrderNumberSource for ScriptedNumbers {
    fn next_number(&self) -> String {
        self.0
            .lock()
            .unwrap()
            .pop_front()
            .expect("no scripted order number left")
    }
}

#[tokio::test]
async fn order_number_collision_is_retried_with_a_fresh_number() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture().await;
    let existing = app.create_order(&fixture).await;

    let orders = ScriptedNumbers::service(&app, &[&existing.order_number, "AMP1717200000000999"]);
    let created = orders
        .create(fixture.order_input(), TEST_ACTOR)
        .await
        .expect("second number is free");

    assert_eq!(created.order_number, "AMP1717200000000999");
    assert_eq!(created.items.len(), 2);
    assert_eq!(app.count_orders().await, 2);
    assert_eq!(app.count_items(Some(created.id)).await, 2);
}

#[tokio::test]
async fn order_number_collisions_give_up_after_three_attempts() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture().await;
    let existing = app.create_order(&fixture).await;
    let taken = existing.order_number.as_str();

    let orders = ScriptedNumbers::service(&app, &[taken, taken, taken]);
    let result = orders.create(fixture.order_input(), TEST_ACTOR).await;

    assert_matches!(result, Err(ServiceError::Conflict(_)));
    assert_eq!(app.count_orders().await, 1);
    assert_eq!(app.count_items(None).await, 2);
}

#[tokio::test]
async fn update_resnapshots_a_new_customer_and_address() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture().await;
    let order = app.create_order(&fixture).await;

    let rina = app.seed_customer("Rina Wati").await;
    let mut address: customer_address::ActiveModel = app.seed_address(rina.id).await.into();
    address.full_address = Set("Jl. Dago No. 5".into());
    address.district_id = Set(Some(600));
    address.sub_district_id = Set(Some(32001));
    let address = address.update(app.db.as_ref()).await.unwrap();

    let updated = app
        .state
        .services
        .orders
        .update(
            order.id,
            UpdateOrderInput {
                customer_id: Some(rina.id),
                customer_address_id: Some(address.id),
                ..Default::default()
            },
            TEST_ACTOR,
        )
        .await
        .expect("customer and address change");

    assert_eq!(updated.customer_id, rina.id);
    assert_eq!(updated.customer_name, "Rina Wati");
    assert_eq!(updated.shipping_address, "Jl. Dago No. 5");
    assert_eq!(updated.shipping_district_id, Some(600));
    assert_eq!(updated.shipping_sub_district_id, Some(32001));
    assert_eq!(updated.payment_method_name, "Transfer Bank");
    assert_eq!(updated.grand_total, dec!(55000));
    assert_eq!(
        app.order_row(order.id).await.updated_by.as_deref(),
        Some(TEST_ACTOR)
    );
}

#[tokio::test]
async fn update_resnapshots_only_the_changed_payment_method() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture().await;
    let order = app.create_order(&fixture).await;
    let cod = app.seed_payment_method("COD", true).await;

    let updated = app
        .state
        .services
        .orders
        .update(
            order.id,
            UpdateOrderInput {
                payment_method_id: Some(cod.id),
                ..Default::default()
            },
            TEST_ACTOR,
        )
        .await
        .expect("payment method change");

    assert_eq!(updated.payment_method_id, cod.id);
    assert_eq!(updated.payment_method_name, "COD");
    assert_eq!(updated.customer_name, "Budi Santoso");
    assert_eq!(updated.shipping_address, "Jl. Braga No. 10");
}

#[tokio::test]
async fn update_rejects_an_inactive_payment_method() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture().await;
    let order = app.create_order(&fixture).await;
    let retired = app.seed_payment_method("Old", false).await;

    let result = app
        .state
        .services
        .orders
        .update(
            order.id,
            UpdateOrderInput {
                payment_method_id: Some(retired.id),
                notes: Some("should not land".into()),
                ..Default::default()
            },
            TEST_ACTOR,
        )
        .await;

    assert_matches!(result, Err(ServiceError::ValidationError(msg)) if msg == "Payment method Old is inactive");
    let row = app.order_row(order.id).await;
    assert_eq!(row.payment_method_id, fixture.payment_method.id);
    assert_eq!(row.payment_method_name, "Transfer Bank");
    assert!(row.notes.is_none());
}

#[tokio::test]
async fn update_rejects_a_new_customer_with_the_old_address() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture().await;
    let order = app.create_order(&fixture).await;
    let rina = app.seed_customer("Rina Wati").await;

    let result = app
        .state
        .services
        .orders
        .update(
            order.id,
            UpdateOrderInput {
                customer_id: Some(rina.id),
                ..Default::default()
            },
            TEST_ACTOR,
        )
        .await;

    assert_matches!(result, Err(ServiceError::ValidationError(_)));
    let row = app.order_row(order.id).await;
    assert_eq!(row.customer_id, fixture.customer.id);
    assert_eq!(row.customer_name, "Budi Santoso");
}

#[tokio::test]
async fn failed_item_write_rolls_back_the_whole_update() {
    let app = TestApp::new().await;
    let fixture = app.seed_fixture().await;
    let order = app.create_order(&fixture).await;
    let lines = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(order.id))
        .all(app.db.as_ref())
        .await
        .unwrap();
    let coffee = lines
        .iter()
        .find(|l| l.product_id == fixture.coffee.id)
        .expect("coffee line")
        .clone();
    let kettle = lines
        .iter()
        .find(|l| l.product_id == fixture.kettle.id)
        .expect("kettle line")
        .clone();

    let mut changed: order::ActiveModel = app.order_row(order.id).await.into();
    changed.notes = Set(Some("half applied".into()));
    changed.total_amount = Set(dec!(1));
    changed.grand_total = Set(dec!(1));

    // Re-inserting an existing line id fails after the order row and the delete went through
    let now = Utc::now();
    let duplicate = order_item::ActiveModel {
        id: Set(coffee.id),
        order_id: Set(order.id),
        product_id: Set(coffee.product_id),
        product_name: Set(coffee.product_name.clone()),
        sku: Set(coffee.sku.clone()),
        weight: Set(coffee.weight),
        width: Set(coffee.width),
        height: Set(coffee.height),
        length: Set(coffee.length),
        quantity: Set(9),
        unit_price: Set(coffee.unit_price),
        subtotal: Set(coffee.unit_price * dec!(9)),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let result = OrderRepository::new(app.db.clone())
        .update_order_with_item_diff(
            changed,
            Some(ItemDiff {
                delete: vec![kettle.id],
                update: Vec::new(),
                insert: vec![duplicate],
            }),
        )
        .await;

    assert_matches!(result, Err(ServiceError::DatabaseError(_)));
    let row = app.order_row(order.id).await;
    assert!(row.notes.is_none());
    assert_eq!(row.total_amount, dec!(40000));
    assert_eq!(row.grand_total, dec!(55000));
    assert_eq!(app.count_items(Some(order.id)).await, 2);

    let after = app.state.services.orders.get(order.id).await.unwrap();
    let coffee_after = after
        .items
        .iter()
        .find(|i| i.id == coffee.id)
        .expect("coffee line kept");
    assert_eq!(coffee_after.quantity, 2);
    assert!(after.items.iter().any(|i| i.id == kettle.id));
}
