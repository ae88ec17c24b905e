#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use chrono::Utc;
use courier_orders_api::{
    auth::{roles, AuthConfig, AuthService},
    config::{AppConfig, CourierConfig, ShipperConfig},
    courier::{
        CancelResponse, CourierError, CourierGateway, CourierRate, CourierResult, PickupDetail,
        PickupRequest, PickupResponse, RateQuery, TrackingDetails, TrackingResponse,
    },
    db::{self, DbConfig, DbPool},
    entities::{customer, customer_address, order, order_item, payment_method, product},
    handlers::AppServices,
    services::orders::{CreateOrderInput, OrderItemInput, OrderResponse},
    AppState,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_ACTOR: &str = "admin-1";

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        jwt_secret: "test_secret_for_courier_orders_api_0123456789".into(),
        host: "127.0.0.1".into(),
        port: 8080,
        environment: "test".into(),
        log_level: "debug".into(),
        log_json: false,
        auto_migrate: true,
        cors_allowed_origins: None,
        db_max_connections: 1,
        db_min_connections: 1,
        db_connect_timeout_secs: 5,
        order_number_prefix: "AMP".into(),
        business_utc_offset_hours: 7,
        shipment_claim_ttl_secs: 300,
        webhook_secret: None,
        courier: CourierConfig {
            base_url: "https://tdev.kiriminaja.com".into(),
            api_key: "kj-test-key".into(),
            timeout_secs: 30,
        },
        shipper: ShipperConfig {
            name: "Gudang Utama".into(),
            phone: "081234567890".into(),
            district_id: 548,
            sub_district_id: 31483,
            address: "Jl. Merdeka No. 1".into(),
            zip_code: "40115".into(),
        },
    }
}

/// What the fake courier answers to a pickup request
#[derive(Debug, Clone)]
pub enum PickupPlan {
    /// Booked, with the AWB assigned immediately
    Awb(String),
    /// Booked, AWB assigned later through a webhook
    PendingAwb { pickup_number: String },
    /// Positive acknowledgement carrying neither an AWB nor a pickup number
    EmptyAck,
    /// Provider answered `status: false`
    Reject(String),
    Timeout,
}

/// In-process courier that records every call it receives
pub struct FakeCourier {
    plan: Mutex<PickupPlan>,
    pickup_delay: Mutex<Option<Duration>>,
    pub pickups: Mutex<Vec<PickupRequest>>,
    pub voids: Mutex<Vec<(String, String)>>,
    pub awb_cancels: Mutex<Vec<(String, String)>>,
    pub tracked: Mutex<Vec<String>>,
}

impl Default for FakeCourier {
    fn default() -> Self {
        Self {
            plan: Mutex::new(PickupPlan::Awb("JX1000000001".into())),
            pickup_delay: Mutex::new(None),
            pickups: Mutex::new(Vec::new()),
            voids: Mutex::new(Vec::new()),
            awb_cancels: Mutex::new(Vec::new()),
            tracked: Mutex::new(Vec::new()),
        }
    }
}

impl FakeCourier {
    pub fn set_plan(&self, plan: PickupPlan) {
        *self.plan.lock().unwrap() = plan;
    }

    pub fn set_pickup_delay(&self, delay: Duration) {
        *self.pickup_delay.lock().unwrap() = Some(delay);
    }

    pub fn pickup_calls(&self) -> usize {
        self.pickups.lock().unwrap().len()
    }

    pub fn last_pickup(&self) -> Option<PickupRequest> {
        self.pickups.lock().unwrap().last().cloned()
    }

    pub fn void_calls(&self) -> usize {
        self.voids.lock().unwrap().len()
    }

    pub fn awb_cancel_calls(&self) -> usize {
        self.awb_cancels.lock().unwrap().len()
    }
}

#[async_trait]
impl CourierGateway for FakeCourier {
    async fn check_rate(&self, query: &RateQuery) -> CourierResult<Vec<CourierRate>> {
        Ok(vec![CourierRate {
            service: "jne".into(),
            service_type: "REG23".into(),
            service_label: Some("JNE Reguler".into()),
            price: Decimal::from(query.weight * 9),
            estimated_day: Some("2-3".into()),
            cod: query.cod == 1,
            insurance: false,
            insurance_fee: Decimal::ZERO,
            cod_fee: Decimal::ZERO,
            weight: Some(query.weight),
            min_weight: None,
            group: Some("regular".into()),
        }])
    }

    async fn request_pickup(&self, request: &PickupRequest) -> CourierResult<PickupResponse> {
        self.pickups.lock().unwrap().push(request.clone());
        let delay = *self.pickup_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let plan = self.plan.lock().unwrap().clone();
        let order_number = request
            .packages
            .first()
            .map(|p| p.order_id.clone())
            .unwrap_or_default();
        match plan {
            PickupPlan::Awb(awb) => Ok(PickupResponse {
                status: true,
                text: Some("Request pickup berhasil".into()),
                payment_status: Some("paid".into()),
                qr_url: Some("https://example.test/qr.png".into()),
                details: vec![PickupDetail {
                    order_id: order_number,
                    kj_order_id: Some("KJ-1".into()),
                    awb: Some(awb),
                    service: Some("jne".into()),
                    service_type: Some("REG23".into()),
                }],
                pickup_number: Some("XID-100".into()),
            }),
            PickupPlan::PendingAwb { pickup_number } => Ok(PickupResponse {
                status: true,
                text: None,
                payment_status: None,
                qr_url: None,
                details: vec![PickupDetail {
                    order_id: order_number,
                    kj_order_id: None,
                    awb: None,
                    service: None,
                    service_type: None,
                }],
                pickup_number: Some(pickup_number),
            }),
            PickupPlan::EmptyAck => Ok(PickupResponse {
                status: true,
                text: None,
                payment_status: None,
                qr_url: None,
                details: Vec::new(),
                pickup_number: None,
            }),
            PickupPlan::Reject(text) => Err(CourierError::Rejected(text)),
            PickupPlan::Timeout => Err(CourierError::Timeout),
        }
    }

    async fn track(&self, awb: &str) -> CourierResult<TrackingResponse> {
        self.tracked.lock().unwrap().push(awb.to_string());
        Ok(TrackingResponse {
            status: true,
            text: None,
            details: Some(TrackingDetails {
                awb: awb.to_string(),
                order_id: None,
                status_code: Some(200),
                service: Some("jne".into()),
                service_name: None,
                estimation: None,
                shipped_at: None,
                delivered: false,
                delivered_at: None,
            }),
            histories: Vec::new(),
        })
    }

    async fn void_order(&self, order_number: &str, reason: &str) -> CourierResult<CancelResponse> {
        self.voids
            .lock()
            .unwrap()
            .push((order_number.to_string(), reason.to_string()));
        Ok(CancelResponse {
            status: true,
            text: Some("Order dibatalkan".into()),
            details: None,
        })
    }

    async fn cancel_awb(&self, awb: &str, reason: &str) -> CourierResult<CancelResponse> {
        self.awb_cancels
            .lock()
            .unwrap()
            .push((awb.to_string(), reason.to_string()));
        Ok(CancelResponse {
            status: true,
            text: Some("Pengiriman dibatalkan".into()),
            details: None,
        })
    }

    async fn provinces(&self) -> CourierResult<Value> {
        Ok(json!([{ "id": 9, "provinsi_name": "Jawa Barat" }]))
    }

    async fn cities(&self, province_id: i64) -> CourierResult<Value> {
        Ok(json!([{ "id": 23, "provinsi_id": province_id, "kabupaten_name": "Bandung" }]))
    }

    async fn districts(&self, city_id: i64) -> CourierResult<Value> {
        Ok(json!([{ "id": 548, "kabupaten_id": city_id, "kecamatan_name": "Sumur Bandung" }]))
    }

    async fn sub_districts(&self, district_id: i64) -> CourierResult<Value> {
        Ok(json!([{ "id": 31483, "kecamatan_id": district_id, "kelurahan_name": "Braga" }]))
    }

    async fn search_address(&self, keyword: &str) -> CourierResult<Value> {
        Ok(json!([{ "id": 548, "text": format!("{} - Sumur Bandung", keyword) }]))
    }

    async fn pickup_schedules(&self) -> CourierResult<Value> {
        Ok(json!([{ "clock": "2024-06-01 14:00:00", "until": "16:00", "expired": 0 }]))
    }

    async fn couriers(&self) -> CourierResult<Value> {
        Ok(json!([{ "code": "jne", "name": "JNE" }]))
    }
}

/// Reference rows an order can be created against
#[derive(Debug, Clone)]
pub struct Fixture {
    pub customer: customer::Model,
    pub address: customer_address::Model,
    pub payment_method: payment_method::Model,
    /// 15000 each, 500 g, 10x20x15 cm
    pub coffee: product::Model,
    /// 10000 each, 300 g, no dimensions
    pub kettle: product::Model,
}

impl Fixture {
    /// 2 x 15000 + 1 x 10000 with shipping 12000 and add cost 3000
    pub fn order_input(&self) -> CreateOrderInput {
        CreateOrderInput {
            customer_id: self.customer.id,
            customer_address_id: self.address.id,
            payment_method_id: self.payment_method.id,
            service: Some("jne".into()),
            service_name: Some("JNE Reguler".into()),
            service_type: Some("REG23".into()),
            is_cod: false,
            is_drop_off: false,
            shipping_cost: Some(dec!(12000)),
            add_cost: Some(dec!(3000)),
            notes: None,
            items: vec![
                OrderItemInput {
                    id: None,
                    product_id: self.coffee.id,
                    quantity: 2,
                    unit_price: dec!(15000),
                },
                OrderItemInput {
                    id: None,
                    product_id: self.kettle.id,
                    quantity: 1,
                    unit_price: dec!(10000),
                },
            ],
        }
    }

    pub fn order_json(&self) -> Value {
        json!({
            "customer_id": self.customer.id,
            "customer_address_id": self.address.id,
            "payment_method_id": self.payment_method.id,
            "service": "jne",
            "service_name": "JNE Reguler",
            "service_type": "REG23",
            "shipping_cost": "12000",
            "add_cost": "3000",
            "items": [
                { "product_id": self.coffee.id, "quantity": 2, "unit_price": "15000" },
                { "product_id": self.kettle.id, "quantity": 1, "unit_price": "10000" }
            ]
        })
    }
}

/// Helper harness for spinning up the application backed by an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub db: Arc<DbPool>,
    pub courier: Arc<FakeCourier>,
    auth_service: Arc<AuthService>,
    token: String,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(cfg: AppConfig) -> Self {
        let db_config = DbConfig {
            url: cfg.database_url.clone(),
            max_connections: 1,
            min_connections: 1,
            sqlx_logging: false,
            ..Default::default()
        };
        let pool = db::establish_connection_with_config(&db_config)
            .await
            .expect("connect in-memory sqlite");
        db::run_migrations(&pool).await.expect("run migrations");
        let db_arc = Arc::new(pool);

        let courier = Arc::new(FakeCourier::default());
        let auth_service = Arc::new(AuthService::new(AuthConfig::new(cfg.jwt_secret.clone())));
        let services = AppServices::new(db_arc.clone(), courier.clone(), &cfg);

        let state = AppState {
            db: db_arc.clone(),
            config: cfg,
            services,
            auth: auth_service.clone(),
        };

        let token = auth_service
            .issue_token(TEST_ACTOR, Some("Test Admin"), &[roles::ADMIN])
            .expect("issue admin token");
        let router = courier_orders_api::app(state.clone());

        Self {
            router,
            state,
            db: db_arc,
            courier,
            auth_service,
            token,
        }
    }

    /// Bearer token for the default ADMIN user
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn token_with_roles(&self, roles: &[&str]) -> String {
        self.auth_service
            .issue_token("user-2", None, roles)
            .expect("issue token")
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        self.request_with_headers(method, uri, body, token, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
        headers: &[(&str, &str)],
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Convenience helper for authenticated JSON requests.
    pub async fn request_authenticated(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        self.request(method, uri, body, Some(self.token())).await
    }

    /// Raw webhook post, body sent as-is
    pub async fn post_webhook(&self, body: &str, secret: Option<&str>) -> axum::response::Response {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/webhooks/courier")
            .header("content-type", "application/json");
        if let Some(secret) = secret {
            builder = builder.header("x-webhook-secret", secret);
        }
        let request = builder
            .body(Body::from(body.to_string()))
            .expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn seed_customer(&self, name: &str) -> customer::Model {
        customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            phone: Set("081299990000".into()),
            country_code: Set("62".into()),
            email: Set(Some(format!("{}@example.test", name.to_lowercase().replace(' ', ".")))),
            created_at: Set(Utc::now()),
            deleted_at: Set(None),
        }
        .insert(self.db.as_ref())
        .await
        .expect("seed customer")
    }

    pub async fn seed_address(&self, customer_id: Uuid) -> customer_address::Model {
        customer_address::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(customer_id),
            label: Set(Some("Rumah".into())),
            full_address: Set("Jl. Braga No. 10".into()),
            province_name: Set(Some("Jawa Barat".into())),
            city_name: Set(Some("Bandung".into())),
            district_name: Set(Some("Sumur Bandung".into())),
            sub_district_name: Set(Some("Braga".into())),
            district_id: Set(Some(548)),
            sub_district_id: Set(Some(31483)),
            zip_code: Set(Some("40111".into())),
            created_at: Set(Utc::now()),
            deleted_at: Set(None),
        }
        .insert(self.db.as_ref())
        .await
        .expect("seed address")
    }

    pub async fn seed_payment_method(&self, name: &str, is_active: bool) -> payment_method::Model {
        payment_method::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            is_active: Set(is_active),
            created_at: Set(Utc::now()),
        }
        .insert(self.db.as_ref())
        .await
        .expect("seed payment method")
    }

    pub async fn seed_product(
        &self,
        name: &str,
        price: Decimal,
        weight: Option<i32>,
        dims: Option<(Decimal, Decimal, Decimal)>,
        is_active: bool,
    ) -> product::Model {
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            sku: Set(Some(format!("SKU-{}", name.to_uppercase()))),
            price: Set(price),
            weight: Set(weight),
            width: Set(dims.map(|d| d.0)),
            height: Set(dims.map(|d| d.1)),
            length: Set(dims.map(|d| d.2)),
            is_active: Set(is_active),
            created_at: Set(Utc::now()),
            deleted_at: Set(None),
        }
        .insert(self.db.as_ref())
        .await
        .expect("seed product")
    }

    pub async fn seed_fixture(&self) -> Fixture {
        let customer = self.seed_customer("Budi Santoso").await;
        let address = self.seed_address(customer.id).await;
        let payment_method = self.seed_payment_method("Transfer Bank", true).await;
        let coffee = self
            .seed_product(
                "Kopi",
                dec!(15000),
                Some(500),
                Some((dec!(10), dec!(20), dec!(15))),
                true,
            )
            .await;
        let kettle = self
            .seed_product("Teko", dec!(10000), Some(300), None, true)
            .await;

        Fixture {
            customer,
            address,
            payment_method,
            coffee,
            kettle,
        }
    }

    /// Creates the worked-example order through the service
    pub async fn create_order(&self, fixture: &Fixture) -> OrderResponse {
        self.state
            .services
            .orders
            .create(fixture.order_input(), TEST_ACTOR)
            .await
            .expect("create order")
    }

    /// Reads the order row, including soft-deleted ones
    pub async fn order_row(&self, id: Uuid) -> order::Model {
        order::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .expect("query order")
            .expect("order row exists")
    }

    pub async fn set_order_fields(&self, id: Uuid, edit: impl FnOnce(&mut order::ActiveModel)) {
        let mut active: order::ActiveModel = self.order_row(id).await.into();
        edit(&mut active);
        active.update(self.db.as_ref()).await.expect("update order");
    }

    pub async fn count_orders(&self) -> u64 {
        order::Entity::find()
            .count(self.db.as_ref())
            .await
            .expect("count orders")
    }

    pub async fn count_items(&self, order_id: Option<Uuid>) -> u64 {
        let mut query = order_item::Entity::find();
        if let Some(order_id) = order_id {
            query = query.filter(order_item::Column::OrderId.eq(order_id));
        }
        query.count(self.db.as_ref()).await.expect("count items")
    }
}

pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body is json")
    }
}
