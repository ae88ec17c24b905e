pub mod health;
pub mod orders;
pub mod shipping;
pub mod webhooks;

use crate::{
    config::AppConfig,
    courier::CourierGateway,
    db::DbPool,
    services::{OrderNumberGenerator, OrderService, ShipmentService, ShipmentSettings},
    webhooks::CourierWebhookReconciler,
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub shipments: Arc<ShipmentService>,
    pub courier_webhooks: Arc<CourierWebhookReconciler>,
}

impl AppServices {
    /// Wires every service against one database pool and courier gateway
    pub fn new(db_pool: Arc<DbPool>, gateway: Arc<dyn CourierGateway>, config: &AppConfig) -> Self {
        let orders = Arc::new(OrderService::new(
            db_pool.clone(),
            Arc::new(OrderNumberGenerator::new(config.order_number_prefix.clone())),
        ));
        let shipments = Arc::new(ShipmentService::new(
            db_pool.clone(),
            gateway,
            ShipmentSettings::from(config),
        ));
        let courier_webhooks = Arc::new(CourierWebhookReconciler::new(db_pool));

        Self {
            orders,
            shipments,
            courier_webhooks,
        }
    }
}
