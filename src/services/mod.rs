// Order lifecycle
pub mod order_number;
pub mod orders;

// Courier-facing shipment orchestration
pub mod shipments;

pub use order_number::{OrderNumberGenerator, OrderNumberSource};
pub use orders::OrderService;
pub use shipments::{ShipmentService, ShipmentSettings};
