pub mod customer;
pub mod customer_address;
pub mod order;
pub mod order_item;
pub mod payment_method;
pub mod product;

pub use order::OrderStatus;
