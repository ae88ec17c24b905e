pub mod request_id;
pub mod webhook_secret;

pub use request_id::{request_id_middleware, REQUEST_ID_HEADER};
pub use webhook_secret::{webhook_secret_middleware, WEBHOOK_SECRET_HEADER};
