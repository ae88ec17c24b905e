use chrono::{DateTime, Utc};
use rand::Rng;

/// Attempts made to insert an order before a number collision becomes a conflict
pub const MAX_ORDER_NUMBER_ATTEMPTS: usize = 3;

/// Supplies candidate order numbers. Uniqueness is enforced by the database
/// index; callers retry on collision.
pub trait OrderNumberSource: Send + Sync {
    fn next_number(&self) -> String;
}

/// Human-readable order numbers: prefix, epoch millis, three random digits.
#[derive(Debug, Clone)]
pub struct OrderNumberGenerator {
    prefix: String,
}

impl OrderNumberGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn generate(&self) -> String {
        self.generate_at(Utc::now())
    }

    pub fn generate_at(&self, now: DateTime<Utc>) -> String {
        let suffix: u16 = rand::thread_rng().gen_range(0..1000);
        format!("{}{}{:03}", self.prefix, now.timestamp_millis(), suffix)
    }
}

impl OrderNumberSource for OrderNumberGenerator {
    fn next_number(&self) -> String {
        self.generate()
    }
}
