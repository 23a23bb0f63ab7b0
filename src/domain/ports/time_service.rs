use chrono::{DateTime, Utc};

/// Source of "now" for every temporal threshold
pub trait TimeService: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
