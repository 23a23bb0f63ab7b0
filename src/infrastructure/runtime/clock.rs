use crate::domain::ports::time_service::TimeService;
use chrono::{DateTime, Utc};

#[derive(Clone, Default)]
pub struct SystemTimeService;

impl SystemTimeService {
    pub fn new() -> Self {
        Self
    }
}

impl TimeService for SystemTimeService {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
