//! Time source for the lending services

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use crate::error::{AppError, AppResult};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// `at` moved forward by `days` whole days
pub fn days_after(at: DateTime<Utc>, days: i64) -> AppResult<DateTime<Utc>> {
    shifted(at, Duration::try_days(days), days, "days")
}

/// `at` moved forward by `hours` hours
pub fn hours_after(at: DateTime<Utc>, hours: i64) -> AppResult<DateTime<Utc>> {
    shifted(at, Duration::try_hours(hours), hours, "hours")
}

fn shifted(at: DateTime<Utc>, span: Option<Duration>, amount: i64, unit: &str) -> AppResult<DateTime<Utc>> {
    span.and_then(|span| at.checked_add_signed(span))
        .ok_or_else(|| AppError::Validation(format!("{} {} is out of range", amount, unit)))
}
