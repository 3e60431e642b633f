//! Overdue and fine arithmetic

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::config::LendingConfig;

/// Whole days between `due` and `at`, any started day counting as a full one.
///
/// Exact instants are compared, not calendar dates: returning one second
/// after the due instant is one day late, returning exactly on it is on time.
pub fn overdue_days(due: DateTime<Utc>, at: DateTime<Utc>) -> i64 {
    let late = at - due;
    if late <= Duration::zero() {
        return 0;
    }
    let whole = late.num_days();
    if late > Duration::days(whole) {
        whole + 1
    } else {
        whole
    }
}

/// `days × daily rate`, capped at the maximum fine
pub fn fine_for(days: i64, policy: &LendingConfig) -> Decimal {
    if days <= 0 {
        return Decimal::ZERO;
    }
    (policy.daily_fine_rate * Decimal::from(days)).min(policy.max_fine)
}
