//! Account status gate
//!
//! Pure rules deciding whether an account may start a loan or hold, and how
//! penalties and payments move it between `normal` and `frozen`. Deleted
//! accounts are never changed here.

use crate::{
    config::LendingConfig,
    error::{AppError, AppResult},
    models::{User, UserStatus},
};

/// Borrow and reserve entry check. Return, renew and fine payment skip it so
/// a frozen user can still clear their own delinquency.
pub fn ensure_can_transact(user: &User) -> AppResult<()> {
    match user.status {
        UserStatus::Normal => Ok(()),
        UserStatus::Frozen => Err(AppError::AccountFrozen(format!(
            "Account {} is frozen (credit score {})",
            user.id, user.credit_score
        ))),
        UserStatus::Deleted => Err(AppError::NotFound(format!("User {} not found", user.id))),
    }
}

/// Deduct `days` credit points, floored at 0. Returns true if this froze the account.
pub fn apply_credit_penalty(user: &mut User, days: i64, policy: &LendingConfig) -> bool {
    if days <= 0 {
        return false;
    }
    let penalty = i32::try_from(days).unwrap_or(i32::MAX);
    user.credit_score = user.credit_score.saturating_sub(penalty).max(0);
    if user.credit_score < policy.credit_freeze_threshold {
        return freeze(user);
    }
    false
}

/// Returns true if the status changed
pub fn freeze(user: &mut User) -> bool {
    if user.status == UserStatus::Normal {
        user.status = UserStatus::Frozen;
        return true;
    }
    false
}

/// Unfreeze after a fine payment, unless credit is still too low or another
/// unpaid fine is itself past the freeze threshold.
pub fn reconcile_after_payment(user: &mut User, still_freezing: bool, policy: &LendingConfig) -> bool {
    if user.status == UserStatus::Frozen
        && !still_freezing
        && user.credit_score >= policy.credit_freeze_threshold
    {
        user.status = UserStatus::Normal;
        return true;
    }
    false
}

/// Apply an administrative credit change. Dropping below the threshold
/// freezes; only a raise that crosses back over it can unfreeze, and then
/// under the same conditions as a fine payment. Returns true if the status
/// changed.
pub fn apply_credit_change(
    user: &mut User,
    delta: i32,
    still_freezing: bool,
    policy: &LendingConfig,
) -> bool {
    let before = user.credit_score;
    user.credit_score = before.saturating_add(delta);

    let threshold = policy.credit_freeze_threshold;
    if user.credit_score < threshold {
        return freeze(user);
    }
    if delta > 0 && before < threshold {
        return reconcile_after_payment(user, still_freezing, policy);
    }
    false
}
