//! Administrative account changes

use crate::{
    error::{AppError, AppResult},
    models::{user::MAX_CREDIT_SCORE, User, UserStatus},
    repository::LendingChanges,
};

use super::{gate, LendingContext};

#[derive(Clone)]
pub struct AccountService {
    ctx: LendingContext,
}

impl AccountService {
    pub fn new(ctx: LendingContext) -> Self {
        Self { ctx }
    }

    pub async fn get_user(&self, user_id: i32) -> AppResult<User> {
        self.ctx.load_user(user_id).await
    }

    /// Move a user's credit score by `delta`. Falling below the threshold
    /// freezes; climbing back over it unfreezes unless a long overdue fine
    /// is still open.
    pub async fn adjust_credit(&self, user_id: i32, delta: i32) -> AppResult<User> {
        let _region = self.ctx.regions.user(user_id).await;
        let mut user = self.ctx.load_user(user_id).await?;

        if user.status == UserStatus::Deleted {
            return Err(AppError::NotFound(format!("User with id {} not found", user_id)));
        }

        let score = user.credit_score.checked_add(delta).unwrap_or(-1);
        if !(0..=MAX_CREDIT_SCORE).contains(&score) {
            return Err(AppError::Validation(format!(
                "Credit score {} + {} is outside 0..={}",
                user.credit_score, delta, MAX_CREDIT_SCORE
            )));
        }

        let still_freezing = delta > 0 && self.ctx.has_freezing_fine(user_id, None).await?;
        gate::apply_credit_change(&mut user, delta, still_freezing, &self.ctx.policy);
        self.save(&user).await?;

        tracing::info!(user_id, delta, credit = score, status = %user.status, "Credit adjusted");
        Ok(user)
    }

    /// Freeze or unfreeze an account by hand
    pub async fn change_status(&self, user_id: i32, status: UserStatus) -> AppResult<User> {
        if status == UserStatus::Deleted {
            return Err(AppError::Validation(
                "Status can only be set to normal or frozen".to_string(),
            ));
        }

        let _region = self.ctx.regions.user(user_id).await;
        let mut user = self.ctx.load_user(user_id).await?;

        if user.status == UserStatus::Deleted {
            return Err(AppError::NotFound(format!("User with id {} not found", user_id)));
        }
        if user.status == status {
            return Err(AppError::Conflict(format!("User {} is already {}", user_id, status)));
        }

        let previous = user.status;
        user.status = status;
        self.save(&user).await?;

        tracing::info!(user_id, from = %previous, to = %status, "Account status changed");
        Ok(user)
    }

    async fn save(&self, user: &User) -> AppResult<()> {
        self.ctx
            .store
            .commit(LendingChanges {
                users: vec![user.clone()],
                ..Default::default()
            })
            .await?;
        Ok(())
    }
}
