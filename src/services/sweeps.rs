//! Time-driven sweeps over loans and holds

use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::{BorrowStatus, ReserveRecord, ReserveStatus},
    repository::{BorrowFilter, LendingChanges, ReserveFilter},
};

use super::{clock, fines, gate, LendingContext};

/// A record a sweep could not process
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SweepFailure {
    pub id: i32,
    pub error: String,
}

/// Outcome of one sweep pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct SweepReport {
    /// Records changed by this pass
    pub processed: Vec<i32>,
    /// Records already handled or not yet due
    pub skipped: Vec<i32>,
    pub failures: Vec<SweepFailure>,
}

impl SweepReport {
    fn record(&mut self, id: i32, outcome: AppResult<bool>, what: &str) {
        match outcome {
            Ok(true) => self.processed.push(id),
            Ok(false) => self.skipped.push(id),
            Err(e) => {
                tracing::warn!(id, error = %e, "{} sweep failed for record", what);
                self.failures.push(SweepFailure {
                    id,
                    error: e.to_string(),
                });
            }
        }
    }
}

#[derive(Clone)]
pub struct SweepService {
    ctx: LendingContext,
}

impl SweepService {
    pub fn new(ctx: LendingContext) -> Self {
        Self { ctx }
    }

    /// Mark late loans overdue and charge them. With an id only that record is
    /// considered; an unknown id is `NotFound`.
    pub async fn sweep_overdue(&self, record_id: Option<i32>) -> AppResult<SweepReport> {
        let ids = match record_id {
            Some(id) => vec![self.ctx.load_borrow(id).await?.id],
            None => self
                .ctx
                .store
                .find_borrows(
                    BorrowFilter::default()
                        .status(BorrowStatus::Unreturned)
                        .due_before(self.ctx.clock.now()),
                )
                .await?
                .into_iter()
                .map(|r| r.id)
                .collect(),
        };

        let mut report = SweepReport::default();
        for id in ids {
            let outcome = self.mark_overdue(id).await;
            report.record(id, outcome, "Overdue");
        }

        tracing::info!(
            processed = report.processed.len(),
            skipped = report.skipped.len(),
            failed = report.failures.len(),
            "Overdue sweep finished"
        );
        Ok(report)
    }

    async fn mark_overdue(&self, record_id: i32) -> AppResult<bool> {
        let book_id = self.ctx.load_borrow(record_id).await?.book_id;
        let _region = self.ctx.regions.book(book_id).await;

        let mut record = self.ctx.load_borrow(record_id).await?;
        let now = self.ctx.clock.now();
        if record.status != BorrowStatus::Unreturned || record.due_date >= now {
            return Ok(false);
        }

        let overdue_days = fines::overdue_days(record.due_date, now);
        record.status = BorrowStatus::Overdue;
        record.overdue_days = overdue_days;
        record.fine_amount = fines::fine_for(overdue_days, &self.ctx.policy);

        let _user_region = self.ctx.regions.user(record.user_id).await;
        let mut user = self.ctx.load_user(record.user_id).await?;

        let mut frozen = gate::apply_credit_penalty(
            &mut user,
            overdue_days - record.penalized_days,
            &self.ctx.policy,
        );
        record.penalized_days = record.penalized_days.max(overdue_days);
        if overdue_days >= self.ctx.policy.freeze_threshold_days {
            frozen |= gate::freeze(&mut user);
        }

        self.ctx
            .store
            .commit(LendingChanges {
                borrows: vec![record.clone()],
                users: vec![user.clone()],
                ..Default::default()
            })
            .await?;

        if frozen {
            tracing::warn!(user_id = user.id, record_id, overdue_days, "Account frozen by overdue sweep");
        }
        tracing::debug!(record_id, overdue_days, fine = %record.fine_amount, "Loan marked overdue");
        Ok(true)
    }

    /// Cancel waiting holds past their expire date
    pub async fn sweep_expired_reservations(&self, reserve_id: Option<i32>) -> AppResult<SweepReport> {
        let ids = match reserve_id {
            Some(id) => vec![self.ctx.load_reservation(id).await?.id],
            None => self
                .ctx
                .store
                .find_reservations(
                    ReserveFilter::default()
                        .status(ReserveStatus::Waiting)
                        .expire_before(self.ctx.clock.now()),
                )
                .await?
                .into_iter()
                .map(|r| r.id)
                .collect(),
        };

        let mut report = SweepReport::default();
        for id in ids {
            let outcome = self.expire_reservation(id).await;
            report.record(id, outcome, "Reservation");
        }

        tracing::info!(
            processed = report.processed.len(),
            skipped = report.skipped.len(),
            failed = report.failures.len(),
            "Reservation sweep finished"
        );
        Ok(report)
    }

    async fn expire_reservation(&self, reserve_id: i32) -> AppResult<bool> {
        let book_id = self.ctx.load_reservation(reserve_id).await?.book_id;
        let _region = self.ctx.regions.book(book_id).await;

        let mut record = self.ctx.load_reservation(reserve_id).await?;
        if record.status != ReserveStatus::Waiting || !record.is_expired_at(self.ctx.clock.now()) {
            return Ok(false);
        }

        record.status = ReserveStatus::Cancelled;
        self.ctx
            .store
            .commit(LendingChanges {
                reservations: vec![record],
                ..Default::default()
            })
            .await?;

        tracing::debug!(reserve_id, book_id, "Expired reservation cancelled");
        Ok(true)
    }

    /// Waiting holds that expire within the next `hours`
    pub async fn upcoming_expiring(&self, hours: i64) -> AppResult<Vec<ReserveRecord>> {
        if hours <= 0 {
            return Err(AppError::Validation("Hours must be positive".to_string()));
        }
        let now = self.ctx.clock.now();
        let until = clock::hours_after(now, hours)?;
        self.ctx
            .store
            .find_reservations(
                ReserveFilter::default()
                    .status(ReserveStatus::Waiting)
                    .expire_from(now)
                    .expire_until(until),
            )
            .await
    }

    /// Run both sweeps, logging instead of returning errors
    pub async fn run_all(&self) {
        if let Err(e) = self.sweep_overdue(None).await {
            tracing::error!(error = %e, "Overdue sweep aborted");
        }
        if let Err(e) = self.sweep_expired_reservations(None).await {
            tracing::error!(error = %e, "Reservation sweep aborted");
        }
    }
}
