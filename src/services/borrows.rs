//! Borrow state machine: lend, return, renew and settle fines

use crate::{
    error::{AppError, AppResult},
    models::{BorrowRecord, BorrowStatus, FinePayment, NewBorrowRecord, ReserveStatus},
    repository::{BorrowFilter, LendingChanges},
};

use super::{clock, fines, gate, ledger, reservations::BorrowGate, LendingContext};

#[derive(Clone)]
pub struct BorrowService {
    ctx: LendingContext,
}

impl BorrowService {
    pub fn new(ctx: LendingContext) -> Self {
        Self { ctx }
    }

    /// Lend one copy of `book_id` to `user_id` for `days` days
    pub async fn borrow(&self, user_id: i32, book_id: i32, days: i64) -> AppResult<BorrowRecord> {
        if days <= 0 {
            return Err(AppError::Validation("Loan duration must be at least one day".to_string()));
        }

        let region = self.ctx.regions.book(book_id).await;

        let user = self.ctx.load_user(user_id).await?;
        gate::ensure_can_transact(&user)?;

        let mut book = self.ctx.load_book(book_id).await?;

        let out = self
            .ctx
            .store
            .find_borrows(BorrowFilter::default().user(user_id).book(book_id).out_only())
            .await?;
        if let Some(existing) = out.first() {
            return Err(AppError::DuplicateBorrow(format!(
                "User {} already has book {} out (record {})",
                user_id, book_id, existing.id
            )));
        }

        let claimed = BorrowGate::load(self.ctx.store.as_ref(), &region)
            .await?
            .admit(user_id)?;

        let mut changes = LendingChanges::default();
        changes.stock.push(ledger::reserve_unit(&region, &mut book)?);

        if let Some(mut hold) = claimed {
            hold.status = ReserveStatus::Completed;
            changes.reservations.push(hold);
        }

        let now = self.ctx.clock.now();
        changes.new_borrow = Some(NewBorrowRecord {
            book_id,
            user_id,
            borrow_date: now,
            due_date: clock::days_after(now, days)?,
        });

        let record = self
            .ctx
            .store
            .commit(changes)
            .await?
            .borrow
            .ok_or_else(|| AppError::Internal("Borrow record was not created".to_string()))?;

        tracing::info!(
            record_id = record.id,
            user_id,
            book_id,
            due_date = %record.due_date,
            available = book.available_stock,
            "Book borrowed"
        );
        Ok(record)
    }

    /// Hand a copy back, charging a fine and credit penalty when late
    pub async fn return_book(&self, record_id: i32) -> AppResult<BorrowRecord> {
        let book_id = self.ctx.load_borrow(record_id).await?.book_id;
        let region = self.ctx.regions.book(book_id).await;

        let mut record = self.ctx.load_borrow(record_id).await?;
        if !record.is_out() {
            return Err(AppError::AlreadyReturned(format!(
                "Record {} was already returned",
                record_id
            )));
        }

        let now = self.ctx.clock.now();
        let overdue_days = fines::overdue_days(record.due_date, now);
        record.return_date = Some(now);

        let mut changes = LendingChanges::default();
        let mut _user_region = None;

        if overdue_days > 0 {
            record.status = BorrowStatus::Overdue;
            record.overdue_days = overdue_days;
            record.fine_amount = fines::fine_for(overdue_days, &self.ctx.policy);

            let charge = overdue_days - record.penalized_days;
            if charge > 0 {
                _user_region = Some(self.ctx.regions.user(record.user_id).await);
                let mut user = self.ctx.load_user(record.user_id).await?;
                if gate::apply_credit_penalty(&mut user, charge, &self.ctx.policy) {
                    tracing::warn!(user_id = user.id, credit = user.credit_score, "Account frozen");
                }
                record.penalized_days = overdue_days;
                changes.users.push(user);
            }
        } else {
            record.status = BorrowStatus::Returned;
        }

        let mut book = self.ctx.load_book(book_id).await?;
        changes.stock.push(ledger::release_unit(&region, &mut book)?);
        changes.borrows.push(record.clone());

        self.ctx.store.commit(changes).await?;

        tracing::info!(
            record_id,
            book_id,
            overdue_days,
            fine = %record.fine_amount,
            "Book returned"
        );
        Ok(record)
    }

    /// Push the due date back by `days`
    pub async fn renew(&self, record_id: i32, days: i64) -> AppResult<BorrowRecord> {
        if days <= 0 {
            return Err(AppError::Validation("Renewal must be at least one day".to_string()));
        }

        let book_id = self.ctx.load_borrow(record_id).await?.book_id;
        let _region = self.ctx.regions.book(book_id).await;

        let mut record = self.ctx.load_borrow(record_id).await?;
        if record.status != BorrowStatus::Unreturned {
            return Err(AppError::NotRenewable(format!(
                "Record {} is {}, only unreturned loans can be renewed",
                record_id, record.status
            )));
        }
        if record.renew_count >= self.ctx.policy.max_renewals {
            return Err(AppError::RenewLimitExceeded(format!(
                "Record {} was already renewed {} times",
                record_id, record.renew_count
            )));
        }

        record.due_date = clock::days_after(record.due_date, days)?;
        record.renew_count += 1;

        self.ctx
            .store
            .commit(LendingChanges {
                borrows: vec![record.clone()],
                ..Default::default()
            })
            .await?;

        tracing::info!(record_id, renew_count = record.renew_count, due_date = %record.due_date, "Loan renewed");
        Ok(record)
    }

    /// Settle the fine of a returned overdue loan
    pub async fn pay_fine(&self, record_id: i32, user_id: i32) -> AppResult<FinePayment> {
        let book_id = self.ctx.load_borrow(record_id).await?.book_id;
        let _region = self.ctx.regions.book(book_id).await;

        let mut record = self.ctx.load_borrow(record_id).await?;
        if record.user_id != user_id {
            return Err(AppError::Unauthorized(format!(
                "Record {} belongs to another user",
                record_id
            )));
        }
        // A settled record is back to returned, so this precedes the status check
        if record.fine_paid_at.is_some() {
            return Err(AppError::AlreadyPaid(format!(
                "Fine of record {} was already paid",
                record_id
            )));
        }
        if record.status != BorrowStatus::Overdue {
            return Err(AppError::NotOverdue(format!(
                "Record {} is {}, nothing to pay",
                record_id, record.status
            )));
        }
        if record.is_out() {
            return Err(AppError::CopyNotReturned(format!(
                "Return the copy of record {} before paying its fine",
                record_id
            )));
        }

        let _user_region = self.ctx.regions.user(user_id).await;
        let mut user = self.ctx.load_user(user_id).await?;

        record.status = BorrowStatus::Returned;
        record.fine_paid_at = Some(self.ctx.clock.now());

        let still_freezing = self.ctx.has_freezing_fine(user_id, Some(record_id)).await?;

        let unfrozen = gate::reconcile_after_payment(&mut user, still_freezing, &self.ctx.policy);

        self.ctx
            .store
            .commit(LendingChanges {
                borrows: vec![record.clone()],
                users: vec![user.clone()],
                ..Default::default()
            })
            .await?;

        tracing::info!(record_id, user_id, amount = %record.fine_amount, unfrozen, "Fine paid");

        let message = if unfrozen {
            format!("Fine of {} paid, account restored", record.fine_amount)
        } else {
            format!("Fine of {} paid", record.fine_amount)
        };
        Ok(FinePayment {
            record_id,
            amount: record.fine_amount,
            user_status: user.status,
            message,
        })
    }

    pub async fn get_record(&self, record_id: i32) -> AppResult<BorrowRecord> {
        self.ctx.load_borrow(record_id).await
    }

    pub async fn user_records(
        &self,
        user_id: i32,
        status: Option<BorrowStatus>,
    ) -> AppResult<Vec<BorrowRecord>> {
        let mut filter = BorrowFilter::default().user(user_id);
        if let Some(status) = status {
            filter = filter.status(status);
        }
        self.ctx.store.find_borrows(filter).await
    }

    pub async fn book_records(
        &self,
        book_id: i32,
        status: Option<BorrowStatus>,
    ) -> AppResult<Vec<BorrowRecord>> {
        let mut filter = BorrowFilter::default().book(book_id);
        if let Some(status) = status {
            filter = filter.status(status);
        }
        self.ctx.store.find_borrows(filter).await
    }

    /// Overdue records whose fine is still open
    pub async fn unpaid_overdue(&self, user_id: i32) -> AppResult<Vec<BorrowRecord>> {
        let records = self
            .ctx
            .store
            .find_borrows(BorrowFilter::default().user(user_id).status(BorrowStatus::Overdue))
            .await?;
        Ok(records.into_iter().filter(BorrowRecord::has_unpaid_fine).collect())
    }
}
