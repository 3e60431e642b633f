//! PostgreSQL lending store
//!
//! A commit runs in one transaction. Book rows are read with
//! `SELECT ... FOR UPDATE` before their counters change, so the stock bounds
//! hold even when several server processes share the database.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, QueryBuilder};

use super::{checked_stock, BorrowFilter, Committed, LendingChanges, LendingStore, ReserveFilter};
use crate::{
    error::{AppError, AppResult},
    models::{
        Book, BorrowRecord, BorrowStatus, NewBorrowRecord, NewReserveRecord, ReserveRecord,
        ReserveStatus, User,
    },
};

const ONE_OUT_PER_USER_BOOK: &str = "borrow_records_one_out_per_user_book";
const ONE_ACTIVE_HOLD_PER_USER_BOOK: &str = "reserve_records_one_active_per_user_book";

#[derive(Clone)]
pub struct PgLendingStore {
    pool: Pool<Postgres>,
}

impl PgLendingStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

/// Translate partial unique index violations into lending errors
fn constraint_error(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &err {
        match db.constraint() {
            Some(ONE_OUT_PER_USER_BOOK) => {
                return AppError::DuplicateBorrow("User already has this book out".to_string())
            }
            Some(ONE_ACTIVE_HOLD_PER_USER_BOOK) => {
                return AppError::DuplicateReservation(
                    "User already has an active reservation for this book".to_string(),
                )
            }
            _ => {}
        }
    }
    AppError::Database(err)
}

#[async_trait]
impl LendingStore for PgLendingStore {
    async fn get_book(&self, id: i32) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(book)
    }

    async fn get_user(&self, id: i32) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, role, status, credit_score FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_borrow(&self, id: i32) -> AppResult<Option<BorrowRecord>> {
        let record = sqlx::query_as::<_, BorrowRecord>("SELECT * FROM borrow_records WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn get_reservation(&self, id: i32) -> AppResult<Option<ReserveRecord>> {
        let record = sqlx::query_as::<_, ReserveRecord>("SELECT * FROM reserve_records WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn find_borrows(&self, filter: BorrowFilter) -> AppResult<Vec<BorrowRecord>> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT * FROM borrow_records WHERE TRUE");

        if let Some(user_id) = filter.user_id {
            query.push(" AND user_id = ").push_bind(user_id);
        }
        if let Some(book_id) = filter.book_id {
            query.push(" AND book_id = ").push_bind(book_id);
        }
        if !filter.statuses.is_empty() {
            let codes: Vec<i16> = filter.statuses.iter().map(|s| i16::from(*s)).collect();
            query.push(" AND status = ANY(").push_bind(codes).push(")");
        }
        if filter.out_only {
            query.push(" AND return_date IS NULL");
        }
        if let Some(at) = filter.due_before {
            query.push(" AND due_date < ").push_bind(at);
        }
        query.push(" ORDER BY id");

        let records = query
            .build_query_as::<BorrowRecord>()
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    async fn find_reservations(&self, filter: ReserveFilter) -> AppResult<Vec<ReserveRecord>> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT * FROM reserve_records WHERE TRUE");

        if let Some(user_id) = filter.user_id {
            query.push(" AND user_id = ").push_bind(user_id);
        }
        if let Some(book_id) = filter.book_id {
            query.push(" AND book_id = ").push_bind(book_id);
        }
        if !filter.statuses.is_empty() {
            let codes: Vec<i16> = filter.statuses.iter().map(|s| i16::from(*s)).collect();
            query.push(" AND status = ANY(").push_bind(codes).push(")");
        }
        if let Some(at) = filter.expire_from {
            query.push(" AND expire_date >= ").push_bind(at);
        }
        if let Some(at) = filter.expire_until {
            query.push(" AND expire_date <= ").push_bind(at);
        }
        if let Some(at) = filter.expire_before {
            query.push(" AND expire_date < ").push_bind(at);
        }
        query.push(" ORDER BY reserve_date, id");

        let records = query
            .build_query_as::<ReserveRecord>()
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    async fn commit(&self, changes: LendingChanges) -> AppResult<Committed> {
        if changes.is_empty() {
            return Ok(Committed::default());
        }
        let mut tx = self.pool.begin().await?;

        for delta in &changes.stock {
            let (total, available): (i32, i32) = sqlx::query_as(
                "SELECT total_stock, available_stock FROM books WHERE id = $1 FOR UPDATE",
            )
            .bind(delta.book_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", delta.book_id)))?;

            let (total, available) = checked_stock(delta.book_id, total, available, delta)?;

            sqlx::query(
                "UPDATE books SET total_stock = $2, available_stock = $3, updated_at = NOW() WHERE id = $1",
            )
            .bind(delta.book_id)
            .bind(total)
            .bind(available)
            .execute(&mut *tx)
            .await?;
        }

        for user in &changes.users {
            let updated = sqlx::query("UPDATE users SET status = $2, credit_score = $3 WHERE id = $1")
                .bind(user.id)
                .bind(i16::from(user.status))
                .bind(user.credit_score)
                .execute(&mut *tx)
                .await?;
            if updated.rows_affected() == 0 {
                return Err(AppError::NotFound(format!("User {} not found", user.id)));
            }
        }

        for record in &changes.borrows {
            let updated = sqlx::query(
                r#"
                UPDATE borrow_records
                SET due_date = $2, return_date = $3, status = $4, renew_count = $5,
                    overdue_days = $6, fine_amount = $7, penalized_days = $8, fine_paid_at = $9
                WHERE id = $1
                "#,
            )
            .bind(record.id)
            .bind(record.due_date)
            .bind(record.return_date)
            .bind(i16::from(record.status))
            .bind(record.renew_count)
            .bind(record.overdue_days)
            .bind(record.fine_amount)
            .bind(record.penalized_days)
            .bind(record.fine_paid_at)
            .execute(&mut *tx)
            .await
            .map_err(constraint_error)?;
            if updated.rows_affected() == 0 {
                return Err(AppError::NotFound(format!("Borrow record {} not found", record.id)));
            }
        }

        for record in &changes.reservations {
            let updated = sqlx::query("UPDATE reserve_records SET status = $2 WHERE id = $1")
                .bind(record.id)
                .bind(i16::from(record.status))
                .execute(&mut *tx)
                .await
                .map_err(constraint_error)?;
            if updated.rows_affected() == 0 {
                return Err(AppError::NotFound(format!("Reservation {} not found", record.id)));
            }
        }

        let mut committed = Committed::default();

        if let Some(new) = changes.new_borrow {
            let NewBorrowRecord { book_id, user_id, borrow_date, due_date } = new.clone();
            let id: i32 = sqlx::query_scalar(
                r#"
                INSERT INTO borrow_records (book_id, user_id, borrow_date, due_date, status)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id
                "#,
            )
            .bind(book_id)
            .bind(user_id)
            .bind(borrow_date)
            .bind(due_date)
            .bind(i16::from(BorrowStatus::Unreturned))
            .fetch_one(&mut *tx)
            .await
            .map_err(constraint_error)?;
            committed.borrow = Some(new.into_record(id));
        }

        if let Some(new) = changes.new_reservation {
            let NewReserveRecord { book_id, user_id, reserve_date, expire_date } = new.clone();
            let id: i32 = sqlx::query_scalar(
                r#"
                INSERT INTO reserve_records (book_id, user_id, reserve_date, expire_date, status)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id
                "#,
            )
            .bind(book_id)
            .bind(user_id)
            .bind(reserve_date)
            .bind(expire_date)
            .bind(i16::from(ReserveStatus::Waiting))
            .fetch_one(&mut *tx)
            .await
            .map_err(constraint_error)?;
            committed.reservation = Some(new.into_record(id));
        }

        tx.commit().await?;
        Ok(committed)
    }
}
