//! Repository layer: the entity store consumed by the lending services

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::{AppError, AppResult},
    models::{
        Book, BorrowRecord, BorrowStatus, NewBorrowRecord, NewReserveRecord, ReserveRecord,
        ReserveStatus, StockDelta, User,
    },
};

pub use memory::MemoryStore;
pub use postgres::PgLendingStore;

/// Predicate over borrow records. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BorrowFilter {
    pub user_id: Option<i32>,
    pub book_id: Option<i32>,
    pub statuses: Vec<BorrowStatus>,
    /// Only records whose copy has not been handed back
    pub out_only: bool,
    pub due_before: Option<DateTime<Utc>>,
}

impl BorrowFilter {
    pub fn user(mut self, user_id: i32) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn book(mut self, book_id: i32) -> Self {
        self.book_id = Some(book_id);
        self
    }

    pub fn status(mut self, status: BorrowStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn out_only(mut self) -> Self {
        self.out_only = true;
        self
    }

    pub fn due_before(mut self, at: DateTime<Utc>) -> Self {
        self.due_before = Some(at);
        self
    }

    pub fn matches(&self, record: &BorrowRecord) -> bool {
        self.user_id.map_or(true, |id| record.user_id == id)
            && self.book_id.map_or(true, |id| record.book_id == id)
            && (self.statuses.is_empty() || self.statuses.contains(&record.status))
            && (!self.out_only || record.is_out())
            && self.due_before.map_or(true, |at| record.due_date < at)
    }
}

/// Predicate over reservations. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReserveFilter {
    pub user_id: Option<i32>,
    pub book_id: Option<i32>,
    pub statuses: Vec<ReserveStatus>,
    /// Inclusive lower bound on the expire date
    pub expire_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the expire date
    pub expire_until: Option<DateTime<Utc>>,
    /// Exclusive upper bound on the expire date
    pub expire_before: Option<DateTime<Utc>>,
}

impl ReserveFilter {
    pub fn user(mut self, user_id: i32) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn book(mut self, book_id: i32) -> Self {
        self.book_id = Some(book_id);
        self
    }

    pub fn status(mut self, status: ReserveStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn active(self) -> Self {
        self.status(ReserveStatus::Waiting).status(ReserveStatus::Reserved)
    }

    pub fn expire_from(mut self, at: DateTime<Utc>) -> Self {
        self.expire_from = Some(at);
        self
    }

    pub fn expire_until(mut self, at: DateTime<Utc>) -> Self {
        self.expire_until = Some(at);
        self
    }

    pub fn expire_before(mut self, at: DateTime<Utc>) -> Self {
        self.expire_before = Some(at);
        self
    }

    pub fn matches(&self, record: &ReserveRecord) -> bool {
        self.user_id.map_or(true, |id| record.user_id == id)
            && self.book_id.map_or(true, |id| record.book_id == id)
            && (self.statuses.is_empty() || self.statuses.contains(&record.status))
            && self.expire_from.map_or(true, |at| record.expire_date >= at)
            && self.expire_until.map_or(true, |at| record.expire_date <= at)
            && self.expire_before.map_or(true, |at| record.expire_date < at)
    }
}

/// Everything one lending operation writes. Stores apply it all or nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LendingChanges {
    pub stock: Vec<StockDelta>,
    pub users: Vec<User>,
    pub borrows: Vec<BorrowRecord>,
    pub reservations: Vec<ReserveRecord>,
    pub new_borrow: Option<NewBorrowRecord>,
    pub new_reservation: Option<NewReserveRecord>,
}

impl LendingChanges {
    pub fn is_empty(&self) -> bool {
        self.stock.is_empty()
            && self.users.is_empty()
            && self.borrows.is_empty()
            && self.reservations.is_empty()
            && self.new_borrow.is_none()
            && self.new_reservation.is_none()
    }
}

/// Counters after applying `delta`, or the stock fault it would cause
pub(crate) fn checked_stock(
    book_id: i32,
    total: i32,
    available: i32,
    delta: &StockDelta,
) -> AppResult<(i32, i32)> {
    let total = total + delta.total;
    let available = available + delta.available;
    if total < 0 {
        return Err(AppError::InsufficientStock(format!(
            "Book {} total stock would become {}",
            book_id, total
        )));
    }
    if available < 0 {
        return Err(AppError::OutOfStock(format!(
            "Book {} has no copy available",
            book_id
        )));
    }
    if available > total {
        return Err(AppError::StockOverflow(format!(
            "Book {} available stock {} would exceed total {}",
            book_id, available, total
        )));
    }
    Ok((total, available))
}

/// Records created by a commit, with their assigned ids
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Committed {
    pub borrow: Option<BorrowRecord>,
    pub reservation: Option<ReserveRecord>,
}

/// Keyed entity store for books, users, borrow records and reservations.
///
/// Query results are ordered by id, except reservations which come back in
/// queue order (reserve date, then id).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LendingStore: Send + Sync {
    async fn get_book(&self, id: i32) -> AppResult<Option<Book>>;

    async fn get_user(&self, id: i32) -> AppResult<Option<User>>;

    async fn get_borrow(&self, id: i32) -> AppResult<Option<BorrowRecord>>;

    async fn get_reservation(&self, id: i32) -> AppResult<Option<ReserveRecord>>;

    async fn find_borrows(&self, filter: BorrowFilter) -> AppResult<Vec<BorrowRecord>>;

    async fn find_reservations(&self, filter: ReserveFilter) -> AppResult<Vec<ReserveRecord>>;

    /// Apply a unit of work atomically
    async fn commit(&self, changes: LendingChanges) -> AppResult<Committed>;
}
