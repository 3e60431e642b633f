//! In-memory lending store
//!
//! Applies the same constraints as the PostgreSQL schema (stock bounds, one
//! copy out per user and book, one active hold per user and book) so the
//! services behave identically on both.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{checked_stock, BorrowFilter, Committed, LendingChanges, LendingStore, ReserveFilter};
use crate::{
    error::{AppError, AppResult},
    models::{
        user::MAX_CREDIT_SCORE, Book, BorrowRecord, ReserveRecord, Role, StockDelta, User,
        UserStatus,
    },
};

#[derive(Default)]
struct Tables {
    books: BTreeMap<i32, Book>,
    users: BTreeMap<i32, User>,
    borrows: BTreeMap<i32, BorrowRecord>,
    reservations: BTreeMap<i32, ReserveRecord>,
    last_book_id: i32,
    last_user_id: i32,
    last_borrow_id: i32,
    last_reservation_id: i32,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a title with all copies on the shelf
    pub async fn insert_book(&self, title: &str, total_stock: i32) -> Book {
        let mut tables = self.tables.write().await;
        tables.last_book_id += 1;
        let book = Book {
            id: tables.last_book_id,
            title: title.to_string(),
            total_stock,
            available_stock: total_stock,
            updated_at: Utc::now(),
        };
        tables.books.insert(book.id, book.clone());
        book
    }

    /// Register an account in normal standing with full credit
    pub async fn insert_user(&self, username: &str, role: Role) -> User {
        let mut tables = self.tables.write().await;
        tables.last_user_id += 1;
        let user = User {
            id: tables.last_user_id,
            username: username.to_string(),
            role,
            status: UserStatus::Normal,
            credit_score: MAX_CREDIT_SCORE,
        };
        tables.users.insert(user.id, user.clone());
        user
    }

    pub async fn borrows(&self) -> Vec<BorrowRecord> {
        self.tables.read().await.borrows.values().cloned().collect()
    }
}

fn apply_delta(book: &mut Book, delta: &StockDelta) -> AppResult<()> {
    let (total, available) = checked_stock(book.id, book.total_stock, book.available_stock, delta)?;
    book.total_stock = total;
    book.available_stock = available;
    book.updated_at = Utc::now();
    Ok(())
}

impl Tables {
    /// Check every change against a scratch copy, then swap it in
    fn apply(&mut self, changes: LendingChanges) -> AppResult<Committed> {
        let mut books = self.books.clone();
        for delta in &changes.stock {
            let book = books
                .get_mut(&delta.book_id)
                .ok_or_else(|| AppError::NotFound(format!("Book {} not found", delta.book_id)))?;
            apply_delta(book, delta)?;
        }

        for user in &changes.users {
            if !self.users.contains_key(&user.id) {
                return Err(AppError::NotFound(format!("User {} not found", user.id)));
            }
            if !(0..=MAX_CREDIT_SCORE).contains(&user.credit_score) {
                return Err(AppError::Internal(format!(
                    "Credit score {} out of range for user {}",
                    user.credit_score, user.id
                )));
            }
        }
        for record in &changes.borrows {
            if !self.borrows.contains_key(&record.id) {
                return Err(AppError::NotFound(format!("Borrow record {} not found", record.id)));
            }
        }
        for record in &changes.reservations {
            if !self.reservations.contains_key(&record.id) {
                return Err(AppError::NotFound(format!("Reservation {} not found", record.id)));
            }
        }

        let mut borrows = self.borrows.clone();
        for record in &changes.borrows {
            borrows.insert(record.id, record.clone());
        }
        let mut reservations = self.reservations.clone();
        for record in &changes.reservations {
            reservations.insert(record.id, record.clone());
        }

        let mut committed = Committed::default();

        if let Some(new) = changes.new_borrow {
            let taken = borrows
                .values()
                .any(|r| r.user_id == new.user_id && r.book_id == new.book_id && r.is_out());
            if taken {
                return Err(AppError::DuplicateBorrow(format!(
                    "User {} already has book {} out",
                    new.user_id, new.book_id
                )));
            }
            let record = new.into_record(self.last_borrow_id + 1);
            borrows.insert(record.id, record.clone());
            committed.borrow = Some(record);
        }

        if let Some(new) = changes.new_reservation {
            let taken = reservations.values().any(|r| {
                r.user_id == new.user_id && r.book_id == new.book_id && r.status.is_active()
            });
            if taken {
                return Err(AppError::DuplicateReservation(format!(
                    "User {} already holds book {}",
                    new.user_id, new.book_id
                )));
            }
            let record = new.into_record(self.last_reservation_id + 1);
            reservations.insert(record.id, record.clone());
            committed.reservation = Some(record);
        }

        for user in changes.users {
            self.users.insert(user.id, user);
        }
        if committed.borrow.is_some() {
            self.last_borrow_id += 1;
        }
        if committed.reservation.is_some() {
            self.last_reservation_id += 1;
        }
        self.books = books;
        self.borrows = borrows;
        self.reservations = reservations;

        Ok(committed)
    }
}

#[async_trait]
impl LendingStore for MemoryStore {
    async fn get_book(&self, id: i32) -> AppResult<Option<Book>> {
        Ok(self.tables.read().await.books.get(&id).cloned())
    }

    async fn get_user(&self, id: i32) -> AppResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn get_borrow(&self, id: i32) -> AppResult<Option<BorrowRecord>> {
        Ok(self.tables.read().await.borrows.get(&id).cloned())
    }

    async fn get_reservation(&self, id: i32) -> AppResult<Option<ReserveRecord>> {
        Ok(self.tables.read().await.reservations.get(&id).cloned())
    }

    async fn find_borrows(&self, filter: BorrowFilter) -> AppResult<Vec<BorrowRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .borrows
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn find_reservations(&self, filter: ReserveFilter) -> AppResult<Vec<ReserveRecord>> {
        let tables = self.tables.read().await;
        let mut found: Vec<ReserveRecord> = tables
            .reservations
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        found.sort_by_key(|r| r.queue_key());
        Ok(found)
    }

    async fn commit(&self, changes: LendingChanges) -> AppResult<Committed> {
        if changes.is_empty() {
            return Ok(Committed::default());
        }
        self.tables.write().await.apply(changes)
    }
}
