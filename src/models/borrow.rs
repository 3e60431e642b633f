//! Borrow record model and related types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::enums::{BorrowStatus, UserStatus};

/// A loan of one copy of a book to one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BorrowRecord {
    pub id: i32,
    pub book_id: i32,
    pub user_id: i32,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    #[sqlx(try_from = "i16")]
    pub status: BorrowStatus,
    pub renew_count: i32,
    /// Overdue days as of the last return or sweep
    pub overdue_days: i64,
    #[schema(value_type = String)]
    pub fine_amount: Decimal,
    /// Overdue days already charged against the borrower's credit score
    pub penalized_days: i64,
    pub fine_paid_at: Option<DateTime<Utc>>,
}

impl BorrowRecord {
    /// The copy is still with the borrower
    pub fn is_out(&self) -> bool {
        self.return_date.is_none()
    }

    /// Overdue with the fine not settled yet
    pub fn has_unpaid_fine(&self) -> bool {
        self.status == BorrowStatus::Overdue && self.fine_paid_at.is_none()
    }
}

/// Borrow record to be inserted; the store assigns the id
#[derive(Debug, Clone, PartialEq)]
pub struct NewBorrowRecord {
    pub book_id: i32,
    pub user_id: i32,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}

impl NewBorrowRecord {
    pub fn into_record(self, id: i32) -> BorrowRecord {
        BorrowRecord {
            id,
            book_id: self.book_id,
            user_id: self.user_id,
            borrow_date: self.borrow_date,
            due_date: self.due_date,
            return_date: None,
            status: BorrowStatus::Unreturned,
            renew_count: 0,
            overdue_days: 0,
            fine_amount: Decimal::ZERO,
            penalized_days: 0,
            fine_paid_at: None,
        }
    }
}

/// Confirmation of a settled fine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FinePayment {
    pub record_id: i32,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub user_status: UserStatus,
    pub message: String,
}
