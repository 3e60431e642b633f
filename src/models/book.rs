//! Book stock model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// A catalog title with its copy counters.
///
/// `available_stock` is only ever changed through the stock ledger
/// (`services::ledger`), which keeps `0 <= available_stock <= total_stock`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub total_stock: i32,
    pub available_stock: i32,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Copies currently lent out
    pub fn on_loan(&self) -> i32 {
        self.total_stock - self.available_stock
    }
}

/// Counter change produced by the stock ledger and applied by the store.
///
/// Stores apply deltas relative to the stored counters and reject any that
/// would break the stock bounds, so two writers can never both consume the
/// last copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockDelta {
    pub book_id: i32,
    pub total: i32,
    pub available: i32,
}

/// One entry of a stock adjustment batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StockAdjustment {
    pub book_id: i32,
    pub delta: i32,
}
