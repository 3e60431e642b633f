//! Stock ledger: the only code that moves a book's copy counters
//!
//! Each counter function takes the book's [`BookRegion`], so a counter can
//! only be read, checked and changed by the task holding that book.

use std::collections::HashMap;

use crate::{
    error::{AppError, AppResult},
    models::{Book, StockAdjustment, StockDelta},
    repository::LendingChanges,
};

use super::{locks::BookRegion, LendingContext};

fn ensure_region(region: &BookRegion, book: &Book) -> AppResult<()> {
    if region.book_id() != book.id {
        return Err(AppError::Internal(format!(
            "Stock change on book {} attempted under the region of book {}",
            book.id,
            region.book_id()
        )));
    }
    Ok(())
}

/// Take one copy off the shelf
pub fn reserve_unit(region: &BookRegion, book: &mut Book) -> AppResult<StockDelta> {
    ensure_region(region, book)?;
    if book.available_stock <= 0 {
        return Err(AppError::OutOfStock(format!(
            "No copy of book {} is available",
            book.id
        )));
    }
    book.available_stock -= 1;
    Ok(StockDelta { book_id: book.id, total: 0, available: -1 })
}

/// Put one copy back on the shelf
pub fn release_unit(region: &BookRegion, book: &mut Book) -> AppResult<StockDelta> {
    ensure_region(region, book)?;
    if book.available_stock >= book.total_stock {
        return Err(AppError::StockOverflow(format!(
            "Book {} already has all {} copies on the shelf",
            book.id, book.total_stock
        )));
    }
    book.available_stock += 1;
    Ok(StockDelta { book_id: book.id, total: 0, available: 1 })
}

/// Add or write off copies; total and available move together
pub fn adjust_total(region: &BookRegion, book: &mut Book, delta: i32) -> AppResult<StockDelta> {
    ensure_region(region, book)?;
    if delta == 0 {
        return Err(AppError::Validation("Stock adjustment cannot be zero".to_string()));
    }
    let total = book.total_stock + delta;
    let available = book.available_stock + delta;
    if total < 0 {
        return Err(AppError::InsufficientStock(format!(
            "Book {} has {} copies, cannot remove {}",
            book.id,
            book.total_stock,
            -delta
        )));
    }
    if available < 0 {
        return Err(AppError::InsufficientStock(format!(
            "Book {} has {} copies on loan, only {} can be removed",
            book.id,
            book.on_loan(),
            book.available_stock
        )));
    }
    book.total_stock = total;
    book.available_stock = available;
    Ok(StockDelta { book_id: book.id, total: delta, available: delta })
}

/// Administrative stock adjustments
#[derive(Clone)]
pub struct StockLedger {
    ctx: LendingContext,
}

impl StockLedger {
    pub fn new(ctx: LendingContext) -> Self {
        Self { ctx }
    }

    pub async fn get_book(&self, book_id: i32) -> AppResult<Book> {
        self.ctx.load_book(book_id).await
    }

    /// Change a book's copy count by `delta`
    pub async fn adjust_stock(&self, book_id: i32, delta: i32) -> AppResult<Book> {
        let region = self.ctx.regions.book(book_id).await;
        let mut book = self.ctx.load_book(book_id).await?;
        let change = adjust_total(&region, &mut book, delta)?;

        self.ctx
            .store
            .commit(LendingChanges {
                stock: vec![change],
                ..Default::default()
            })
            .await?;

        tracing::info!(
            book_id,
            delta,
            total = book.total_stock,
            available = book.available_stock,
            "Stock adjusted"
        );
        Ok(book)
    }

    /// Apply several adjustments all or nothing
    pub async fn batch_adjust_stock(&self, adjustments: &[StockAdjustment]) -> AppResult<Vec<Book>> {
        if adjustments.is_empty() {
            return Err(AppError::Validation("Adjustment list cannot be empty".to_string()));
        }

        let ids: Vec<i32> = adjustments.iter().map(|a| a.book_id).collect();
        let regions = self.ctx.regions.books(&ids).await;

        let mut books: HashMap<i32, Book> = HashMap::new();
        for region in &regions {
            let book = self.ctx.load_book(region.book_id()).await?;
            books.insert(book.id, book);
        }

        let mut changes = LendingChanges::default();
        for adjustment in adjustments {
            let region = regions
                .iter()
                .find(|r| r.book_id() == adjustment.book_id)
                .ok_or_else(|| AppError::Internal("Missing book region".to_string()))?;
            let book = books
                .get_mut(&adjustment.book_id)
                .ok_or_else(|| AppError::Internal("Missing locked book".to_string()))?;
            changes.stock.push(adjust_total(region, book, adjustment.delta)?);
        }

        self.ctx.store.commit(changes).await?;

        tracing::info!(books = regions.len(), "Batch stock adjustment applied");
        Ok(regions
            .iter()
            .filter_map(|r| books.remove(&r.book_id()))
            .collect())
    }
}
