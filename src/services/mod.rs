//! Lending services

pub mod accounts;
pub mod borrows;
pub mod clock;
pub mod fines;
pub mod gate;
pub mod ledger;
pub mod locks;
pub mod reservations;
pub mod sweeps;

use std::sync::Arc;

use crate::{
    config::LendingConfig,
    error::{AppError, AppResult},
    models::{Book, BorrowRecord, BorrowStatus, ReserveRecord, User},
    repository::{BorrowFilter, LendingStore},
};

use self::{clock::Clock, locks::Regions};

/// Collaborators shared by every lending service
#[derive(Clone)]
pub struct LendingContext {
    pub store: Arc<dyn LendingStore>,
    pub clock: Arc<dyn Clock>,
    pub regions: Arc<Regions>,
    pub policy: LendingConfig,
}

impl LendingContext {
    pub fn new(store: Arc<dyn LendingStore>, clock: Arc<dyn Clock>, policy: LendingConfig) -> Self {
        Self {
            store,
            clock,
            regions: Arc::new(Regions::new()),
            policy,
        }
    }

    pub async fn load_book(&self, id: i32) -> AppResult<Book> {
        self.store
            .get_book(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    pub async fn load_user(&self, id: i32) -> AppResult<User> {
        self.store
            .get_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    pub async fn load_borrow(&self, id: i32) -> AppResult<BorrowRecord> {
        self.store
            .get_borrow(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrow record with id {} not found", id)))
    }

    pub async fn load_reservation(&self, id: i32) -> AppResult<ReserveRecord> {
        self.store
            .get_reservation(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Reservation with id {} not found", id)))
    }

    /// Whether the user has an unpaid fine old enough to keep the account
    /// frozen, ignoring record `except`
    pub async fn has_freezing_fine(&self, user_id: i32, except: Option<i32>) -> AppResult<bool> {
        let threshold = self.policy.freeze_threshold_days;
        let overdue = self
            .store
            .find_borrows(BorrowFilter::default().user(user_id).status(BorrowStatus::Overdue))
            .await?;
        Ok(overdue.iter().any(|r| {
            Some(r.id) != except && r.has_unpaid_fine() && r.overdue_days >= threshold
        }))
    }
}

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub borrows: borrows::BorrowService,
    pub reservations: reservations::ReservationService,
    pub sweeps: sweeps::SweepService,
    pub ledger: ledger::StockLedger,
    pub accounts: accounts::AccountService,
}

impl Services {
    /// Create all services over one store, clock and set of regions
    pub fn new(store: Arc<dyn LendingStore>, clock: Arc<dyn Clock>, policy: LendingConfig) -> Self {
        let ctx = LendingContext::new(store, clock, policy);
        Self {
            borrows: borrows::BorrowService::new(ctx.clone()),
            reservations: reservations::ReservationService::new(ctx.clone()),
            sweeps: sweeps::SweepService::new(ctx.clone()),
            ledger: ledger::StockLedger::new(ctx.clone()),
            accounts: accounts::AccountService::new(ctx),
        }
    }
}
