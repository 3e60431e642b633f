//! Reservation queue

use crate::{
    error::{AppError, AppResult},
    models::{Actor, NewReserveRecord, ReserveRecord, ReserveStatus},
    repository::{LendingChanges, LendingStore, ReserveFilter},
};

use super::{clock, gate, locks::BookRegion, LendingContext};

/// Who may borrow a book right now
#[derive(Debug, Clone, PartialEq)]
pub enum BorrowGate {
    /// No confirmed hold: first come, first served
    Open,
    /// The oldest confirmed hold; only its owner may borrow
    HeldFor(ReserveRecord),
}

impl BorrowGate {
    /// Pick the head of the queue among confirmed holds
    pub fn from_holds(holds: impl IntoIterator<Item = ReserveRecord>) -> Self {
        holds
            .into_iter()
            .filter(|h| h.status == ReserveStatus::Reserved)
            .min_by_key(ReserveRecord::queue_key)
            .map_or(BorrowGate::Open, BorrowGate::HeldFor)
    }

    /// Load the gate for the book whose region the caller holds
    pub async fn load(store: &dyn LendingStore, region: &BookRegion) -> AppResult<Self> {
        let holds = store
            .find_reservations(
                ReserveFilter::default()
                    .book(region.book_id())
                    .status(ReserveStatus::Reserved),
            )
            .await?;
        Ok(Self::from_holds(holds))
    }

    /// Admit `user_id`, returning the hold the loan will complete
    pub fn admit(self, user_id: i32) -> AppResult<Option<ReserveRecord>> {
        match self {
            BorrowGate::Open => Ok(None),
            BorrowGate::HeldFor(hold) if hold.user_id == user_id => Ok(Some(hold)),
            BorrowGate::HeldFor(hold) => Err(AppError::ReservedByOther(format!(
                "Book {} is held for another reader (reservation {})",
                hold.book_id, hold.id
            ))),
        }
    }
}

#[derive(Clone)]
pub struct ReservationService {
    ctx: LendingContext,
}

impl ReservationService {
    pub fn new(ctx: LendingContext) -> Self {
        Self { ctx }
    }

    /// Place a hold on a book
    pub async fn reserve(&self, user_id: i32, book_id: i32, valid_days: i64) -> AppResult<ReserveRecord> {
        if valid_days <= 0 {
            return Err(AppError::Validation("Reservation validity must be at least one day".to_string()));
        }

        let _region = self.ctx.regions.book(book_id).await;

        let user = self.ctx.load_user(user_id).await?;
        gate::ensure_can_transact(&user)?;
        self.ctx.load_book(book_id).await?;

        let active = self
            .ctx
            .store
            .find_reservations(ReserveFilter::default().user(user_id).book(book_id).active())
            .await?;
        if let Some(existing) = active.first() {
            return Err(AppError::DuplicateReservation(format!(
                "User {} already has reservation {} for book {}",
                user_id, existing.id, book_id
            )));
        }

        let now = self.ctx.clock.now();
        let expire_date = clock::days_after(now, valid_days)?;
        let committed = self
            .ctx
            .store
            .commit(LendingChanges {
                new_reservation: Some(NewReserveRecord {
                    book_id,
                    user_id,
                    reserve_date: now,
                    expire_date,
                }),
                ..Default::default()
            })
            .await?;

        let record = committed
            .reservation
            .ok_or_else(|| AppError::Internal("Reservation was not created".to_string()))?;

        tracing::info!(reserve_id = record.id, user_id, book_id, "Reservation placed");
        Ok(record)
    }

    /// Promote a waiting hold to reserved (admin)
    pub async fn confirm(&self, reserve_id: i32) -> AppResult<()> {
        let book_id = self.ctx.load_reservation(reserve_id).await?.book_id;
        let _region = self.ctx.regions.book(book_id).await;

        let mut record = self.ctx.load_reservation(reserve_id).await?;
        if record.status != ReserveStatus::Waiting {
            return Err(AppError::NotWaiting(format!(
                "Reservation {} is {}",
                reserve_id, record.status
            )));
        }
        if record.is_expired_at(self.ctx.clock.now()) {
            return Err(AppError::ReservationExpired(format!(
                "Reservation {} expired at {}",
                reserve_id, record.expire_date
            )));
        }
        let book = self.ctx.load_book(book_id).await?;
        if book.available_stock <= 0 {
            return Err(AppError::OutOfStock(format!(
                "No copy of book {} is back on the shelf yet",
                book_id
            )));
        }

        record.status = ReserveStatus::Reserved;
        self.ctx
            .store
            .commit(LendingChanges {
                reservations: vec![record],
                ..Default::default()
            })
            .await?;

        tracing::info!(reserve_id, book_id, "Reservation confirmed");
        Ok(())
    }

    /// Cancel a hold (owner or admin)
    pub async fn cancel(&self, reserve_id: i32, actor: Actor) -> AppResult<()> {
        let book_id = self.ctx.load_reservation(reserve_id).await?.book_id;
        let _region = self.ctx.regions.book(book_id).await;

        let mut record = self.ctx.load_reservation(reserve_id).await?;
        if record.user_id != actor.user_id && !actor.is_admin() {
            return Err(AppError::Unauthorized(format!(
                "Reservation {} belongs to another user",
                reserve_id
            )));
        }
        match record.status {
            ReserveStatus::Cancelled => {
                return Err(AppError::AlreadyCancelled(format!(
                    "Reservation {} is already cancelled",
                    reserve_id
                )))
            }
            ReserveStatus::Completed => {
                return Err(AppError::ReservationCompleted(format!(
                    "Reservation {} was fulfilled by a loan",
                    reserve_id
                )))
            }
            ReserveStatus::Waiting | ReserveStatus::Reserved => {}
        }

        record.status = ReserveStatus::Cancelled;
        self.ctx
            .store
            .commit(LendingChanges {
                reservations: vec![record],
                ..Default::default()
            })
            .await?;

        tracing::info!(reserve_id, book_id, by = actor.user_id, "Reservation cancelled");
        Ok(())
    }

    pub async fn get_reservation(&self, reserve_id: i32) -> AppResult<ReserveRecord> {
        self.ctx.load_reservation(reserve_id).await
    }

    pub async fn user_reservations(
        &self,
        user_id: i32,
        status: Option<ReserveStatus>,
    ) -> AppResult<Vec<ReserveRecord>> {
        let mut filter = ReserveFilter::default().user(user_id);
        if let Some(status) = status {
            filter = filter.status(status);
        }
        self.ctx.store.find_reservations(filter).await
    }

    /// A book's holds in queue order
    pub async fn book_queue(
        &self,
        book_id: i32,
        status: Option<ReserveStatus>,
    ) -> AppResult<Vec<ReserveRecord>> {
        let mut filter = ReserveFilter::default().book(book_id);
        if let Some(status) = status {
            filter = filter.status(status);
        }
        self.ctx.store.find_reservations(filter).await
    }

    /// Waiting and past its expire date
    pub async fn is_expired(&self, reserve_id: i32) -> AppResult<bool> {
        let record = self.ctx.load_reservation(reserve_id).await?;
        Ok(record.status == ReserveStatus::Waiting && record.is_expired_at(self.ctx.clock.now()))
    }
}
