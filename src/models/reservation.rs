//! Reservation (hold) model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::enums::ReserveStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ReserveRecord {
    pub id: i32,
    pub book_id: i32,
    pub user_id: i32,
    pub reserve_date: DateTime<Utc>,
    pub expire_date: DateTime<Utc>,
    #[sqlx(try_from = "i16")]
    pub status: ReserveStatus,
}

impl ReserveRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expire_date
    }

    /// Queue position key: FIFO by reserve date, ties broken by id
    pub fn queue_key(&self) -> (DateTime<Utc>, i32) {
        (self.reserve_date, self.id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReserveRecord {
    pub book_id: i32,
    pub user_id: i32,
    pub reserve_date: DateTime<Utc>,
    pub expire_date: DateTime<Utc>,
}

impl NewReserveRecord {
    pub fn into_record(self, id: i32) -> ReserveRecord {
        ReserveRecord {
            id,
            book_id: self.book_id,
            user_id: self.user_id,
            reserve_date: self.reserve_date,
            expire_date: self.expire_date,
            status: ReserveStatus::Waiting,
        }
    }
}
