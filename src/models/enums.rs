//! Shared lending enums, stored as SMALLINT codes

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;

/// Generates the `i16` conversions used by the PostgreSQL store.
macro_rules! smallint_codes {
    ($name:ident { $($variant:ident = $code:literal),+ $(,)? }) => {
        impl From<$name> for i16 {
            fn from(v: $name) -> Self {
                v as i16
            }
        }

        impl TryFrom<i16> for $name {
            type Error = AppError;

            fn try_from(v: i16) -> Result<Self, Self::Error> {
                match v {
                    $($code => Ok($name::$variant),)+
                    other => Err(AppError::Internal(format!(
                        "Invalid {} code: {}",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

// ---------------------------------------------------------------------------
// BorrowStatus
// ---------------------------------------------------------------------------

/// Lifecycle of a borrow record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum BorrowStatus {
    Unreturned = 0,
    Returned = 1,
    Overdue = 2,
}

smallint_codes!(BorrowStatus { Unreturned = 0, Returned = 1, Overdue = 2 });

impl std::fmt::Display for BorrowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            BorrowStatus::Unreturned => "unreturned",
            BorrowStatus::Returned => "returned",
            BorrowStatus::Overdue => "overdue",
        };
        write!(f, "{}", label)
    }
}

// ---------------------------------------------------------------------------
// ReserveStatus
// ---------------------------------------------------------------------------

/// Lifecycle of a reservation (hold)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum ReserveStatus {
    Waiting = 0,
    Reserved = 1,
    Cancelled = 2,
    Completed = 3,
}

smallint_codes!(ReserveStatus { Waiting = 0, Reserved = 1, Cancelled = 2, Completed = 3 });

impl ReserveStatus {
    /// Waiting and reserved holds still claim a copy
    pub fn is_active(self) -> bool {
        matches!(self, ReserveStatus::Waiting | ReserveStatus::Reserved)
    }
}

impl std::fmt::Display for ReserveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ReserveStatus::Waiting => "waiting",
            ReserveStatus::Reserved => "reserved",
            ReserveStatus::Cancelled => "cancelled",
            ReserveStatus::Completed => "completed",
        };
        write!(f, "{}", label)
    }
}

// ---------------------------------------------------------------------------
// UserStatus
// ---------------------------------------------------------------------------

/// Account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum UserStatus {
    Normal = 0,
    Frozen = 1,
    Deleted = 2,
}

smallint_codes!(UserStatus { Normal = 0, Frozen = 1, Deleted = 2 });

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            UserStatus::Normal => "normal",
            UserStatus::Frozen => "frozen",
            UserStatus::Deleted => "deleted",
        };
        write!(f, "{}", label)
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Caller role, as established by the authentication layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum Role {
    Reader = 0,
    Admin = 1,
}

smallint_codes!(Role { Reader = 0, Admin = 1 });
