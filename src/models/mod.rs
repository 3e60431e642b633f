//! Data models for Libris

pub mod book;
pub mod borrow;
pub mod enums;
pub mod reservation;
pub mod user;

// Re-export commonly used types
pub use book::{Book, StockAdjustment, StockDelta};
pub use borrow::{BorrowRecord, FinePayment, NewBorrowRecord};
pub use enums::{BorrowStatus, ReserveStatus, Role, UserStatus};
pub use reservation::{NewReserveRecord, ReserveRecord};
pub use user::{Actor, User, UserClaims};
