//! Error types for Libris server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Stable error codes returned to API clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NotFound = 4,
    BadValue = 5,
    Duplicate = 6,
    AccountFrozen = 10,
    DuplicateBorrow = 11,
    DuplicateReservation = 12,
    OutOfStock = 13,
    ReservedByOther = 14,
    AlreadyReturned = 15,
    NotRenewable = 16,
    RenewLimitExceeded = 17,
    NotWaiting = 18,
    ReservationExpired = 19,
    AlreadyCancelled = 20,
    ReservationCompleted = 21,
    Unauthorized = 22,
    NotOverdue = 23,
    AlreadyPaid = 24,
    CopyNotReturned = 25,
    StockOverflow = 30,
    InsufficientStock = 31,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    // Lending preconditions
    #[error("Account is frozen: {0}")]
    AccountFrozen(String),

    #[error("Duplicate borrow: {0}")]
    DuplicateBorrow(String),

    #[error("Duplicate reservation: {0}")]
    DuplicateReservation(String),

    #[error("Out of stock: {0}")]
    OutOfStock(String),

    #[error("Reserved by another user: {0}")]
    ReservedByOther(String),

    #[error("Already returned: {0}")]
    AlreadyReturned(String),

    #[error("Not renewable: {0}")]
    NotRenewable(String),

    #[error("Renew limit exceeded: {0}")]
    RenewLimitExceeded(String),

    #[error("Reservation is not waiting: {0}")]
    NotWaiting(String),

    #[error("Reservation expired: {0}")]
    ReservationExpired(String),

    #[error("Reservation already cancelled: {0}")]
    AlreadyCancelled(String),

    #[error("Reservation already completed: {0}")]
    ReservationCompleted(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not overdue: {0}")]
    NotOverdue(String),

    #[error("Fine already paid: {0}")]
    AlreadyPaid(String),

    #[error("Copy not returned: {0}")]
    CopyNotReturned(String),

    // Data integrity faults
    #[error("Stock overflow: {0}")]
    StockOverflow(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // Request layer
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::AccountFrozen(_) => ErrorCode::AccountFrozen,
            AppError::DuplicateBorrow(_) => ErrorCode::DuplicateBorrow,
            AppError::DuplicateReservation(_) => ErrorCode::DuplicateReservation,
            AppError::OutOfStock(_) => ErrorCode::OutOfStock,
            AppError::ReservedByOther(_) => ErrorCode::ReservedByOther,
            AppError::AlreadyReturned(_) => ErrorCode::AlreadyReturned,
            AppError::NotRenewable(_) => ErrorCode::NotRenewable,
            AppError::RenewLimitExceeded(_) => ErrorCode::RenewLimitExceeded,
            AppError::NotWaiting(_) => ErrorCode::NotWaiting,
            AppError::ReservationExpired(_) => ErrorCode::ReservationExpired,
            AppError::AlreadyCancelled(_) => ErrorCode::AlreadyCancelled,
            AppError::ReservationCompleted(_) => ErrorCode::ReservationCompleted,
            AppError::Unauthorized(_) => ErrorCode::Unauthorized,
            AppError::NotOverdue(_) => ErrorCode::NotOverdue,
            AppError::AlreadyPaid(_) => ErrorCode::AlreadyPaid,
            AppError::CopyNotReturned(_) => ErrorCode::CopyNotReturned,
            AppError::StockOverflow(_) => ErrorCode::StockOverflow,
            AppError::InsufficientStock(_) => ErrorCode::InsufficientStock,
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::Authentication(_) | AppError::Authorization(_) => ErrorCode::NotAuthorized,
            AppError::Validation(_) => ErrorCode::BadValue,
            AppError::Conflict(_) => ErrorCode::Duplicate,
            AppError::Database(_) => ErrorCode::DbFailure,
            AppError::Internal(_) => ErrorCode::Failure,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Authorization(_) | AppError::Unauthorized(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::AccountFrozen(_)
            | AppError::RenewLimitExceeded(_)
            | AppError::NotRenewable(_)
            | AppError::ReservationExpired(_)
            | AppError::NotOverdue(_)
            | AppError::CopyNotReturned(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::DuplicateBorrow(_)
            | AppError::DuplicateReservation(_)
            | AppError::OutOfStock(_)
            | AppError::ReservedByOther(_)
            | AppError::AlreadyReturned(_)
            | AppError::NotWaiting(_)
            | AppError::AlreadyCancelled(_)
            | AppError::ReservationCompleted(_)
            | AppError::AlreadyPaid(_)
            | AppError::InsufficientStock(_)
            | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::StockOverflow(_) | AppError::Database(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::StockOverflow(msg) => {
                tracing::error!("Stock bookkeeping fault: {}", msg);
                self.to_string()
            }
            _ => self.to_string(),
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
