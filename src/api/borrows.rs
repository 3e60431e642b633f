//! Borrow endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    error::AppResult,
    models::{BorrowRecord, BorrowStatus, FinePayment},
    AppState,
};

use super::AuthenticatedUser;

/// Borrow request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BorrowRequest {
    /// Borrower; defaults to the caller
    pub user_id: Option<i32>,
    pub book_id: i32,
    /// Loan duration in days
    #[validate(range(min = 1, max = 90, message = "Loan duration must be between 1 and 90 days"))]
    pub days: i64,
}

/// Renew request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RenewRequest {
    #[validate(range(min = 1, max = 90, message = "Renewal must be between 1 and 90 days"))]
    pub days: i64,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BorrowQuery {
    /// unreturned, returned or overdue
    pub status: Option<BorrowStatus>,
}

/// Return response with the settled record
#[derive(Serialize, ToSchema)]
pub struct ReturnResponse {
    pub record: BorrowRecord,
    pub message: String,
}

/// Borrow a book
#[utoipa::path(
    post,
    path = "/borrows",
    tag = "borrows",
    security(("bearer_auth" = [])),
    request_body = BorrowRequest,
    responses(
        (status = 201, description = "Book borrowed", body = BorrowRecord),
        (status = 400, description = "Invalid request"),
        (status = 403, description = "Borrowing for another user"),
        (status = 404, description = "User or book not found"),
        (status = 409, description = "Out of stock, reserved by another user or already borrowed"),
        (status = 422, description = "Account frozen")
    )
)]
pub async fn borrow_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<BorrowRequest>,
) -> AppResult<(StatusCode, Json<BorrowRecord>)> {
    request.validate()?;
    let user_id = request.user_id.unwrap_or(claims.user_id);
    claims.require_self_or_admin(user_id)?;

    let record = state
        .services
        .borrows
        .borrow(user_id, request.book_id, request.days)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Get one borrow record
#[utoipa::path(
    get,
    path = "/borrows/{id}",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Borrow record ID")),
    responses(
        (status = 200, description = "Borrow record", body = BorrowRecord),
        (status = 404, description = "Record not found")
    )
)]
pub async fn get_borrow(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<BorrowRecord>> {
    let record = state.services.borrows.get_record(id).await?;
    claims.require_self_or_admin(record.user_id)?;
    Ok(Json(record))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/borrows/{id}/return",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Borrow record ID")),
    responses(
        (status = 200, description = "Book returned", body = ReturnResponse),
        (status = 404, description = "Record not found"),
        (status = 409, description = "Already returned")
    )
)]
pub async fn return_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ReturnResponse>> {
    let owner = state.services.borrows.get_record(id).await?.user_id;
    claims.require_self_or_admin(owner)?;

    let record = state.services.borrows.return_book(id).await?;
    let message = if record.overdue_days > 0 {
        format!(
            "Returned {} days late, fine {}",
            record.overdue_days, record.fine_amount
        )
    } else {
        "Returned on time".to_string()
    };
    Ok(Json(ReturnResponse { record, message }))
}

/// Extend a loan
#[utoipa::path(
    post,
    path = "/borrows/{id}/renew",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Borrow record ID")),
    request_body = RenewRequest,
    responses(
        (status = 200, description = "Loan renewed", body = BorrowRecord),
        (status = 404, description = "Record not found"),
        (status = 422, description = "Not renewable or renewal limit reached")
    )
)]
pub async fn renew_borrow(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<RenewRequest>,
) -> AppResult<Json<BorrowRecord>> {
    request.validate()?;
    let owner = state.services.borrows.get_record(id).await?.user_id;
    claims.require_self_or_admin(owner)?;

    let record = state.services.borrows.renew(id, request.days).await?;
    Ok(Json(record))
}

/// Pay the fine of a returned overdue loan
#[utoipa::path(
    post,
    path = "/borrows/{id}/pay-fine",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Borrow record ID")),
    responses(
        (status = 200, description = "Fine paid", body = FinePayment),
        (status = 403, description = "Record belongs to another user"),
        (status = 404, description = "Record not found"),
        (status = 409, description = "Already paid"),
        (status = 422, description = "Not overdue or copy not returned")
    )
)]
pub async fn pay_fine(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<FinePayment>> {
    // Admins settle at the desk on the owner's behalf
    let payer = if claims.require_admin().is_ok() {
        state.services.borrows.get_record(id).await?.user_id
    } else {
        claims.user_id
    };

    let payment = state.services.borrows.pay_fine(id, payer).await?;
    Ok(Json(payment))
}

/// List a user's borrow records
#[utoipa::path(
    get,
    path = "/users/{id}/borrows",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "User ID"), BorrowQuery),
    responses(
        (status = 200, description = "Borrow records", body = Vec<BorrowRecord>)
    )
)]
pub async fn get_user_borrows(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(user_id): Path<i32>,
    Query(query): Query<BorrowQuery>,
) -> AppResult<Json<Vec<BorrowRecord>>> {
    claims.require_self_or_admin(user_id)?;
    let records = state.services.borrows.user_records(user_id, query.status).await?;
    Ok(Json(records))
}

/// List a user's unpaid overdue records
#[utoipa::path(
    get,
    path = "/users/{id}/overdue",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "Overdue records with open fines", body = Vec<BorrowRecord>)
    )
)]
pub async fn get_user_overdue(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(user_id): Path<i32>,
) -> AppResult<Json<Vec<BorrowRecord>>> {
    claims.require_self_or_admin(user_id)?;
    let records = state.services.borrows.unpaid_overdue(user_id).await?;
    Ok(Json(records))
}

/// List a book's borrow records (admin)
#[utoipa::path(
    get,
    path = "/books/{id}/borrows",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID"), BorrowQuery),
    responses(
        (status = 200, description = "Borrow records", body = Vec<BorrowRecord>),
        (status = 403, description = "Administrator rights required")
    )
)]
pub async fn get_book_borrows(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(book_id): Path<i32>,
    Query(query): Query<BorrowQuery>,
) -> AppResult<Json<Vec<BorrowRecord>>> {
    claims.require_admin()?;
    let records = state.services.borrows.book_records(book_id, query.status).await?;
    Ok(Json(records))
}
