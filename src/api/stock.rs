//! Book stock endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::AppResult,
    models::{Book, StockAdjustment},
    AppState,
};

use super::AuthenticatedUser;

#[derive(Debug, Deserialize, ToSchema)]
pub struct StockRequest {
    /// Copies to add (positive) or write off (negative)
    pub delta: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BatchStockRequest {
    #[validate(length(min = 1, message = "At least one adjustment is required"))]
    pub adjustments: Vec<StockAdjustment>,
}

/// Get a book's stock
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "stock",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book", body = Book),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Book>> {
    let book = state.services.ledger.get_book(id).await?;
    Ok(Json(book))
}

/// Adjust one book's copy count (admin)
#[utoipa::path(
    post,
    path = "/books/{id}/stock",
    tag = "stock",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    request_body = StockRequest,
    responses(
        (status = 200, description = "Stock adjusted", body = Book),
        (status = 400, description = "Zero adjustment"),
        (status = 403, description = "Administrator rights required"),
        (status = 409, description = "Would remove copies that are on loan")
    )
)]
pub async fn adjust_stock(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<StockRequest>,
) -> AppResult<Json<Book>> {
    claims.require_admin()?;
    let book = state.services.ledger.adjust_stock(id, request.delta).await?;
    Ok(Json(book))
}

/// Adjust several books at once, all or nothing (admin)
#[utoipa::path(
    post,
    path = "/books/stock/batch",
    tag = "stock",
    security(("bearer_auth" = [])),
    request_body = BatchStockRequest,
    responses(
        (status = 200, description = "All adjustments applied", body = Vec<Book>),
        (status = 403, description = "Administrator rights required"),
        (status = 409, description = "One adjustment failed, nothing applied")
    )
)]
pub async fn batch_adjust_stock(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<BatchStockRequest>,
) -> AppResult<Json<Vec<Book>>> {
    claims.require_admin()?;
    request.validate()?;
    let books = state
        .services
        .ledger
        .batch_adjust_stock(&request.adjustments)
        .await?;
    Ok(Json(books))
}
