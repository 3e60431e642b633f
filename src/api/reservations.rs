//! Reservation endpoints

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
    models::{ReserveRecord, ReserveStatus},
    AppState,
};

use super::AuthenticatedUser;

/// Reservation request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ReserveRequest {
    /// Reserving user; defaults to the caller
    pub user_id: Option<i32>,
    pub book_id: i32,
    /// Days the hold stays valid
    #[validate(range(min = 1, max = 30, message = "Reservation validity must be between 1 and 30 days"))]
    pub days: i64,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReserveQuery {
    /// waiting, reserved, cancelled or completed
    pub status: Option<ReserveStatus>,
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExpiringQuery {
    #[validate(range(min = 1, max = 720, message = "Hours must be between 1 and 720"))]
    pub hours: i64,
}

#[derive(Serialize, ToSchema)]
pub struct ExpiredResponse {
    pub id: i32,
    pub expired: bool,
}

/// Place a reservation
#[utoipa::path(
    post,
    path = "/reservations",
    tag = "reservations",
    security(("bearer_auth" = [])),
    request_body = ReserveRequest,
    responses(
        (status = 201, description = "Reservation placed", body = ReserveRecord),
        (status = 404, description = "User or book not found"),
        (status = 409, description = "Active reservation already exists"),
        (status = 422, description = "Account frozen")
    )
)]
pub async fn create_reservation(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<ReserveRequest>,
) -> AppResult<(StatusCode, Json<ReserveRecord>)> {
    request.validate()?;
    let user_id = request.user_id.unwrap_or(claims.user_id);
    claims.require_self_or_admin(user_id)?;

    let record = state
        .services
        .reservations
        .reserve(user_id, request.book_id, request.days)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Get one reservation
#[utoipa::path(
    get,
    path = "/reservations/{id}",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation", body = ReserveRecord),
        (status = 404, description = "Reservation not found")
    )
)]
pub async fn get_reservation(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ReserveRecord>> {
    let record = state.services.reservations.get_reservation(id).await?;
    claims.require_self_or_admin(record.user_id)?;
    Ok(Json(record))
}

/// Whether a waiting reservation has passed its expire date
#[utoipa::path(
    get,
    path = "/reservations/{id}/expired",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Expiry state", body = ExpiredResponse),
        (status = 404, description = "Reservation not found")
    )
)]
pub async fn is_expired(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ExpiredResponse>> {
    let expired = state.services.reservations.is_expired(id).await?;
    Ok(Json(ExpiredResponse { id, expired }))
}

/// Cancel a reservation (owner or admin)
#[utoipa::path(
    post,
    path = "/reservations/{id}/cancel",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 204, description = "Reservation cancelled"),
        (status = 403, description = "Reservation belongs to another user"),
        (status = 404, description = "Reservation not found"),
        (status = 409, description = "Already cancelled or completed")
    )
)]
pub async fn cancel_reservation(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.reservations.cancel(id, claims.actor()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Confirm a waiting reservation (admin)
#[utoipa::path(
    post,
    path = "/reservations/{id}/confirm",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 204, description = "Reservation confirmed"),
        (status = 403, description = "Administrator rights required"),
        (status = 404, description = "Reservation not found"),
        (status = 409, description = "Not waiting or no copy on the shelf"),
        (status = 422, description = "Reservation expired")
    )
)]
pub async fn confirm_reservation(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;
    state.services.reservations.confirm(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List a user's reservations
#[utoipa::path(
    get,
    path = "/users/{id}/reservations",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "User ID"), ReserveQuery),
    responses(
        (status = 200, description = "Reservations", body = Vec<ReserveRecord>)
    )
)]
pub async fn get_user_reservations(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(user_id): Path<i32>,
    Query(query): Query<ReserveQuery>,
) -> AppResult<Json<Vec<ReserveRecord>>> {
    claims.require_self_or_admin(user_id)?;
    let records = state
        .services
        .reservations
        .user_reservations(user_id, query.status)
        .await?;
    Ok(Json(records))
}

/// A book's reservation queue, oldest first
#[utoipa::path(
    get,
    path = "/books/{id}/reservations",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID"), ReserveQuery),
    responses(
        (status = 200, description = "Reservation queue", body = Vec<ReserveRecord>)
    )
)]
pub async fn get_book_queue(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(book_id): Path<i32>,
    Query(query): Query<ReserveQuery>,
) -> AppResult<Json<Vec<ReserveRecord>>> {
    claims.require_admin()?;
    let records = state.services.reservations.book_queue(book_id, query.status).await?;
    Ok(Json(records))
}

/// Waiting reservations expiring soon (admin)
#[utoipa::path(
    get,
    path = "/reservations/expiring",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(ExpiringQuery),
    responses(
        (status = 200, description = "Reservations expiring within the window", body = Vec<ReserveRecord>),
        (status = 400, description = "Invalid window")
    )
)]
pub async fn get_expiring(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<ExpiringQuery>,
) -> AppResult<Json<Vec<ReserveRecord>>> {
    claims.require_admin()?;
    query.validate()?;
    let records = state.services.sweeps.upcoming_expiring(query.hours).await?;
    Ok(Json(records))
}
