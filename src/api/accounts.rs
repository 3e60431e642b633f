//! Account endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{User, UserStatus},
    AppState,
};

use super::AuthenticatedUser;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreditRequest {
    pub delta: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusRequest {
    /// normal or frozen
    pub status: UserStatus,
}

/// Get a user's lending account
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "accounts",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = User),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<User>> {
    claims.require_self_or_admin(id)?;
    let user = state.services.accounts.get_user(id).await?;
    Ok(Json(user))
}

/// Adjust a user's credit score (admin)
#[utoipa::path(
    post,
    path = "/users/{id}/credit",
    tag = "accounts",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "User ID")),
    request_body = CreditRequest,
    responses(
        (status = 200, description = "Credit adjusted", body = User),
        (status = 400, description = "Score would leave 0..=100"),
        (status = 403, description = "Administrator rights required"),
        (status = 404, description = "User not found")
    )
)]
pub async fn adjust_credit(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<CreditRequest>,
) -> AppResult<Json<User>> {
    claims.require_admin()?;
    let user = state.services.accounts.adjust_credit(id, request.delta).await?;
    Ok(Json(user))
}

/// Freeze or unfreeze an account (admin)
#[utoipa::path(
    put,
    path = "/users/{id}/status",
    tag = "accounts",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "User ID")),
    request_body = StatusRequest,
    responses(
        (status = 200, description = "Status changed", body = User),
        (status = 403, description = "Administrator rights required"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Already in that status")
    )
)]
pub async fn change_status(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<StatusRequest>,
) -> AppResult<Json<User>> {
    claims.require_admin()?;
    let user = state.services.accounts.change_status(id, request.status).await?;
    Ok(Json(user))
}
