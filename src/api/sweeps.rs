//! Sweep triggers (admin)

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{error::AppResult, services::sweeps::SweepReport, AppState};

use super::AuthenticatedUser;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SweepQuery {
    /// Restrict the sweep to one record
    pub id: Option<i32>,
}

/// Mark late loans overdue and charge them
#[utoipa::path(
    post,
    path = "/sweeps/overdue",
    tag = "sweeps",
    security(("bearer_auth" = [])),
    params(SweepQuery),
    responses(
        (status = 200, description = "Sweep report", body = SweepReport),
        (status = 403, description = "Administrator rights required"),
        (status = 404, description = "Record not found")
    )
)]
pub async fn sweep_overdue(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<SweepQuery>,
) -> AppResult<Json<SweepReport>> {
    claims.require_admin()?;
    let report = state.services.sweeps.sweep_overdue(query.id).await?;
    Ok(Json(report))
}

/// Cancel expired waiting reservations
#[utoipa::path(
    post,
    path = "/sweeps/reservations",
    tag = "sweeps",
    security(("bearer_auth" = [])),
    params(SweepQuery),
    responses(
        (status = 200, description = "Sweep report", body = SweepReport),
        (status = 403, description = "Administrator rights required"),
        (status = 404, description = "Reservation not found")
    )
)]
pub async fn sweep_reservations(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<SweepQuery>,
) -> AppResult<Json<SweepReport>> {
    claims.require_admin()?;
    let report = state
        .services
        .sweeps
        .sweep_expired_reservations(query.id)
        .await?;
    Ok(Json(report))
}
