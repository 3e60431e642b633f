//! API handlers for Libris REST endpoints

pub mod accounts;
pub mod borrows;
pub mod health;
pub mod openapi;
pub mod reservations;
pub mod stock;
pub mod sweeps;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, models::user::UserClaims, AppState};

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

        let claims = UserClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Borrows
        .route("/borrows", post(borrows::borrow_book))
        .route("/borrows/:id", get(borrows::get_borrow))
        .route("/borrows/:id/return", post(borrows::return_book))
        .route("/borrows/:id/renew", post(borrows::renew_borrow))
        .route("/borrows/:id/pay-fine", post(borrows::pay_fine))
        .route("/users/:id/borrows", get(borrows::get_user_borrows))
        .route("/users/:id/overdue", get(borrows::get_user_overdue))
        .route("/books/:id/borrows", get(borrows::get_book_borrows))
        // Reservations
        .route("/reservations", post(reservations::create_reservation))
        .route("/reservations/expiring", get(reservations::get_expiring))
        .route("/reservations/:id", get(reservations::get_reservation))
        .route("/reservations/:id/expired", get(reservations::is_expired))
        .route("/reservations/:id/cancel", post(reservations::cancel_reservation))
        .route("/reservations/:id/confirm", post(reservations::confirm_reservation))
        .route("/users/:id/reservations", get(reservations::get_user_reservations))
        .route("/books/:id/reservations", get(reservations::get_book_queue))
        // Sweeps
        .route("/sweeps/overdue", post(sweeps::sweep_overdue))
        .route("/sweeps/reservations", post(sweeps::sweep_reservations))
        // Stock
        .route("/books/:id", get(stock::get_book))
        .route("/books/:id/stock", post(stock::adjust_stock))
        .route("/books/stock/batch", post(stock::batch_adjust_stock))
        // Accounts
        .route("/users/:id", get(accounts::get_user))
        .route("/users/:id/credit", post(accounts::adjust_credit))
        .route("/users/:id/status", put(accounts::change_status))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
