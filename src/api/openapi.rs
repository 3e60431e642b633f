//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{accounts, borrows, health, reservations, stock, sweeps};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Libris API",
        version = "0.3.0",
        description = "Library lending and reservation REST API"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        // Borrows
        borrows::borrow_book,
        borrows::get_borrow,
        borrows::return_book,
        borrows::renew_borrow,
        borrows::pay_fine,
        borrows::get_user_borrows,
        borrows::get_user_overdue,
        borrows::get_book_borrows,
        // Reservations
        reservations::create_reservation,
        reservations::get_reservation,
        reservations::is_expired,
        reservations::cancel_reservation,
        reservations::confirm_reservation,
        reservations::get_user_reservations,
        reservations::get_book_queue,
        reservations::get_expiring,
        // Sweeps
        sweeps::sweep_overdue,
        sweeps::sweep_reservations,
        // Stock
        stock::get_book,
        stock::adjust_stock,
        stock::batch_adjust_stock,
        // Accounts
        accounts::get_user,
        accounts::adjust_credit,
        accounts::change_status,
    ),
    components(
        schemas(
            // Models
            crate::models::Book,
            crate::models::StockAdjustment,
            crate::models::BorrowRecord,
            crate::models::FinePayment,
            crate::models::ReserveRecord,
            crate::models::User,
            crate::models::BorrowStatus,
            crate::models::ReserveStatus,
            crate::models::UserStatus,
            crate::models::Role,
            // Requests and responses
            borrows::BorrowRequest,
            borrows::RenewRequest,
            borrows::ReturnResponse,
            reservations::ReserveRequest,
            reservations::ExpiredResponse,
            stock::StockRequest,
            stock::BatchStockRequest,
            accounts::CreditRequest,
            accounts::StatusRequest,
            crate::services::sweeps::SweepReport,
            crate::services::sweeps::SweepFailure,
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "borrows", description = "Lending, returns, renewals and fines"),
        (name = "reservations", description = "Reservation queue"),
        (name = "sweeps", description = "Overdue and expiry sweeps"),
        (name = "stock", description = "Book stock ledger"),
        (name = "accounts", description = "Credit score and account status")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
