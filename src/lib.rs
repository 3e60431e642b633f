//! Libris lending server
//!
//! Concurrency-safe lending and reservation engine for a library catalog:
//! loans, returns, renewals, a reservation queue, overdue fines and credit
//! scoring, served as a REST JSON API.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
