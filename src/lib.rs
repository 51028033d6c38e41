//! Valet - Hotel Valet Parking Operations Server
//!
//! Tracks vehicle stays from arrival to departure, answers ticket and plate
//! lookups, and mails a nightly report to the hotel manager.

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
