//! Lyceum - Academic Q&A with Scholarly Progression
//!
//! A Rust-based platform where students post doubts, answer each
//! other, and climb a progression ladder:
//! - Post doubts, answers, and comments; vote and accept answers
//! - Earn XP shaped by rigor and reputation multipliers
//! - Keep daily streaks alive for bonuses and the scholar's oath
//! - Unlock achievements and spend earned credits

pub mod app;
pub mod db;
pub mod engine;
pub mod handlers;
pub mod middleware;
pub mod models;

use std::sync::Arc;

use axum::{middleware as axum_mw, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use app::AppState;
use middleware::{RateLimitConfig, RateLimitState};

/// Default port for Lyceum
pub const DEFAULT_PORT: u16 = 8898;

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Initialize rate limiting state
    let rate_config = RateLimitConfig::default();
    let rate_state = Arc::new(RateLimitState::new(&rate_config));

    Router::new()
        // API routes
        .nest("/api", handlers::api_routes())
        // Security middleware (applied in order: bottom to top)
        .layer(axum_mw::from_fn(middleware::security_headers))
        .layer(axum_mw::from_fn_with_state(rate_state, middleware::rate_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
