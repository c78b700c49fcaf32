//! HTTP request handlers

mod admin;
mod auth;
mod doubts;
mod progress;

use std::sync::Arc;
use axum::{
    routing::{get, post, put, delete},
    Router,
    extract::State,
    response::Json,
};
use serde_json::json;

use crate::AppState;

/// Create API routes
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Health check
        .route("/health", get(health))
        .route("/status", get(status))

        // Authentication
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))

        // User profiles
        .route("/profiles/:username", get(auth::get_profile))
        .route("/profiles/me", put(auth::update_profile))

        // Doubts
        .route("/doubts", post(doubts::create_doubt))
        .route("/doubts/:uuid", get(doubts::get_doubt))
        .route("/doubts/:uuid/answers", post(doubts::post_answer))
        .route("/doubts/:uuid/accept", post(doubts::accept_answer))
        .route("/doubts/:uuid/vote", post(doubts::vote_doubt))

        // Answers
        .route("/answers/:id/comments", post(doubts::post_comment))
        .route("/answers/:id/vote", post(doubts::vote_answer))

        // Browsing
        .route("/browse/recent", get(doubts::browse_recent))
        .route("/browse/unanswered", get(doubts::browse_unanswered))
        .route("/browse/tag/:tag", get(doubts::browse_by_tag))
        .route("/tags", get(doubts::get_tags))

        // Progression
        .route("/progress/me", get(progress::my_progress))
        .route("/progress/user/:username", get(progress::user_progress))
        .route("/progress/leaderboard", get(progress::leaderboard))
        .route("/progress/achievements", get(progress::achievements))
        .route("/progress/streak", get(progress::streak))
        .route("/progress/ledger", get(progress::ledger))
        .route("/progress/discount", get(progress::discount))
        .route("/progress/login-bonus", post(progress::claim_login_bonus))
        .route("/progress/credits/spend", post(progress::spend_credits))

        // Admin routes
        .route("/admin/stats", get(admin::get_stats))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/:user_id/role", put(admin::update_user_role))
        .route("/admin/users/:user_id/reputation", put(admin::adjust_reputation))
        .route("/admin/users/:user_id/credits", post(admin::grant_credits))
        .route("/admin/users/:user_id/badges", post(admin::grant_badge))
        .route("/admin/users/:user_id", delete(admin::delete_user))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "lyceum",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let stats = state.db.get_admin_stats().unwrap_or_else(|_| json!({}));

    Json(json!({
        "status": "ok",
        "doubts": stats.get("total_doubts").cloned().unwrap_or(json!(0)),
        "resolved": stats.get("resolved_doubts").cloned().unwrap_or(json!(0)),
        "scholars": stats.get("total_users").cloned().unwrap_or(json!(0)),
    }))
}
