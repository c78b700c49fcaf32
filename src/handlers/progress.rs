//! Progression handlers: XP, levels, streaks, achievements, credits

use std::sync::Arc;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use serde_json::json;

use crate::engine::{EngineError, Period};
use crate::models::{SpendCreditsRequest, User};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub period: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LedgerQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Extract session token from headers
fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth) = headers.get(header::AUTHORIZATION) {
        if let Ok(value) = auth.to_str() {
            if value.starts_with("Bearer ") {
                return Some(value[7..].to_string());
            }
        }
    }

    if let Some(cookie) = headers.get(header::COOKIE) {
        if let Ok(value) = cookie.to_str() {
            for part in value.split(';') {
                let part = part.trim();
                if part.starts_with("session=") {
                    return Some(part[8..].to_string());
                }
            }
        }
    }

    None
}

fn require_user(state: &AppState, headers: &HeaderMap) -> Result<User, (StatusCode, Json<serde_json::Value>)> {
    let token = extract_token(headers).ok_or((
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "Not authenticated" })),
    ))?;

    match state.db.validate_session(&token) {
        Ok(Some((_, user))) => Ok(user),
        _ => Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Invalid session" })),
        )),
    }
}

/// Map engine failures onto HTTP responses
fn engine_error_response(e: EngineError) -> (StatusCode, Json<serde_json::Value>) {
    match e {
        EngineError::UserNotFound(_) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "User not found" })),
        ),
        EngineError::InsufficientCredits { balance, required } => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "Insufficient credits",
                "balance": balance,
                "required": required,
            })),
        ),
        other => {
            tracing::error!("Engine error: {}", other);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": other.to_string() })),
            )
        }
    }
}

/// Current user's progression snapshot
pub async fn my_progress(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    match state.db.user_progress(user.id) {
        Ok(progress) => (StatusCode::OK, Json(json!({ "progress": progress }))),
        Err(e) => engine_error_response(e),
    }
}

/// Top scholars by points
pub async fn leaderboard(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LeaderboardQuery>,
) -> impl IntoResponse {
    let period = Period::parse(query.period.as_deref());

    match state.db.leaderboard(period) {
        Ok(entries) => (
            StatusCode::OK,
            Json(json!({
                "period": period.as_str(),
                "leaderboard": entries,
            })),
        ),
        Err(e) => engine_error_response(e),
    }
}

/// Achievement catalog with the caller's progress
pub async fn achievements(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    match state.db.achievement_report(user.id) {
        Ok(report) => (StatusCode::OK, Json(json!({ "achievements": report }))),
        Err(e) => engine_error_response(e),
    }
}

/// Current user's streak
pub async fn streak(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    match state.db.get_streak(user.id) {
        Ok(streak) => (StatusCode::OK, Json(json!({ "streak": streak }))),
        Err(e) => engine_error_response(e),
    }
}

/// Recent ledger entries for the current user
pub async fn ledger(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<LedgerQuery>,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let offset = query.offset.unwrap_or(0).max(0);

    match state.db.ledger_page(user.id, limit, offset) {
        Ok(entries) => (StatusCode::OK, Json(json!({ "ledger": entries }))),
        Err(e) => engine_error_response(e),
    }
}

/// Active discount from the scholar's oath, if any
pub async fn discount(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    match state.db.active_discount(user.id) {
        Ok(discount) => (StatusCode::OK, Json(json!({ "discount": discount }))),
        Err(e) => engine_error_response(e),
    }
}

/// Claim the daily login bonus. Idempotent within a UTC day.
pub async fn claim_login_bonus(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    match state.db.check_daily_login(user.id) {
        Ok(Some(activity)) => (
            StatusCode::OK,
            Json(json!({
                "claimed": true,
                "activity": activity,
            })),
        ),
        Ok(None) => (
            StatusCode::OK,
            Json(json!({
                "claimed": false,
                "message": "Daily bonus already claimed today",
            })),
        ),
        Err(e) => engine_error_response(e),
    }
}

/// Spend credits
pub async fn spend_credits(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SpendCreditsRequest>,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    if req.amount <= 0 {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Amount must be positive" })),
        );
    }

    let reason = req.reason.as_deref().unwrap_or("Credits spent");

    match state.db.deduct_credits(user.id, req.amount, reason) {
        Ok(balance) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "balance": balance,
            })),
        ),
        Err(e) => engine_error_response(e),
    }
}

/// Progression snapshot for any user by username
pub async fn user_progress(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> impl IntoResponse {
    let user = match state.db.get_user_by_username(&username) {
        Ok(Some(u)) => u,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "User not found" })),
            );
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            );
        }
    };

    match state.db.user_progress(user.id) {
        Ok(progress) => (StatusCode::OK, Json(json!({ "progress": progress }))),
        Err(e) => engine_error_response(e),
    }
}
