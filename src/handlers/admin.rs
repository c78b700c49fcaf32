//! Admin handlers for user and platform management

use std::sync::Arc;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::engine::EngineError;
use crate::models::{AdjustReputationRequest, GrantBadgeRequest, GrantCreditsRequest, UpdateRoleRequest, User};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
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

/// Resolve the caller and require the admin flag
fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<User, (StatusCode, Json<serde_json::Value>)> {
    let token = extract_token(headers).ok_or((
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "Not authenticated" })),
    ))?;

    let user = match state.db.validate_session(&token) {
        Ok(Some((_, user))) => user,
        _ => {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Invalid session" })),
            ));
        }
    };

    if !user.is_admin {
        return Err((
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Admin access required" })),
        ));
    }

    Ok(user)
}

/// Get admin dashboard statistics
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    require_admin(&state, &headers)?;

    let stats = state.db.get_admin_stats()
        .map_err(|e| (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() }))
        ))?;

    Ok(Json(stats))
}

/// List all users (with pagination)
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    require_admin(&state, &headers)?;

    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(50).clamp(1, 100);
    let offset = (page - 1) * limit;

    let (users, total) = state.db.list_users_admin(offset, limit, query.search.as_deref())
        .map_err(|e| (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() }))
        ))?;

    Ok(Json(json!({
        "users": users,
        "total": total,
        "page": page,
        "limit": limit,
        "pages": (total + limit - 1) / limit
    })))
}

/// Grant or revoke the admin flag
pub async fn update_user_role(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
    Json(body): Json<UpdateRoleRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let admin = require_admin(&state, &headers)?;

    // Prevent self-demotion
    if user_id == admin.id && !body.is_admin {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Cannot remove your own admin status" }))
        ));
    }

    state.db.update_user_role(user_id, body.is_admin)
        .map_err(|e| (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() }))
        ))?;

    Ok(Json(json!({
        "success": true,
        "message": "User role updated"
    })))
}

/// Adjust a user's reputation by a delta
pub async fn adjust_reputation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
    Json(body): Json<AdjustReputationRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    require_admin(&state, &headers)?;

    let reputation = state.db.adjust_reputation(user_id, body.delta)
        .map_err(|e| (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() }))
        ))?
        .ok_or((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "User not found" }))
        ))?;

    Ok(Json(json!({
        "success": true,
        "reputation": reputation,
    })))
}

/// Grant credits to a user
pub async fn grant_credits(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
    Json(body): Json<GrantCreditsRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    require_admin(&state, &headers)?;

    if body.amount <= 0 {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Amount must be positive" }))
        ));
    }

    let reason = body.reason.as_deref().unwrap_or("Granted by admin");

    let balance = state.db.grant_credits(user_id, body.amount, reason)
        .map_err(|e| match e {
            EngineError::UserNotFound(_) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "User not found" }))
            ),
            other => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": other.to_string() }))
            ),
        })?;

    Ok(Json(json!({
        "success": true,
        "balance": balance,
    })))
}

/// Grant a badge to a user
pub async fn grant_badge(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
    Json(body): Json<GrantBadgeRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let admin = require_admin(&state, &headers)?;

    let granted = state.db.grant_badge(user_id, &body.badge_key, Some(admin.id))
        .map_err(|e| match e {
            EngineError::UserNotFound(_) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "User not found" }))
            ),
            EngineError::Invariant(msg) if msg.contains("unknown badge") => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Unknown badge" }))
            ),
            other => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": other.to_string() }))
            ),
        })?;

    Ok(Json(json!({
        "success": true,
        "granted": granted,
        "message": if granted { "Badge granted" } else { "Badge already held" },
    })))
}

/// Delete a user (admin only)
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let admin = require_admin(&state, &headers)?;

    // Prevent self-deletion
    if user_id == admin.id {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Cannot delete yourself" }))
        ));
    }

    state.db.delete_user(user_id)
        .map_err(|e| (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() }))
        ))?;

    Ok(Json(json!({
        "success": true,
        "message": "User deleted"
    })))
}
