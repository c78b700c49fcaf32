//! Authentication handlers

use std::sync::Arc;
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde_json::json;

use crate::models::{LoginRequest, NewUser, RegisterRequest, UpdateProfileRequest};
use crate::AppState;

/// Extract session token from headers
fn extract_token(headers: &HeaderMap) -> Option<String> {
    // Try Authorization header first
    if let Some(auth) = headers.get(header::AUTHORIZATION) {
        if let Ok(value) = auth.to_str() {
            if value.starts_with("Bearer ") {
                return Some(value[7..].to_string());
            }
        }
    }

    // Try cookie
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

/// Register a new user
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    // Validate input
    if req.username.len() < 3 {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Username must be at least 3 characters" })),
        );
    }

    if req.password.len() < 8 {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Password must be at least 8 characters" })),
        );
    }

    // Check if username exists
    if let Ok(Some(_)) = state.db.get_user_by_username(&req.username) {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "error": "Username already taken" })),
        );
    }

    // Create user
    let new_user = NewUser {
        username: req.username.clone(),
        email: req.email,
        password: req.password,
        display_name: req.display_name,
    };

    match state.db.create_user(new_user) {
        Ok(user) => {
            // Create session
            match state.db.create_session(user.id, None, None) {
                Ok(session) => (
                    StatusCode::CREATED,
                    Json(json!({
                        "success": true,
                        "user": user.public_view(),
                        "token": session.token,
                    })),
                ),
                Err(e) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": format!("Failed to create session: {}", e) })),
                ),
            }
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("Failed to create user: {}", e) })),
        ),
    }
}

/// Login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    match state.db.authenticate_user(&req.username, &req.password) {
        Ok(Some(user)) => {
            match state.db.create_session(user.id, None, None) {
                Ok(session) => {
                    // First login of the UTC day earns points, a credit,
                    // and advances the streak
                    let daily_bonus = match state.db.check_daily_login(user.id) {
                        Ok(bonus) => bonus,
                        Err(e) => {
                            tracing::error!("Daily login award failed for {}: {}", user.username, e);
                            None
                        }
                    };

                    (
                        StatusCode::OK,
                        Json(json!({
                            "success": true,
                            "user": user.public_view(),
                            "token": session.token,
                            "daily_bonus": daily_bonus,
                        })),
                    )
                }
                Err(e) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": format!("Failed to create session: {}", e) })),
                ),
            }
        }
        Ok(None) => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Invalid credentials" })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("Authentication error: {}", e) })),
        ),
    }
}

/// Logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Some(token) = extract_token(&headers) {
        let _ = state.db.delete_session(&token);
    }

    Json(json!({ "success": true }))
}

/// Get current user
pub async fn me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let token = match extract_token(&headers) {
        Some(t) => t,
        None => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Not authenticated" })),
            );
        }
    };

    match state.db.validate_session(&token) {
        Ok(Some((_, user))) => {
            let credits = user.credits;
            (
                StatusCode::OK,
                Json(json!({
                    "user": user.public_view(),
                    "credits": credits,
                })),
            )
        }
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Invalid session" })),
        ),
    }
}

/// Get user profile
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> impl IntoResponse {
    match state.db.get_user_by_username(&username) {
        Ok(Some(user)) => {
            let progress = state.db.user_progress(user.id).ok();
            let doubts = state.db.get_doubts_by_user(user.id, 20, 0).unwrap_or_default();

            (
                StatusCode::OK,
                Json(json!({
                    "user": user.public_view(),
                    "progress": progress,
                    "doubts": doubts,
                })),
            )
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "User not found" })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        ),
    }
}

/// Update profile
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(updates): Json<UpdateProfileRequest>,
) -> impl IntoResponse {
    let token = match extract_token(&headers) {
        Some(t) => t,
        None => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Not authenticated" })),
            );
        }
    };

    match state.db.validate_session(&token) {
        Ok(Some((_, user))) => {
            match state.db.update_user(
                user.id,
                updates.display_name.as_deref(),
                updates.bio.as_deref(),
                updates.avatar_url.as_deref(),
            ) {
                Ok(_) => (StatusCode::OK, Json(json!({ "success": true }))),
                Err(e) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": e.to_string() })),
                ),
            }
        }
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Invalid session" })),
        ),
    }
}
