//! Doubt, answer, comment, and vote handlers

use std::sync::Arc;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use serde_json::json;

use crate::engine::{AwardOptions, EventKind};
use crate::models::{
    AcceptAnswerRequest, CreateAnswerRequest, CreateCommentRequest, CreateDoubtRequest, NewDoubt,
    User, VoteRequest, VoteTarget,
};
use crate::AppState;

/// Query params for browse endpoints
#[derive(Debug, Deserialize)]
pub struct BrowseQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
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

/// Resolve the authenticated user or bail with 401
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

/// Post a new doubt
pub async fn create_doubt(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateDoubtRequest>,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    if req.title.trim().len() < 5 {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Title must be at least 5 characters" })),
        );
    }

    if req.body.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Body cannot be empty" })),
        );
    }

    let new_doubt = NewDoubt {
        user_id: user.id,
        title: req.title.trim().to_string(),
        body: req.body,
        tags: req.tags,
    };

    let doubt = match state.db.create_doubt(new_doubt) {
        Ok(d) => d,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            );
        }
    };

    let activity = match state.db.record_activity(user.id, EventKind::DoubtCreated, AwardOptions::default()) {
        Ok(a) => Some(a),
        Err(e) => {
            tracing::error!("Award for doubt {} failed: {}", doubt.uuid, e);
            None
        }
    };

    (
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "doubt": doubt,
            "activity": activity,
        })),
    )
}

/// Get a doubt with its answers and comments
pub async fn get_doubt(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<String>,
) -> impl IntoResponse {
    let doubt = match state.db.get_doubt_by_uuid(&uuid) {
        Ok(Some(d)) => d,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Doubt not found" })),
            );
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            );
        }
    };

    if let Err(e) = state.db.record_view(doubt.id) {
        tracing::warn!("View count update failed for {}: {}", uuid, e);
    }

    let answers = state.db.answers_for_doubt(doubt.id).unwrap_or_default();
    let answers: Vec<serde_json::Value> = answers
        .into_iter()
        .map(|answer| {
            let comments = state.db.comments_for_answer(answer.id).unwrap_or_default();
            json!({
                "answer": answer,
                "comments": comments,
            })
        })
        .collect();

    (
        StatusCode::OK,
        Json(json!({
            "doubt": doubt,
            "answers": answers,
        })),
    )
}

/// Post an answer to a doubt
pub async fn post_answer(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
    Json(req): Json<CreateAnswerRequest>,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    if req.body.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Answer cannot be empty" })),
        );
    }

    let doubt = match state.db.get_doubt_by_uuid(&uuid) {
        Ok(Some(d)) => d,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Doubt not found" })),
            );
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            );
        }
    };

    let answer = match state.db.create_answer(doubt.id, user.id, &req.body, req.ai_assisted) {
        Ok(a) => a,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            );
        }
    };

    let opts = AwardOptions {
        ai_assisted: req.ai_assisted,
        ..Default::default()
    };
    let activity = match state.db.record_activity(user.id, EventKind::AnswerPosted, opts) {
        Ok(a) => Some(a),
        Err(e) => {
            tracing::error!("Award for answer {} failed: {}", answer.id, e);
            None
        }
    };

    (
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "answer": answer,
            "activity": activity,
        })),
    )
}

/// Comment on an answer
pub async fn post_comment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(answer_id): Path<i64>,
    Json(req): Json<CreateCommentRequest>,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    if req.body.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Comment cannot be empty" })),
        );
    }

    match state.db.get_answer_by_id(answer_id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Answer not found" })),
            );
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            );
        }
    }

    let comment = match state.db.create_comment(answer_id, user.id, &req.body) {
        Ok(c) => c,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            );
        }
    };

    let activity = match state.db.record_activity(user.id, EventKind::CommentPosted, AwardOptions::default()) {
        Ok(a) => Some(a),
        Err(e) => {
            tracing::error!("Award for comment {} failed: {}", comment.id, e);
            None
        }
    };

    (
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "comment": comment,
            "activity": activity,
        })),
    )
}

/// Accept an answer, resolving the doubt
pub async fn accept_answer(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
    Json(req): Json<AcceptAnswerRequest>,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    let doubt = match state.db.get_doubt_by_uuid(&uuid) {
        Ok(Some(d)) => d,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Doubt not found" })),
            );
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            );
        }
    };

    // Only the asker can accept
    if doubt.user_id != user.id {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Only the asker can accept an answer" })),
        );
    }

    if doubt.status == "resolved" {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "error": "Doubt is already resolved" })),
        );
    }

    let answer = match state.db.get_answer_by_id(req.answer_id) {
        Ok(Some(a)) if a.doubt_id == doubt.id => a,
        Ok(_) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Answer not found on this doubt" })),
            );
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            );
        }
    };

    if let Err(e) = state.db.accept_answer(doubt.id, answer.id) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        );
    }

    // The answerer is recognized with the rigor multiplier their answer
    // earned, the asker logs a resolution activity
    let opts = AwardOptions {
        ai_assisted: answer.is_ai_assisted,
        ..Default::default()
    };
    if let Err(e) = state.db.record_recognition(answer.user_id, EventKind::AnswerAccepted, opts) {
        tracing::error!("Acceptance award for answer {} failed: {}", answer.id, e);
    }

    let activity = match state.db.record_activity(user.id, EventKind::DoubtResolved, AwardOptions::default()) {
        Ok(a) => Some(a),
        Err(e) => {
            tracing::error!("Resolution award for doubt {} failed: {}", uuid, e);
            None
        }
    };

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "accepted_answer_id": answer.id,
            "activity": activity,
        })),
    )
}

/// Vote on a doubt
pub async fn vote_doubt(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
    Json(req): Json<VoteRequest>,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    let doubt = match state.db.get_doubt_by_uuid(&uuid) {
        Ok(Some(d)) => d,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Doubt not found" })),
            );
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            );
        }
    };

    cast_vote(&state, &user, VoteTarget::Doubt, doubt.id, doubt.user_id, req.value)
}

/// Vote on an answer
pub async fn vote_answer(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(answer_id): Path<i64>,
    Json(req): Json<VoteRequest>,
) -> impl IntoResponse {
    let user = match require_user(&state, &headers) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    let answer = match state.db.get_answer_by_id(answer_id) {
        Ok(Some(a)) => a,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Answer not found" })),
            );
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            );
        }
    };

    cast_vote(&state, &user, VoteTarget::Answer, answer_id, answer.user_id, req.value)
}

fn cast_vote(
    state: &AppState,
    voter: &User,
    target: VoteTarget,
    target_id: i64,
    author_id: i64,
    value: i64,
) -> (StatusCode, Json<serde_json::Value>) {
    if value != 1 && value != -1 {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Vote value must be 1 or -1" })),
        );
    }

    // Cannot vote on your own content
    if author_id == voter.id {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "You cannot vote on your own content" })),
        );
    }

    let author_id = match state.db.cast_vote(voter.id, target, target_id, value) {
        Ok(id) => id,
        Err(e) => {
            let error_msg = e.to_string();
            if error_msg.contains("UNIQUE constraint failed") {
                return (
                    StatusCode::CONFLICT,
                    Json(json!({ "error": "You have already voted on this" })),
                );
            }
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": error_msg })),
            );
        }
    };

    let kind = if value > 0 {
        EventKind::UpvoteReceived
    } else {
        EventKind::DownvoteReceived
    };
    if let Err(e) = state.db.record_recognition(author_id, kind, AwardOptions::default()) {
        tracing::error!("Vote award for user {} failed: {}", author_id, e);
    }

    (StatusCode::OK, Json(json!({ "success": true })))
}

// ============================================================================
// Browsing
// ============================================================================

/// Most recent doubts
pub async fn browse_recent(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BrowseQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(20);
    let offset = query.offset.unwrap_or(0);

    match state.db.list_recent_doubts(limit, offset) {
        Ok(doubts) => (StatusCode::OK, Json(json!({ "doubts": doubts }))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        ),
    }
}

/// Open doubts with no answers
pub async fn browse_unanswered(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BrowseQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(20);

    match state.db.list_unanswered_doubts(limit) {
        Ok(doubts) => (StatusCode::OK, Json(json!({ "doubts": doubts }))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        ),
    }
}

/// Doubts carrying a tag
pub async fn browse_by_tag(
    State(state): State<Arc<AppState>>,
    Path(tag): Path<String>,
    Query(query): Query<BrowseQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(20);

    match state.db.list_doubts_by_tag(&tag, limit) {
        Ok(doubts) => (StatusCode::OK, Json(json!({ "tag": tag, "doubts": doubts }))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        ),
    }
}

/// All tags with usage counts
pub async fn get_tags(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.db.get_tags() {
        Ok(tags) => {
            let tags: Vec<serde_json::Value> = tags
                .into_iter()
                .map(|(tag, count)| json!({ "tag": tag, "count": count }))
                .collect();
            (StatusCode::OK, Json(json!({ "tags": tags })))
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        ),
    }
}
