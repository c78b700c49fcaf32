//! Data models for Lyceum

use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

// ============================================================================
// User models
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub is_admin: bool,
    pub reputation: i64,
    pub tier: String,
    pub credits: i64,
    pub created_at: String,
    pub last_login: Option<String>,
}

impl User {
    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            username: row.get("username")?,
            email: row.get("email").ok(),
            display_name: row.get("display_name").ok(),
            bio: row.get("bio").ok(),
            avatar_url: row.get("avatar_url").ok(),
            is_admin: row.get::<_, i64>("is_admin").unwrap_or(0) == 1,
            reputation: row.get("reputation").unwrap_or(0),
            tier: row.get("tier").unwrap_or_else(|_| "Initiate".to_string()),
            credits: row.get("credits").unwrap_or(0),
            created_at: row.get("created_at")?,
            last_login: row.get("last_login").ok(),
        })
    }

    /// Profile view for other users, without email or credits
    pub fn public_view(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            bio: self.bio.clone(),
            avatar_url: self.avatar_url.clone(),
            tier: self.tier.clone(),
            reputation: self.reputation,
            created_at: self.created_at.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub tier: String,
    pub reputation: i64,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: Option<String>,
    pub password: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

// ============================================================================
// Doubt models
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Doubt {
    pub id: i64,
    pub uuid: String,
    pub user_id: i64,
    pub username: String,
    pub author_name: Option<String>,
    pub title: String,
    pub body: String,
    pub status: String,
    pub accepted_answer_id: Option<i64>,
    pub view_count: i64,
    pub upvotes: i64,
    pub downvotes: i64,
    pub answer_count: i64,
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Doubt {
    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            uuid: row.get("uuid")?,
            user_id: row.get("user_id")?,
            username: row.get("username")?,
            author_name: row.get("author_name").ok(),
            title: row.get("title")?,
            body: row.get("body")?,
            status: row.get("status")?,
            accepted_answer_id: row.get("accepted_answer_id").ok(),
            view_count: row.get("view_count").unwrap_or(0),
            upvotes: row.get("upvotes").unwrap_or(0),
            downvotes: row.get("downvotes").unwrap_or(0),
            answer_count: row.get("answer_count").unwrap_or(0),
            tags: Vec::new(), // Filled in separately
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub id: i64,
    pub doubt_id: i64,
    pub user_id: i64,
    pub username: String,
    pub author_name: Option<String>,
    pub body: String,
    pub is_accepted: bool,
    pub is_ai_assisted: bool,
    pub upvotes: i64,
    pub downvotes: i64,
    pub created_at: String,
}

impl Answer {
    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            doubt_id: row.get("doubt_id")?,
            user_id: row.get("user_id")?,
            username: row.get("username")?,
            author_name: row.get("author_name").ok(),
            body: row.get("body")?,
            is_accepted: row.get::<_, i64>("is_accepted").unwrap_or(0) == 1,
            is_ai_assisted: row.get::<_, i64>("is_ai_assisted").unwrap_or(0) == 1,
            upvotes: row.get("upvotes").unwrap_or(0),
            downvotes: row.get("downvotes").unwrap_or(0),
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Comment {
    pub id: i64,
    pub answer_id: i64,
    pub user_id: i64,
    pub username: String,
    pub body: String,
    pub created_at: String,
}

impl Comment {
    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            answer_id: row.get("answer_id")?,
            user_id: row.get("user_id")?,
            username: row.get("username")?,
            body: row.get("body")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug)]
pub struct NewDoubt {
    pub user_id: i64,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteTarget {
    Doubt,
    Answer,
}

impl VoteTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteTarget::Doubt => "doubt",
            VoteTarget::Answer => "answer",
        }
    }
}

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: Option<String>,
    pub password: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDoubtRequest {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAnswerRequest {
    pub body: String,
    #[serde(default)]
    pub ai_assisted: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub value: i64,
}

#[derive(Debug, Deserialize)]
pub struct AcceptAnswerRequest {
    pub answer_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct SpendCreditsRequest {
    pub amount: i64,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GrantCreditsRequest {
    pub amount: i64,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub is_admin: bool,
}

#[derive(Debug, Deserialize)]
pub struct AdjustReputationRequest {
    pub delta: i64,
}

#[derive(Debug, Deserialize)]
pub struct GrantBadgeRequest {
    pub badge_key: String,
}
