//! User management

use chrono::{DateTime, Duration, Utc};
use rusqlite::params;
use argon2::{self, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use argon2::password_hash::SaltString;
use rand::rngs::OsRng;

use crate::db::Database;
use crate::models::{User, Session, NewUser};

impl Database {
    /// Create a new user
    pub fn create_user(&self, new_user: NewUser) -> anyhow::Result<User> {
        let conn = self.conn();

        // Hash password
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let password_hash = argon2
            .hash_password(new_user.password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?
            .to_string();

        conn.execute(
            r#"
            INSERT INTO users (username, email, password_hash, display_name)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                new_user.username,
                new_user.email,
                password_hash,
                new_user.display_name.as_ref().unwrap_or(&new_user.username),
            ],
        )?;

        let user_id = conn.last_insert_rowid();
        drop(conn);
        self.get_user_by_id(user_id)
    }

    /// Get user by ID
    pub fn get_user_by_id(&self, id: i64) -> anyhow::Result<User> {
        let conn = self.conn();

        let user = conn.query_row(
            "SELECT * FROM users WHERE id = ?1",
            params![id],
            |row| User::from_row(row),
        )?;

        Ok(user)
    }

    /// Get user by username
    pub fn get_user_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let conn = self.conn();

        let result = conn.query_row(
            "SELECT * FROM users WHERE username = ?1",
            params![username],
            |row| User::from_row(row),
        );

        match result {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Authenticate user with password
    pub fn authenticate_user(&self, username: &str, password: &str) -> anyhow::Result<Option<User>> {
        let conn = self.conn();

        let result: Result<(i64, String), _> = conn.query_row(
            "SELECT id, password_hash FROM users WHERE username = ?1 OR email = ?1",
            params![username],
            |row| Ok((row.get(0)?, row.get(1)?)),
        );

        match result {
            Ok((id, hash)) => {
                let parsed_hash = PasswordHash::new(&hash)
                    .map_err(|e| anyhow::anyhow!("Invalid password hash: {}", e))?;
                if Argon2::default().verify_password(password.as_bytes(), &parsed_hash).is_ok() {
                    // Update last login
                    conn.execute(
                        "UPDATE users SET last_login = datetime('now') WHERE id = ?1",
                        params![id],
                    )?;
                    drop(conn);
                    Ok(Some(self.get_user_by_id(id)?))
                } else {
                    Ok(None)
                }
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Create a session for a user
    pub fn create_session(&self, user_id: i64, ip: Option<&str>, user_agent: Option<&str>) -> anyhow::Result<Session> {
        let conn = self.conn();

        // Generate secure token
        let mut rng = OsRng;
        let token_bytes: [u8; 32] = rand::Rng::gen(&mut rng);
        let token = hex::encode(token_bytes);

        // Session expires in 30 days
        let expires_at = Utc::now() + Duration::days(30);

        conn.execute(
            r#"
            INSERT INTO sessions (user_id, token, expires_at, ip_address, user_agent)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                user_id,
                token,
                expires_at.to_rfc3339(),
                ip,
                user_agent,
            ],
        )?;

        let session_id = conn.last_insert_rowid();

        Ok(Session {
            id: session_id,
            user_id,
            token,
            expires_at,
        })
    }

    /// Validate session token
    pub fn validate_session(&self, token: &str) -> anyhow::Result<Option<(Session, User)>> {
        let conn = self.conn();

        let result: Result<(i64, i64, String), _> = conn.query_row(
            r#"
            SELECT id, user_id, expires_at FROM sessions
            WHERE token = ?1 AND expires_at > datetime('now')
            "#,
            params![token],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        );

        match result {
            Ok((id, user_id, expires_str)) => {
                let expires_at = DateTime::parse_from_rfc3339(&expires_str)?
                    .with_timezone(&Utc);

                let session = Session {
                    id,
                    user_id,
                    token: token.to_string(),
                    expires_at,
                };

                drop(conn);
                let user = self.get_user_by_id(user_id)?;

                Ok(Some((session, user)))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a session (logout)
    pub fn delete_session(&self, token: &str) -> anyhow::Result<()> {
        let conn = self.conn();
        conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
        Ok(())
    }

    /// Update user profile
    pub fn update_user(&self, id: i64, display_name: Option<&str>, bio: Option<&str>, avatar_url: Option<&str>) -> anyhow::Result<()> {
        let conn = self.conn();

        if let Some(name) = display_name {
            conn.execute(
                "UPDATE users SET display_name = ?1 WHERE id = ?2",
                params![name, id],
            )?;
        }

        if let Some(bio_text) = bio {
            conn.execute(
                "UPDATE users SET bio = ?1 WHERE id = ?2",
                params![bio_text, id],
            )?;
        }

        if let Some(url) = avatar_url {
            conn.execute(
                "UPDATE users SET avatar_url = ?1 WHERE id = ?2",
                params![url, id],
            )?;
        }

        Ok(())
    }

    /// Cleanup expired sessions
    pub fn cleanup_sessions(&self) -> anyhow::Result<u64> {
        let conn = self.conn();
        let count = conn.execute(
            "DELETE FROM sessions WHERE expires_at < datetime('now')",
            [],
        )?;
        Ok(count as u64)
    }

    // =========================================================================
    // Admin Methods
    // =========================================================================

    /// Get admin dashboard statistics
    pub fn get_admin_stats(&self) -> anyhow::Result<serde_json::Value> {
        let conn = self.conn();

        let total_users: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users", [], |row| row.get(0)
        )?;

        let total_doubts: i64 = conn.query_row(
            "SELECT COUNT(*) FROM doubts", [], |row| row.get(0)
        )?;

        let resolved_doubts: i64 = conn.query_row(
            "SELECT COUNT(*) FROM doubts WHERE status = 'resolved'", [], |row| row.get(0)
        )?;

        let total_answers: i64 = conn.query_row(
            "SELECT COUNT(*) FROM answers", [], |row| row.get(0)
        )?;

        let points_awarded: i64 = conn.query_row(
            "SELECT COALESCE(SUM(points), 0) FROM points_ledger WHERE points > 0 AND event_type NOT IN ('CREDITS_SPENT', 'CREDITS_GRANTED')",
            [], |row| row.get(0)
        )?;

        let achievements_unlocked: i64 = conn.query_row(
            "SELECT COUNT(*) FROM achievement_unlocks", [], |row| row.get(0)
        )?;

        let active_sessions: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sessions WHERE expires_at > datetime('now')", [], |row| row.get(0)
        )?;

        Ok(serde_json::json!({
            "total_users": total_users,
            "total_doubts": total_doubts,
            "resolved_doubts": resolved_doubts,
            "total_answers": total_answers,
            "points_awarded": points_awarded,
            "achievements_unlocked": achievements_unlocked,
            "active_sessions": active_sessions,
        }))
    }

    /// List users for admin (with pagination)
    pub fn list_users_admin(&self, offset: i64, limit: i64, search: Option<&str>) -> anyhow::Result<(Vec<serde_json::Value>, i64)> {
        let conn = self.conn();

        // Build query based on search
        let (query, count_query) = if search.is_some() {
            (
                r#"
                SELECT id, username, email, display_name, is_admin,
                       reputation, tier, credits, created_at, last_login
                FROM users
                WHERE username LIKE ?1 OR email LIKE ?1
                ORDER BY created_at DESC
                LIMIT ?2 OFFSET ?3
                "#,
                "SELECT COUNT(*) FROM users WHERE username LIKE ?1 OR email LIKE ?1"
            )
        } else {
            (
                r#"
                SELECT id, username, email, display_name, is_admin,
                       reputation, tier, credits, created_at, last_login
                FROM users
                ORDER BY created_at DESC
                LIMIT ?1 OFFSET ?2
                "#,
                "SELECT COUNT(*) FROM users"
            )
        };

        let search_pattern = search.map(|s| format!("%{}%", s));

        let total: i64 = if let Some(ref pattern) = search_pattern {
            conn.query_row(count_query, [pattern], |row| row.get(0))?
        } else {
            conn.query_row(count_query, [], |row| row.get(0))?
        };

        let mut stmt = conn.prepare(query)?;
        let mut users = Vec::new();

        let rows = if let Some(ref pattern) = search_pattern {
            stmt.query(rusqlite::params![pattern, limit, offset])?
        } else {
            stmt.query(rusqlite::params![limit, offset])?
        };

        let mut rows = rows;
        while let Some(row) = rows.next()? {
            users.push(serde_json::json!({
                "id": row.get::<_, i64>(0)?,
                "username": row.get::<_, String>(1)?,
                "email": row.get::<_, Option<String>>(2)?,
                "display_name": row.get::<_, Option<String>>(3)?,
                "is_admin": row.get::<_, i32>(4)? != 0,
                "reputation": row.get::<_, i64>(5)?,
                "tier": row.get::<_, String>(6)?,
                "credits": row.get::<_, i64>(7)?,
                "created_at": row.get::<_, String>(8)?,
                "last_login": row.get::<_, Option<String>>(9)?,
            }));
        }

        Ok((users, total))
    }

    /// Update user role
    pub fn update_user_role(&self, user_id: i64, is_admin: bool) -> anyhow::Result<()> {
        let conn = self.conn();
        conn.execute(
            "UPDATE users SET is_admin = ?1 WHERE id = ?2",
            rusqlite::params![is_admin as i32, user_id],
        )?;
        Ok(())
    }

    /// Adjust a user's reputation by a signed delta, never below zero.
    /// Returns the new value, or None for an unknown user.
    pub fn adjust_reputation(&self, user_id: i64, delta: i64) -> anyhow::Result<Option<i64>> {
        let conn = self.conn();
        let updated = conn.execute(
            "UPDATE users SET reputation = MAX(0, reputation + ?1) WHERE id = ?2",
            params![delta, user_id],
        )?;
        if updated == 0 {
            return Ok(None);
        }
        let reputation = conn.query_row(
            "SELECT reputation FROM users WHERE id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(Some(reputation))
    }

    /// Delete a user and all their data
    pub fn delete_user(&self, user_id: i64) -> anyhow::Result<()> {
        let conn = self.conn();

        // Foreign keys with ON DELETE CASCADE handle doubts, answers,
        // sessions, ledger rows, streaks, unlocks, etc.
        conn.execute("DELETE FROM users WHERE id = ?1", rusqlite::params![user_id])?;

        Ok(())
    }
}
