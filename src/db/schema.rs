//! Database schema and initialization

use rusqlite::Connection;

/// Initialize database schema
pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        r#"
        -- Users table
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT UNIQUE NOT NULL,
            email TEXT,
            password_hash TEXT NOT NULL,
            display_name TEXT,
            bio TEXT,
            avatar_url TEXT,
            is_admin INTEGER DEFAULT 0,
            reputation INTEGER DEFAULT 0,
            tier TEXT DEFAULT 'Initiate',
            credits INTEGER DEFAULT 0,
            created_at TEXT DEFAULT (datetime('now')),
            last_login TEXT
        );

        -- Sessions table
        CREATE TABLE IF NOT EXISTS sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            token TEXT UNIQUE NOT NULL,
            expires_at TEXT NOT NULL,
            ip_address TEXT,
            user_agent TEXT,
            created_at TEXT DEFAULT (datetime('now')),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        -- Doubts (questions)
        CREATE TABLE IF NOT EXISTS doubts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT UNIQUE NOT NULL,
            user_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            status TEXT DEFAULT 'open',
            accepted_answer_id INTEGER,
            view_count INTEGER DEFAULT 0,
            upvotes INTEGER DEFAULT 0,
            downvotes INTEGER DEFAULT 0,
            created_at TEXT DEFAULT (datetime('now')),
            updated_at TEXT DEFAULT (datetime('now')),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        -- Doubt tags
        CREATE TABLE IF NOT EXISTS doubt_tags (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            doubt_id INTEGER NOT NULL,
            tag TEXT NOT NULL,
            UNIQUE(doubt_id, tag),
            FOREIGN KEY (doubt_id) REFERENCES doubts(id) ON DELETE CASCADE
        );

        -- Answers
        CREATE TABLE IF NOT EXISTS answers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            doubt_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            body TEXT NOT NULL,
            is_accepted INTEGER DEFAULT 0,
            is_ai_assisted INTEGER DEFAULT 0,
            upvotes INTEGER DEFAULT 0,
            downvotes INTEGER DEFAULT 0,
            created_at TEXT DEFAULT (datetime('now')),
            FOREIGN KEY (doubt_id) REFERENCES doubts(id) ON DELETE CASCADE,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        -- Comments on answers
        CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            answer_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            body TEXT NOT NULL,
            created_at TEXT DEFAULT (datetime('now')),
            FOREIGN KEY (answer_id) REFERENCES answers(id) ON DELETE CASCADE,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        -- Votes on doubts and answers
        CREATE TABLE IF NOT EXISTS votes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            voter_id INTEGER NOT NULL,
            target_type TEXT NOT NULL,
            target_id INTEGER NOT NULL,
            value INTEGER NOT NULL CHECK(value IN (-1, 1)),
            created_at TEXT DEFAULT (datetime('now')),
            UNIQUE(voter_id, target_type, target_id),
            FOREIGN KEY (voter_id) REFERENCES users(id) ON DELETE CASCADE
        );

        -- Cached progression counters, one row per user, created lazily
        CREATE TABLE IF NOT EXISTS user_stats (
            user_id INTEGER PRIMARY KEY,
            total_points INTEGER NOT NULL DEFAULT 0,
            current_level INTEGER NOT NULL DEFAULT 1,
            doubts_asked INTEGER NOT NULL DEFAULT 0,
            doubts_resolved INTEGER NOT NULL DEFAULT 0,
            answers_posted INTEGER NOT NULL DEFAULT 0,
            answers_accepted INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT DEFAULT (datetime('now')),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        -- Append-only audit trail for points and credit movement
        CREATE TABLE IF NOT EXISTS points_ledger (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            event_type TEXT NOT NULL,
            points INTEGER NOT NULL,
            description TEXT,
            created_at TEXT DEFAULT (datetime('now')),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        -- Daily-login streaks
        CREATE TABLE IF NOT EXISTS streaks (
            user_id INTEGER PRIMARY KEY,
            current_streak INTEGER NOT NULL,
            longest_streak INTEGER NOT NULL,
            last_activity_date TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        -- Recomputed progress toward locked achievements
        CREATE TABLE IF NOT EXISTS achievement_progress (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            achievement_key TEXT NOT NULL,
            current INTEGER NOT NULL DEFAULT 0,
            target INTEGER NOT NULL,
            updated_at TEXT DEFAULT (datetime('now')),
            UNIQUE(user_id, achievement_key),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        -- One row per unlock; the unique pair is the idempotency guard
        CREATE TABLE IF NOT EXISTS achievement_unlocks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            achievement_key TEXT NOT NULL,
            unlocked_at TEXT DEFAULT (datetime('now')),
            UNIQUE(user_id, achievement_key),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        -- Admin-conferred badges
        CREATE TABLE IF NOT EXISTS badge_grants (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            badge_key TEXT NOT NULL,
            granted_by INTEGER,
            created_at TEXT DEFAULT (datetime('now')),
            UNIQUE(user_id, badge_key),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (granted_by) REFERENCES users(id) ON DELETE SET NULL
        );

        -- Streak-earned discounts, one row per user and source
        CREATE TABLE IF NOT EXISTS user_discounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            source TEXT NOT NULL,
            discount_percent INTEGER NOT NULL,
            expires_at TEXT,
            created_at TEXT DEFAULT (datetime('now')),
            updated_at TEXT DEFAULT (datetime('now')),
            UNIQUE(user_id, source),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        -- Indexes
        CREATE INDEX IF NOT EXISTS idx_doubts_user ON doubts(user_id);
        CREATE INDEX IF NOT EXISTS idx_doubts_status ON doubts(status);
        CREATE INDEX IF NOT EXISTS idx_doubts_created ON doubts(created_at);
        CREATE INDEX IF NOT EXISTS idx_doubt_tags_tag ON doubt_tags(tag);
        CREATE INDEX IF NOT EXISTS idx_answers_doubt ON answers(doubt_id);
        CREATE INDEX IF NOT EXISTS idx_answers_user ON answers(user_id);
        CREATE INDEX IF NOT EXISTS idx_comments_answer ON comments(answer_id);
        CREATE INDEX IF NOT EXISTS idx_votes_target ON votes(target_type, target_id);
        CREATE INDEX IF NOT EXISTS idx_ledger_user ON points_ledger(user_id);
        CREATE INDEX IF NOT EXISTS idx_ledger_user_event ON points_ledger(user_id, event_type);
        CREATE INDEX IF NOT EXISTS idx_ledger_created ON points_ledger(created_at);
        CREATE INDEX IF NOT EXISTS idx_unlocks_user ON achievement_unlocks(user_id);
        CREATE INDEX IF NOT EXISTS idx_sessions_token ON sessions(token);
        CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);
        "#,
    )?;

    Ok(())
}
