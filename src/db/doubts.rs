//! Doubt, answer, comment, and vote management

use rusqlite::params;
use uuid::Uuid;

use crate::db::Database;
use crate::models::{Answer, Comment, Doubt, NewDoubt, VoteTarget};

impl Database {
    /// Create a new doubt with its tags
    pub fn create_doubt(&self, new_doubt: NewDoubt) -> anyhow::Result<Doubt> {
        let conn = self.conn();

        let uuid = Uuid::new_v4().to_string();
        conn.execute(
            r#"
            INSERT INTO doubts (uuid, user_id, title, body)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![uuid, new_doubt.user_id, new_doubt.title, new_doubt.body],
        )?;

        let doubt_id = conn.last_insert_rowid();

        for tag in &new_doubt.tags {
            let tag = tag.trim().to_lowercase();
            if tag.is_empty() {
                continue;
            }
            conn.execute(
                "INSERT OR IGNORE INTO doubt_tags (doubt_id, tag) VALUES (?1, ?2)",
                params![doubt_id, tag],
            )?;
        }

        drop(conn);
        self.get_doubt_by_id(doubt_id)
    }

    /// Get doubt by internal ID
    pub fn get_doubt_by_id(&self, id: i64) -> anyhow::Result<Doubt> {
        let conn = self.conn();

        let mut doubt = conn.query_row(
            r#"
            SELECT d.*, u.username as username, u.display_name as author_name,
                   (SELECT COUNT(*) FROM answers a WHERE a.doubt_id = d.id) as answer_count
            FROM doubts d
            JOIN users u ON d.user_id = u.id
            WHERE d.id = ?1
            "#,
            params![id],
            |row| Doubt::from_row(row),
        )?;

        doubt.tags = self.tags_for_doubt(&conn, id)?;
        Ok(doubt)
    }

    /// Get doubt by public UUID
    pub fn get_doubt_by_uuid(&self, uuid: &str) -> anyhow::Result<Option<Doubt>> {
        let conn = self.conn();

        let result = conn.query_row(
            r#"
            SELECT d.*, u.username as username, u.display_name as author_name,
                   (SELECT COUNT(*) FROM answers a WHERE a.doubt_id = d.id) as answer_count
            FROM doubts d
            JOIN users u ON d.user_id = u.id
            WHERE d.uuid = ?1
            "#,
            params![uuid],
            |row| Doubt::from_row(row),
        );

        match result {
            Ok(mut doubt) => {
                doubt.tags = self.tags_for_doubt(&conn, doubt.id)?;
                Ok(Some(doubt))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn tags_for_doubt(&self, conn: &rusqlite::Connection, doubt_id: i64) -> anyhow::Result<Vec<String>> {
        let mut stmt = conn.prepare("SELECT tag FROM doubt_tags WHERE doubt_id = ?1 ORDER BY tag")?;
        let tags = stmt
            .query_map(params![doubt_id], |row| row.get(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(tags)
    }

    /// Count a view
    pub fn record_view(&self, doubt_id: i64) -> anyhow::Result<()> {
        let conn = self.conn();
        conn.execute(
            "UPDATE doubts SET view_count = view_count + 1 WHERE id = ?1",
            params![doubt_id],
        )?;
        Ok(())
    }

    /// Most recent doubts
    pub fn list_recent_doubts(&self, limit: u32, offset: u32) -> anyhow::Result<Vec<Doubt>> {
        let conn = self.conn();

        let mut stmt = conn.prepare(
            r#"
            SELECT d.*, u.username as username, u.display_name as author_name,
                   (SELECT COUNT(*) FROM answers a WHERE a.doubt_id = d.id) as answer_count
            FROM doubts d
            JOIN users u ON d.user_id = u.id
            ORDER BY d.created_at DESC
            LIMIT ?1 OFFSET ?2
            "#,
        )?;

        let doubts: Vec<Doubt> = stmt
            .query_map(params![limit, offset], |row| Doubt::from_row(row))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(doubts)
    }

    /// Open doubts with no answers yet
    pub fn list_unanswered_doubts(&self, limit: u32) -> anyhow::Result<Vec<Doubt>> {
        let conn = self.conn();

        let mut stmt = conn.prepare(
            r#"
            SELECT d.*, u.username as username, u.display_name as author_name,
                   0 as answer_count
            FROM doubts d
            JOIN users u ON d.user_id = u.id
            WHERE d.status = 'open'
              AND NOT EXISTS (SELECT 1 FROM answers a WHERE a.doubt_id = d.id)
            ORDER BY d.created_at DESC
            LIMIT ?1
            "#,
        )?;

        let doubts: Vec<Doubt> = stmt
            .query_map(params![limit], |row| Doubt::from_row(row))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(doubts)
    }

    /// Doubts asked by a user
    pub fn get_doubts_by_user(&self, user_id: i64, limit: u32, offset: u32) -> anyhow::Result<Vec<Doubt>> {
        let conn = self.conn();

        let mut stmt = conn.prepare(
            r#"
            SELECT d.*, u.username as username, u.display_name as author_name,
                   (SELECT COUNT(*) FROM answers a WHERE a.doubt_id = d.id) as answer_count
            FROM doubts d
            JOIN users u ON d.user_id = u.id
            WHERE d.user_id = ?1
            ORDER BY d.created_at DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )?;

        let doubts: Vec<Doubt> = stmt
            .query_map(params![user_id, limit, offset], |row| Doubt::from_row(row))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(doubts)
    }

    /// Doubts carrying a tag
    pub fn list_doubts_by_tag(&self, tag: &str, limit: u32) -> anyhow::Result<Vec<Doubt>> {
        let conn = self.conn();

        let mut stmt = conn.prepare(
            r#"
            SELECT d.*, u.username as username, u.display_name as author_name,
                   (SELECT COUNT(*) FROM answers a WHERE a.doubt_id = d.id) as answer_count
            FROM doubts d
            JOIN users u ON d.user_id = u.id
            JOIN doubt_tags t ON t.doubt_id = d.id
            WHERE t.tag = ?1
            ORDER BY d.created_at DESC
            LIMIT ?2
            "#,
        )?;

        let doubts: Vec<Doubt> = stmt
            .query_map(params![tag.to_lowercase(), limit], |row| Doubt::from_row(row))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(doubts)
    }

    /// All tags with usage counts
    pub fn get_tags(&self) -> anyhow::Result<Vec<(String, i64)>> {
        let conn = self.conn();

        let mut stmt = conn.prepare(
            "SELECT tag, COUNT(*) as count FROM doubt_tags GROUP BY tag ORDER BY count DESC, tag ASC",
        )?;

        let tags = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(tags)
    }

    // =========================================================================
    // Answers & comments
    // =========================================================================

    /// Post an answer to a doubt
    pub fn create_answer(&self, doubt_id: i64, user_id: i64, body: &str, ai_assisted: bool) -> anyhow::Result<Answer> {
        let conn = self.conn();

        conn.execute(
            r#"
            INSERT INTO answers (doubt_id, user_id, body, is_ai_assisted)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![doubt_id, user_id, body, ai_assisted as i64],
        )?;

        let answer_id = conn.last_insert_rowid();
        drop(conn);
        self.get_answer_by_id(answer_id)?
            .ok_or_else(|| anyhow::anyhow!("answer {} vanished after insert", answer_id))
    }

    /// Get answer by ID
    pub fn get_answer_by_id(&self, id: i64) -> anyhow::Result<Option<Answer>> {
        let conn = self.conn();

        let result = conn.query_row(
            r#"
            SELECT a.*, u.username as username, u.display_name as author_name
            FROM answers a
            JOIN users u ON a.user_id = u.id
            WHERE a.id = ?1
            "#,
            params![id],
            |row| Answer::from_row(row),
        );

        match result {
            Ok(answer) => Ok(Some(answer)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Answers for a doubt, accepted first, then by votes
    pub fn answers_for_doubt(&self, doubt_id: i64) -> anyhow::Result<Vec<Answer>> {
        let conn = self.conn();

        let mut stmt = conn.prepare(
            r#"
            SELECT a.*, u.username as username, u.display_name as author_name
            FROM answers a
            JOIN users u ON a.user_id = u.id
            WHERE a.doubt_id = ?1
            ORDER BY a.is_accepted DESC, (a.upvotes - a.downvotes) DESC, a.created_at ASC
            "#,
        )?;

        let answers: Vec<Answer> = stmt
            .query_map(params![doubt_id], |row| Answer::from_row(row))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(answers)
    }

    /// Mark an answer accepted and its doubt resolved
    pub fn accept_answer(&self, doubt_id: i64, answer_id: i64) -> anyhow::Result<()> {
        let conn = self.conn();

        conn.execute(
            "UPDATE answers SET is_accepted = 1 WHERE id = ?1 AND doubt_id = ?2",
            params![answer_id, doubt_id],
        )?;

        conn.execute(
            r#"
            UPDATE doubts
            SET status = 'resolved', accepted_answer_id = ?1, updated_at = datetime('now')
            WHERE id = ?2
            "#,
            params![answer_id, doubt_id],
        )?;

        Ok(())
    }

    /// Comment on an answer
    pub fn create_comment(&self, answer_id: i64, user_id: i64, body: &str) -> anyhow::Result<Comment> {
        let conn = self.conn();

        conn.execute(
            "INSERT INTO comments (answer_id, user_id, body) VALUES (?1, ?2, ?3)",
            params![answer_id, user_id, body],
        )?;

        let comment_id = conn.last_insert_rowid();

        let comment = conn.query_row(
            r#"
            SELECT c.*, u.username as username
            FROM comments c
            JOIN users u ON c.user_id = u.id
            WHERE c.id = ?1
            "#,
            params![comment_id],
            |row| Comment::from_row(row),
        )?;

        Ok(comment)
    }

    /// Comments on an answer, oldest first
    pub fn comments_for_answer(&self, answer_id: i64) -> anyhow::Result<Vec<Comment>> {
        let conn = self.conn();

        let mut stmt = conn.prepare(
            r#"
            SELECT c.*, u.username as username
            FROM comments c
            JOIN users u ON c.user_id = u.id
            WHERE c.answer_id = ?1
            ORDER BY c.created_at ASC
            "#,
        )?;

        let comments: Vec<Comment> = stmt
            .query_map(params![answer_id], |row| Comment::from_row(row))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(comments)
    }

    // =========================================================================
    // Votes
    // =========================================================================

    /// Record a vote and apply its side effects. Returns the author of the
    /// voted content. A second vote on the same target hits the unique
    /// constraint and surfaces as an error for the handler to map.
    pub fn cast_vote(&self, voter_id: i64, target: VoteTarget, target_id: i64, value: i64) -> anyhow::Result<i64> {
        let conn = self.conn();

        let author_id: i64 = match target {
            VoteTarget::Doubt => conn.query_row(
                "SELECT user_id FROM doubts WHERE id = ?1",
                params![target_id],
                |row| row.get(0),
            )?,
            VoteTarget::Answer => conn.query_row(
                "SELECT user_id FROM answers WHERE id = ?1",
                params![target_id],
                |row| row.get(0),
            )?,
        };

        conn.execute(
            "INSERT INTO votes (voter_id, target_type, target_id, value) VALUES (?1, ?2, ?3, ?4)",
            params![voter_id, target.as_str(), target_id, value],
        )?;

        // Update vote counts on the target
        let table = match target {
            VoteTarget::Doubt => "doubts",
            VoteTarget::Answer => "answers",
        };
        if value > 0 {
            conn.execute(
                &format!("UPDATE {} SET upvotes = upvotes + 1 WHERE id = ?1", table),
                params![target_id],
            )?;
        } else {
            conn.execute(
                &format!("UPDATE {} SET downvotes = downvotes + 1 WHERE id = ?1", table),
                params![target_id],
            )?;
        }

        // Votes move the author's reputation, floored at zero
        let delta = if value > 0 { 5 } else { -2 };
        conn.execute(
            "UPDATE users SET reputation = MAX(0, reputation + ?1) WHERE id = ?2",
            params![delta, author_id],
        )?;

        Ok(author_id)
    }
}
