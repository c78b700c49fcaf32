//! Progression engine: XP awards, levels and tiers, streaks, achievements,
//! badges, and the credit economy
//!
//! Every public method here runs as one transaction against the database;
//! the step functions in the submodules operate on the borrowed connection
//! and never commit on their own. The engine keeps no state of its own, so
//! per-user correctness comes entirely from the store serializing writers.

pub mod achievements;
pub mod credits;
pub mod error;
pub mod progression;
pub mod scoring;
pub mod streaks;

use rusqlite::params;
use serde::Serialize;

use crate::db::Database;

pub use achievements::{Achievement, Badge, Criterion, Rarity, BADGES, CATALOG};
pub use credits::DAILY_LOGIN_CREDIT;
pub use error::EngineError;
pub use progression::{AwardOptions, AwardOutcome};
pub use scoring::EventKind;
pub use streaks::StreakState;

/// Result of an actor-driven event: the award plus the streak and
/// achievement follow-ups that ran in the same transaction
#[derive(Debug, Serialize)]
pub struct ActivitySummary {
    pub award: AwardOutcome,
    pub streak: StreakState,
    pub unlocked: Vec<&'static str>,
}

/// Result of a recognition event (votes received, answer accepted):
/// awards and achievements, but the recipient's streak is untouched
#[derive(Debug, Serialize)]
pub struct RecognitionSummary {
    pub award: AwardOutcome,
    pub unlocked: Vec<&'static str>,
}

/// Leaderboard window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Weekly,
    Monthly,
    AllTime,
}

impl Period {
    /// Unrecognized or missing values fall back to the all-time ranking
    pub fn parse(s: Option<&str>) -> Self {
        match s {
            Some("weekly") => Self::Weekly,
            Some("monthly") => Self::Monthly,
            _ => Self::AllTime,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::AllTime => "all_time",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub user_id: i64,
    pub name: String,
    pub image: Option<String>,
    pub tier: String,
    pub total_points: i64,
}

/// One catalog entry with the user's progress folded in
#[derive(Debug, Clone, Serialize)]
pub struct AchievementStatus {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub rarity: Rarity,
    pub points: i64,
    pub current: i64,
    pub target: i64,
    pub unlocked: bool,
    pub unlocked_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub event_type: String,
    pub points: i64,
    pub description: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Discount {
    pub source: String,
    pub discount_percent: i64,
    pub expires_at: Option<String>,
}

/// Combined progression snapshot for profile pages
#[derive(Debug, Clone, Serialize)]
pub struct UserProgress {
    pub user_id: i64,
    pub total_points: i64,
    pub level: i64,
    pub tier: String,
    pub xp_for_current_level: i64,
    pub xp_for_next_level: i64,
    pub credits: i64,
    pub reputation: i64,
    pub doubts_asked: i64,
    pub doubts_resolved: i64,
    pub answers_posted: i64,
    pub answers_accepted: i64,
    pub current_streak: i64,
    pub longest_streak: i64,
    pub achievements_unlocked: i64,
}

const LEADERBOARD_SIZE: i64 = 20;

impl Database {
    /// Award points for one event
    pub fn award_xp(
        &self,
        user_id: i64,
        kind: EventKind,
        opts: AwardOptions,
    ) -> Result<AwardOutcome, EngineError> {
        self.transaction(|tx| progression::award_xp(tx, user_id, kind, &opts))
    }

    /// Award for an action the user performed, then advance their streak and
    /// re-evaluate achievements, all in one transaction
    pub fn record_activity(
        &self,
        user_id: i64,
        kind: EventKind,
        opts: AwardOptions,
    ) -> Result<ActivitySummary, EngineError> {
        self.transaction(|tx| {
            let award = progression::award_xp(tx, user_id, kind, &opts)?;
            let streak = streaks::update_streak(tx, user_id)?;
            let unlocked = achievements::check_achievements(tx, user_id, kind)?;
            Ok(ActivitySummary {
                award,
                streak,
                unlocked,
            })
        })
    }

    /// Award for recognition the user received (their streak is their own
    /// doing and does not move here)
    pub fn record_recognition(
        &self,
        user_id: i64,
        kind: EventKind,
        opts: AwardOptions,
    ) -> Result<RecognitionSummary, EngineError> {
        self.transaction(|tx| {
            let award = progression::award_xp(tx, user_id, kind, &opts)?;
            let unlocked = achievements::check_achievements(tx, user_id, kind)?;
            Ok(RecognitionSummary { award, unlocked })
        })
    }

    /// First call per UTC day awards the login bonus (points plus one
    /// credit) and advances the streak; later calls return None
    pub fn check_daily_login(&self, user_id: i64) -> Result<Option<ActivitySummary>, EngineError> {
        self.transaction(|tx| {
            if progression::has_logged_today(tx, user_id)? {
                return Ok(None);
            }
            let award =
                progression::award_xp(tx, user_id, EventKind::DailyLogin, &AwardOptions::default())?;
            let streak = streaks::update_streak(tx, user_id)?;
            let unlocked =
                achievements::check_achievements(tx, user_id, EventKind::DailyLogin)?;
            Ok(Some(ActivitySummary {
                award,
                streak,
                unlocked,
            }))
        })
    }

    /// Advance the streak for today without awarding anything else
    pub fn update_streak(&self, user_id: i64) -> Result<StreakState, EngineError> {
        self.transaction(|tx| streaks::update_streak(tx, user_id))
    }

    /// Re-evaluate all locked achievements for the user
    pub fn check_achievements(
        &self,
        user_id: i64,
        kind: EventKind,
    ) -> Result<Vec<&'static str>, EngineError> {
        self.transaction(|tx| achievements::check_achievements(tx, user_id, kind))
    }

    /// Spend credits; the balance never goes below zero
    pub fn deduct_credits(
        &self,
        user_id: i64,
        amount: i64,
        description: &str,
    ) -> Result<i64, EngineError> {
        self.transaction(|tx| credits::deduct_credits(tx, user_id, amount, description))
    }

    /// Manually add credits to a user's balance
    pub fn grant_credits(
        &self,
        user_id: i64,
        amount: i64,
        description: &str,
    ) -> Result<i64, EngineError> {
        self.transaction(|tx| credits::grant_credits(tx, user_id, amount, description))
    }

    /// Confer a badge on a user. Returns false when they already hold it.
    pub fn grant_badge(
        &self,
        user_id: i64,
        badge_key: &str,
        granted_by: Option<i64>,
    ) -> Result<bool, EngineError> {
        let badge = achievements::badge_by_key(badge_key).ok_or_else(|| {
            EngineError::Invariant(format!("unknown badge key {:?}", badge_key))
        })?;

        self.transaction(|tx| {
            // Establishes the user exists before any insert
            credits::current_balance(tx, user_id)?;

            let inserted = tx.execute(
                "INSERT OR IGNORE INTO badge_grants (user_id, badge_key, granted_by) VALUES (?1, ?2, ?3)",
                params![user_id, badge.key, granted_by],
            )?;
            if inserted == 0 {
                return Ok(false);
            }

            progression::award_xp(
                tx,
                user_id,
                EventKind::BadgeEarned,
                &AwardOptions {
                    description: Some(format!("Badge earned: {}", badge.name)),
                    ..Default::default()
                },
            )?;
            tracing::info!("User {} was granted the '{}' badge", user_id, badge.name);
            Ok(true)
        })
    }

    /// Top users by points, descending. Weekly and monthly windows aggregate
    /// earn rows from the ledger; all-time reads the cached stat totals.
    pub fn leaderboard(&self, period: Period) -> Result<Vec<LeaderboardEntry>, EngineError> {
        let conn = self.conn();

        let map_row = |row: &rusqlite::Row| -> rusqlite::Result<LeaderboardEntry> {
            Ok(LeaderboardEntry {
                user_id: row.get(0)?,
                name: row.get(1)?,
                image: row.get(2)?,
                tier: row.get(3)?,
                total_points: row.get(4)?,
            })
        };

        let entries = match period {
            Period::AllTime => {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT u.id, COALESCE(u.display_name, u.username), u.avatar_url, u.tier,
                           s.total_points
                    FROM user_stats s
                    JOIN users u ON s.user_id = u.id
                    ORDER BY s.total_points DESC, u.id ASC
                    LIMIT ?1
                    "#,
                )?;
                let rows = stmt.query_map(params![LEADERBOARD_SIZE], map_row)?;
                rows.filter_map(|r| r.ok()).collect()
            }
            Period::Weekly | Period::Monthly => {
                let window = match period {
                    Period::Weekly => "-7 days",
                    _ => "-30 days",
                };
                let mut stmt = conn.prepare(
                    r#"
                    SELECT u.id, COALESCE(u.display_name, u.username), u.avatar_url, u.tier,
                           SUM(l.points) AS window_points
                    FROM points_ledger l
                    JOIN users u ON l.user_id = u.id
                    WHERE l.created_at >= datetime('now', ?1)
                      AND l.event_type NOT IN ('CREDITS_SPENT', 'CREDITS_GRANTED')
                    GROUP BY u.id
                    ORDER BY window_points DESC, u.id ASC
                    LIMIT ?2
                    "#,
                )?;
                let rows = stmt.query_map(params![window, LEADERBOARD_SIZE], map_row)?;
                rows.filter_map(|r| r.ok()).collect()
            }
        };

        Ok(entries)
    }

    /// Progression snapshot for a profile or dashboard
    pub fn user_progress(&self, user_id: i64) -> Result<UserProgress, EngineError> {
        let conn = self.conn();

        let (credits, reputation, tier): (i64, i64, String) = conn
            .query_row(
                "SELECT credits, reputation, tier FROM users WHERE id = ?1",
                params![user_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => EngineError::UserNotFound(user_id),
                other => EngineError::Storage(other),
            })?;

        let (total_points, level, doubts_asked, doubts_resolved, answers_posted, answers_accepted) =
            match conn.query_row(
                r#"
                SELECT total_points, current_level, doubts_asked, doubts_resolved,
                       answers_posted, answers_accepted
                FROM user_stats WHERE user_id = ?1
                "#,
                params![user_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, i64>(5)?,
                    ))
                },
            ) {
                Ok(row) => row,
                Err(rusqlite::Error::QueryReturnedNoRows) => (0, 1, 0, 0, 0, 0),
                Err(e) => return Err(e.into()),
            };

        let streak = streaks::get_streak(&conn, user_id)?;

        let achievements_unlocked: i64 = conn.query_row(
            "SELECT COUNT(*) FROM achievement_unlocks WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;

        Ok(UserProgress {
            user_id,
            total_points,
            level,
            tier,
            xp_for_current_level: scoring::xp_for_level(level),
            xp_for_next_level: scoring::xp_for_level(level + 1),
            credits,
            reputation,
            doubts_asked,
            doubts_resolved,
            answers_posted,
            answers_accepted,
            current_streak: streak.current_streak,
            longest_streak: streak.longest_streak,
            achievements_unlocked,
        })
    }

    /// The whole catalog annotated with this user's progress and unlocks
    pub fn achievement_report(&self, user_id: i64) -> Result<Vec<AchievementStatus>, EngineError> {
        let conn = self.conn();

        let mut progress_stmt = conn.prepare(
            "SELECT achievement_key, current FROM achievement_progress WHERE user_id = ?1",
        )?;
        let progress: std::collections::HashMap<String, i64> = progress_stmt
            .query_map(params![user_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .filter_map(|r| r.ok())
            .collect();

        let mut unlock_stmt = conn.prepare(
            "SELECT achievement_key, unlocked_at FROM achievement_unlocks WHERE user_id = ?1",
        )?;
        let unlocks: std::collections::HashMap<String, String> = unlock_stmt
            .query_map(params![user_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .filter_map(|r| r.ok())
            .collect();

        let report = CATALOG
            .iter()
            .map(|a| {
                let target = a.criterion.target();
                let unlocked_at = unlocks.get(a.key).cloned();
                let current = if unlocked_at.is_some() {
                    target
                } else {
                    progress.get(a.key).copied().unwrap_or(0)
                };
                AchievementStatus {
                    key: a.key,
                    name: a.name,
                    description: a.description,
                    rarity: a.rarity,
                    points: a.points,
                    current,
                    target,
                    unlocked: unlocked_at.is_some(),
                    unlocked_at,
                }
            })
            .collect();

        Ok(report)
    }

    /// Current streak without advancing it
    pub fn get_streak(&self, user_id: i64) -> Result<StreakState, EngineError> {
        let conn = self.conn();
        streaks::get_streak(&conn, user_id)
    }

    /// Page through a user's ledger, newest first
    pub fn ledger_page(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LedgerEntry>, EngineError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, event_type, points, description, created_at
            FROM points_ledger
            WHERE user_id = ?1
            ORDER BY id DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )?;
        let entries = stmt
            .query_map(params![user_id, limit, offset], |row| {
                Ok(LedgerEntry {
                    id: row.get(0)?,
                    event_type: row.get(1)?,
                    points: row.get(2)?,
                    description: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(entries)
    }

    /// The user's unexpired scholar's-oath discount, if any
    pub fn active_discount(&self, user_id: i64) -> Result<Option<Discount>, EngineError> {
        let conn = self.conn();
        match conn.query_row(
            r#"
            SELECT source, discount_percent, expires_at
            FROM user_discounts
            WHERE user_id = ?1 AND source = ?2
              AND (expires_at IS NULL OR expires_at > datetime('now'))
            "#,
            params![user_id, streaks::OATH_SOURCE],
            |row| {
                Ok(Discount {
                    source: row.get(0)?,
                    discount_percent: row.get(1)?,
                    expires_at: row.get(2)?,
                })
            },
        ) {
            Ok(d) => Ok(Some(d)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
