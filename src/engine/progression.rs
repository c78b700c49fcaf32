//! Point awards: multiplier math, ledger writes, level and tier transitions

use rusqlite::{params, Connection};
use serde::Serialize;

use crate::engine::credits;
use crate::engine::error::EngineError;
use crate::engine::scoring::{self, EventKind};

/// Optional context for an award
#[derive(Debug, Clone, Default)]
pub struct AwardOptions {
    /// AI-assisted work earns the lower rigor multiplier
    pub ai_assisted: bool,
    /// Ledger description; defaults to the event kind's standard text
    pub description: Option<String>,
    /// Overrides the kind's base value (achievement bonuses carry their own)
    pub base_points: Option<i64>,
}

/// What an award did to the user's progression
#[derive(Debug, Clone, Serialize)]
pub struct AwardOutcome {
    pub points: i64,
    pub total_points: i64,
    pub level: i64,
    pub tier: &'static str,
    pub leveled_up: bool,
}

/// Award points for one event. Reads reputation, applies both multipliers,
/// appends the ledger row, updates the stat row, and moves level/tier when a
/// boundary was crossed. Callers wrap this in a transaction; a missing user
/// fails the whole call with no partial writes.
pub fn award_xp(
    conn: &Connection,
    user_id: i64,
    kind: EventKind,
    opts: &AwardOptions,
) -> Result<AwardOutcome, EngineError> {
    let reputation = lookup_reputation(conn, user_id)?;

    let base = opts.base_points.unwrap_or_else(|| kind.base_points());
    let points = scoring::compute_points(base, opts.ai_assisted, reputation);
    let description = opts
        .description
        .clone()
        .unwrap_or_else(|| kind.describe().to_string());

    conn.execute(
        "INSERT INTO points_ledger (user_id, event_type, points, description) VALUES (?1, ?2, ?3, ?4)",
        params![user_id, kind.as_str(), points, description],
    )?;

    conn.execute(
        r#"
        INSERT INTO user_stats (user_id, total_points) VALUES (?1, ?2)
        ON CONFLICT(user_id) DO UPDATE SET
            total_points = total_points + ?2,
            updated_at = datetime('now')
        "#,
        params![user_id, points],
    )?;

    if let Some(column) = kind.stat_column() {
        // Column names come from the closed kind mapping, never from input
        conn.execute(
            &format!(
                "UPDATE user_stats SET {col} = {col} + 1 WHERE user_id = ?1",
                col = column
            ),
            params![user_id],
        )?;
    }

    let (total_points, previous_level): (i64, i64) = conn.query_row(
        "SELECT total_points, current_level FROM user_stats WHERE user_id = ?1",
        params![user_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let level = scoring::level_for_points(total_points);
    if points >= 0 && level < previous_level {
        return Err(EngineError::Invariant(format!(
            "level regressed from {} to {} for user {} on a non-negative award",
            previous_level, level, user_id
        )));
    }

    let tier = scoring::tier_for_level(level);
    let leveled_up = level > previous_level;
    if level != previous_level {
        conn.execute(
            "UPDATE user_stats SET current_level = ?1 WHERE user_id = ?2",
            params![level, user_id],
        )?;
        conn.execute(
            "UPDATE users SET tier = ?1 WHERE id = ?2",
            params![tier, user_id],
        )?;
        if leveled_up {
            tracing::info!("User {} reached level {} ({})", user_id, level, tier);
        }
    }

    // Login bonus also mints a credit
    if kind == EventKind::DailyLogin {
        credits::apply_credit_delta(conn, user_id, credits::DAILY_LOGIN_CREDIT)?;
    }

    tracing::debug!(
        "Awarded {} points to user {} for {}",
        points,
        user_id,
        kind.as_str()
    );

    Ok(AwardOutcome {
        points,
        total_points,
        level,
        tier,
        leveled_up,
    })
}

/// Whether a daily-login award was already recorded today (UTC)
pub fn has_logged_today(conn: &Connection, user_id: i64) -> Result<bool, EngineError> {
    let count: i64 = conn.query_row(
        r#"
        SELECT COUNT(*) FROM points_ledger
        WHERE user_id = ?1 AND event_type = ?2 AND date(created_at) = date('now')
        "#,
        params![user_id, EventKind::DailyLogin.as_str()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn lookup_reputation(conn: &Connection, user_id: i64) -> Result<i64, EngineError> {
    conn.query_row(
        "SELECT reputation FROM users WHERE id = ?1",
        params![user_id],
        |row| row.get(0),
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => EngineError::UserNotFound(user_id),
        other => EngineError::Storage(other),
    })
}
