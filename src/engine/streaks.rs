//! Daily-activity streaks: day-granularity state machine plus the
//! scholar's-oath discount rule

use chrono::{Duration, NaiveDate, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::engine::error::EngineError;
use crate::engine::progression::{self, AwardOptions};
use crate::engine::scoring::EventKind;

/// Every fifth consecutive day pays a bonus
pub const MILESTONE_INTERVAL: i64 = 5;

/// Streak length that earns the permanent oath discount
pub const OATH_PERMANENT_DAYS: i64 = 90;

/// Streak length that earns the expiring oath discount
pub const OATH_TRIAL_DAYS: i64 = 30;

/// Discount source key in user_discounts
pub const OATH_SOURCE: &str = "scholars_oath";

#[derive(Debug, Clone, Serialize)]
pub struct StreakState {
    pub current_streak: i64,
    pub longest_streak: i64,
    pub last_activity_date: String,
}

/// Advance the user's streak for today (UTC). Same-day calls are no-ops; a
/// one-day gap increments; anything longer resets to 1 with the longest
/// streak preserved. Milestone bonuses and the oath discount are applied on
/// the incrementing transition only.
pub fn update_streak(conn: &Connection, user_id: i64) -> Result<StreakState, EngineError> {
    let today = Utc::now().date_naive();

    let existing: Option<(i64, i64, String)> = match conn.query_row(
        "SELECT current_streak, longest_streak, last_activity_date FROM streaks WHERE user_id = ?1",
        params![user_id],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    ) {
        Ok(row) => Some(row),
        Err(rusqlite::Error::QueryReturnedNoRows) => None,
        Err(e) => return Err(e.into()),
    };

    let state = match existing {
        None => {
            conn.execute(
                "INSERT INTO streaks (user_id, current_streak, longest_streak, last_activity_date) VALUES (?1, 1, 1, ?2)",
                params![user_id, today.to_string()],
            )?;
            StreakState {
                current_streak: 1,
                longest_streak: 1,
                last_activity_date: today.to_string(),
            }
        }
        Some((current, longest, last)) => {
            let last_date = NaiveDate::parse_from_str(&last, "%Y-%m-%d").map_err(|e| {
                EngineError::Invariant(format!(
                    "unreadable streak date {:?} for user {}: {}",
                    last, user_id, e
                ))
            })?;

            if last_date == today {
                StreakState {
                    current_streak: current,
                    longest_streak: longest,
                    last_activity_date: last,
                }
            } else if (today - last_date) == Duration::days(1) {
                let current = current + 1;
                let longest = longest.max(current);
                conn.execute(
                    "UPDATE streaks SET current_streak = ?1, longest_streak = ?2, last_activity_date = ?3 WHERE user_id = ?4",
                    params![current, longest, today.to_string(), user_id],
                )?;

                if current % MILESTONE_INTERVAL == 0 {
                    progression::award_xp(
                        conn,
                        user_id,
                        EventKind::StreakBonus,
                        &AwardOptions {
                            description: Some(format!("{}-day streak bonus", current)),
                            ..Default::default()
                        },
                    )?;
                }

                grant_oath_discount(conn, user_id, current)?;

                StreakState {
                    current_streak: current,
                    longest_streak: longest,
                    last_activity_date: today.to_string(),
                }
            } else {
                // Gap: back to day one, longest untouched
                conn.execute(
                    "UPDATE streaks SET current_streak = 1, last_activity_date = ?1 WHERE user_id = ?2",
                    params![today.to_string(), user_id],
                )?;
                StreakState {
                    current_streak: 1,
                    longest_streak: longest,
                    last_activity_date: today.to_string(),
                }
            }
        }
    };

    if state.current_streak > state.longest_streak {
        return Err(EngineError::Invariant(format!(
            "streak {} exceeds longest {} for user {}",
            state.current_streak, state.longest_streak, user_id
        )));
    }

    Ok(state)
}

/// Current streak state without advancing it
pub fn get_streak(conn: &Connection, user_id: i64) -> Result<StreakState, EngineError> {
    match conn.query_row(
        "SELECT current_streak, longest_streak, last_activity_date FROM streaks WHERE user_id = ?1",
        params![user_id],
        |row| {
            Ok(StreakState {
                current_streak: row.get(0)?,
                longest_streak: row.get(1)?,
                last_activity_date: row.get(2)?,
            })
        },
    ) {
        Ok(state) => Ok(state),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(StreakState {
            current_streak: 0,
            longest_streak: 0,
            last_activity_date: String::new(),
        }),
        Err(e) => Err(e.into()),
    }
}

/// Long streaks earn a subscription discount: 90 days makes it permanent,
/// 30 days grants a 10% rate that lapses by expiry only. Shorter streaks
/// never touch an existing grant, and a rebuilt streak never lowers one:
/// the upsert writes only at an equal or higher tier.
fn grant_oath_discount(conn: &Connection, user_id: i64, streak: i64) -> Result<(), EngineError> {
    let (percent, expiry_sql) = if streak >= OATH_PERMANENT_DAYS {
        (20, "NULL")
    } else if streak >= OATH_TRIAL_DAYS {
        (10, "datetime('now', '+60 days')")
    } else {
        return Ok(());
    };

    // Expiry expressions come from the closed tier mapping, never from input
    let changed = conn.execute(
        &format!(
            r#"
            INSERT INTO user_discounts (user_id, source, discount_percent, expires_at)
            VALUES (?1, ?2, ?3, {expiry})
            ON CONFLICT(user_id, source) DO UPDATE SET
                discount_percent = excluded.discount_percent,
                expires_at = excluded.expires_at,
                updated_at = datetime('now')
            WHERE excluded.discount_percent >= user_discounts.discount_percent
            "#,
            expiry = expiry_sql
        ),
        params![user_id, OATH_SOURCE, percent],
    )?;

    if changed > 0 {
        tracing::info!(
            "Scholar's oath: {}% discount for user {} at a {}-day streak",
            percent,
            user_id,
            streak
        );
    }
    Ok(())
}
