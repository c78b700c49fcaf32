//! Achievement catalog and evaluator, plus the manually-granted badge set
//!
//! Progress is always recomputed from the authoritative counters rather than
//! incremented, so repeated evaluation cannot drift.

use std::collections::HashSet;

use rusqlite::{params, Connection};
use serde::Serialize;

use crate::engine::error::EngineError;
use crate::engine::progression::{self, AwardOptions};
use crate::engine::scoring::EventKind;

/// Counters an achievement criterion can read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterSource {
    DoubtsAsked,
    DoubtsResolved,
    AnswersPosted,
    AnswersAccepted,
    /// No counter feeds this yet; progress stays at zero
    PeersHelped,
}

/// Typed unlock criterion
#[derive(Debug, Clone, Copy)]
pub enum Criterion {
    Counter { source: CounterSource, target: i64 },
    Streak { days: i64 },
}

impl Criterion {
    pub fn target(&self) -> i64 {
        match self {
            Self::Counter { target, .. } => *target,
            Self::Streak { days } => *days,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Uncommon => "uncommon",
            Self::Rare => "rare",
            Self::Epic => "epic",
            Self::Legendary => "legendary",
        }
    }
}

/// Immutable catalog entry
#[derive(Debug, Clone, Copy)]
pub struct Achievement {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub rarity: Rarity,
    pub points: i64,
    pub criterion: Criterion,
}

/// The full achievement catalog
pub const CATALOG: &[Achievement] = &[
    Achievement {
        key: "first_doubt",
        name: "Curious Mind",
        description: "Ask your first doubt",
        rarity: Rarity::Common,
        points: 10,
        criterion: Criterion::Counter { source: CounterSource::DoubtsAsked, target: 1 },
    },
    Achievement {
        key: "doubts_10",
        name: "Question Everything",
        description: "Ask 10 doubts",
        rarity: Rarity::Uncommon,
        points: 25,
        criterion: Criterion::Counter { source: CounterSource::DoubtsAsked, target: 10 },
    },
    Achievement {
        key: "doubts_50",
        name: "Socratic Method",
        description: "Ask 50 doubts",
        rarity: Rarity::Rare,
        points: 100,
        criterion: Criterion::Counter { source: CounterSource::DoubtsAsked, target: 50 },
    },
    Achievement {
        key: "first_answer",
        name: "First Response",
        description: "Post your first answer",
        rarity: Rarity::Common,
        points: 10,
        criterion: Criterion::Counter { source: CounterSource::AnswersPosted, target: 1 },
    },
    Achievement {
        key: "answers_25",
        name: "Helping Hand",
        description: "Post 25 answers",
        rarity: Rarity::Uncommon,
        points: 50,
        criterion: Criterion::Counter { source: CounterSource::AnswersPosted, target: 25 },
    },
    Achievement {
        key: "answers_100",
        name: "Pillar of Knowledge",
        description: "Post 100 answers",
        rarity: Rarity::Epic,
        points: 200,
        criterion: Criterion::Counter { source: CounterSource::AnswersPosted, target: 100 },
    },
    Achievement {
        key: "accepted_10",
        name: "Trusted Voice",
        description: "Have 10 answers accepted",
        rarity: Rarity::Rare,
        points: 75,
        criterion: Criterion::Counter { source: CounterSource::AnswersAccepted, target: 10 },
    },
    Achievement {
        key: "accepted_50",
        name: "Oracle",
        description: "Have 50 answers accepted",
        rarity: Rarity::Legendary,
        points: 300,
        criterion: Criterion::Counter { source: CounterSource::AnswersAccepted, target: 50 },
    },
    Achievement {
        key: "resolved_5",
        name: "Closure",
        description: "Resolve 5 of your doubts",
        rarity: Rarity::Common,
        points: 20,
        criterion: Criterion::Counter { source: CounterSource::DoubtsResolved, target: 5 },
    },
    Achievement {
        key: "resolved_25",
        name: "Finisher",
        description: "Resolve 25 of your doubts",
        rarity: Rarity::Rare,
        points: 80,
        criterion: Criterion::Counter { source: CounterSource::DoubtsResolved, target: 25 },
    },
    Achievement {
        key: "streak_7",
        name: "Week of Wisdom",
        description: "Stay active 7 days in a row",
        rarity: Rarity::Uncommon,
        points: 30,
        criterion: Criterion::Streak { days: 7 },
    },
    Achievement {
        key: "streak_30",
        name: "Devoted Scholar",
        description: "Stay active 30 days in a row",
        rarity: Rarity::Rare,
        points: 100,
        criterion: Criterion::Streak { days: 30 },
    },
    Achievement {
        key: "streak_90",
        name: "Scholar's Oath",
        description: "Stay active 90 days in a row",
        rarity: Rarity::Legendary,
        points: 365,
        criterion: Criterion::Streak { days: 90 },
    },
    Achievement {
        key: "mentor",
        name: "Mentor",
        description: "Help 5 peers through their studies",
        rarity: Rarity::Epic,
        points: 150,
        criterion: Criterion::Counter { source: CounterSource::PeersHelped, target: 5 },
    },
];

pub fn achievement_by_key(key: &str) -> Option<&'static Achievement> {
    CATALOG.iter().find(|a| a.key == key)
}

/// Manually conferred badge
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Badge {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

/// Badges an admin can confer
pub const BADGES: &[Badge] = &[
    Badge {
        key: "deans_list",
        name: "Dean's List",
        description: "Recognized for exceptional contributions",
    },
    Badge {
        key: "founding_member",
        name: "Founding Member",
        description: "Joined during the community's first season",
    },
    Badge {
        key: "research_star",
        name: "Research Star",
        description: "Shared outstanding original research",
    },
    Badge {
        key: "community_pillar",
        name: "Community Pillar",
        description: "Holds the community together",
    },
];

pub fn badge_by_key(key: &str) -> Option<&'static Badge> {
    BADGES.iter().find(|b| b.key == key)
}

#[derive(Debug, Default)]
struct Counters {
    doubts_asked: i64,
    doubts_resolved: i64,
    answers_posted: i64,
    answers_accepted: i64,
    current_streak: i64,
}

/// Evaluate every locked achievement for the user, recording recomputed
/// progress and unlocking the ones whose target is now met. Returns the
/// names of newly unlocked achievements. Safe to call repeatedly; the
/// unique unlock row makes the bonus exactly-once.
pub fn check_achievements(
    conn: &Connection,
    user_id: i64,
    kind: EventKind,
) -> Result<Vec<&'static str>, EngineError> {
    let unlocked = load_unlocked(conn, user_id)?;
    let counters = load_counters(conn, user_id)?;

    let mut newly = Vec::new();
    for achievement in CATALOG {
        if unlocked.contains(achievement.key) {
            continue;
        }

        let current = match achievement.criterion {
            Criterion::Counter { source, .. } => counter_value(&counters, source),
            Criterion::Streak { .. } => counters.current_streak,
        };
        let target = achievement.criterion.target();

        conn.execute(
            r#"
            INSERT INTO achievement_progress (user_id, achievement_key, current, target)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id, achievement_key) DO UPDATE SET
                current = ?3,
                target = ?4,
                updated_at = datetime('now')
            "#,
            params![user_id, achievement.key, current, target],
        )?;

        if current >= target {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO achievement_unlocks (user_id, achievement_key) VALUES (?1, ?2)",
                params![user_id, achievement.key],
            )?;
            if inserted > 0 {
                progression::award_xp(
                    conn,
                    user_id,
                    EventKind::AchievementUnlocked,
                    &AwardOptions {
                        base_points: Some(achievement.points),
                        description: Some(format!("Achievement unlocked: {}", achievement.name)),
                        ..Default::default()
                    },
                )?;
                tracing::info!(
                    "User {} unlocked '{}' after {}",
                    user_id,
                    achievement.name,
                    kind.as_str()
                );
                newly.push(achievement.name);
            }
        }
    }

    Ok(newly)
}

fn load_unlocked(conn: &Connection, user_id: i64) -> Result<HashSet<String>, EngineError> {
    let mut stmt =
        conn.prepare("SELECT achievement_key FROM achievement_unlocks WHERE user_id = ?1")?;
    let keys = stmt
        .query_map(params![user_id], |row| row.get::<_, String>(0))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(keys)
}

fn load_counters(conn: &Connection, user_id: i64) -> Result<Counters, EngineError> {
    let mut counters = match conn.query_row(
        r#"
        SELECT doubts_asked, doubts_resolved, answers_posted, answers_accepted
        FROM user_stats WHERE user_id = ?1
        "#,
        params![user_id],
        |row| {
            Ok(Counters {
                doubts_asked: row.get(0)?,
                doubts_resolved: row.get(1)?,
                answers_posted: row.get(2)?,
                answers_accepted: row.get(3)?,
                current_streak: 0,
            })
        },
    ) {
        Ok(c) => c,
        Err(rusqlite::Error::QueryReturnedNoRows) => Counters::default(),
        Err(e) => return Err(e.into()),
    };

    counters.current_streak = match conn.query_row(
        "SELECT current_streak FROM streaks WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    ) {
        Ok(n) => n,
        Err(rusqlite::Error::QueryReturnedNoRows) => 0,
        Err(e) => return Err(e.into()),
    };

    Ok(counters)
}

fn counter_value(counters: &Counters, source: CounterSource) -> i64 {
    match source {
        CounterSource::DoubtsAsked => counters.doubts_asked,
        CounterSource::DoubtsResolved => counters.doubts_resolved,
        CounterSource::AnswersPosted => counters.answers_posted,
        CounterSource::AnswersAccepted => counters.answers_accepted,
        CounterSource::PeersHelped => 0,
    }
}
