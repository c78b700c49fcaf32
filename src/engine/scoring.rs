//! Scoring policy: event kinds, base point values, and the level/tier curve

use serde::{Deserialize, Serialize};

/// Cumulative points needed for level 2
pub const LEVEL_BASE_XP: f64 = 100.0;

/// Geometric growth factor between levels
pub const LEVEL_GROWTH: f64 = 1.5;

/// Everything that can earn (or cost) points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    DoubtCreated,
    AnswerPosted,
    CommentPosted,
    UpvoteReceived,
    DownvoteReceived,
    AnswerAccepted,
    DoubtResolved,
    DailyLogin,
    StreakBonus,
    AchievementUnlocked,
    BadgeEarned,
}

impl EventKind {
    /// Ledger name for this event
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DoubtCreated => "DOUBT_CREATED",
            Self::AnswerPosted => "ANSWER_POSTED",
            Self::CommentPosted => "COMMENT_POSTED",
            Self::UpvoteReceived => "UPVOTE_RECEIVED",
            Self::DownvoteReceived => "DOWNVOTE_RECEIVED",
            Self::AnswerAccepted => "ANSWER_ACCEPTED",
            Self::DoubtResolved => "DOUBT_RESOLVED",
            Self::DailyLogin => "DAILY_LOGIN",
            Self::StreakBonus => "STREAK_BONUS",
            Self::AchievementUnlocked => "ACHIEVEMENT_UNLOCKED",
            Self::BadgeEarned => "BADGE_EARNED",
        }
    }

    /// Base point value before multipliers
    pub fn base_points(&self) -> i64 {
        match self {
            Self::DoubtCreated => 10,
            Self::AnswerPosted => 15,
            Self::CommentPosted => 2,
            Self::UpvoteReceived => 5,
            Self::DownvoteReceived => -2,
            Self::AnswerAccepted => 50,
            Self::DoubtResolved => 20,
            Self::DailyLogin => 5,
            Self::StreakBonus => 25,
            Self::AchievementUnlocked => 25,
            Self::BadgeEarned => 15,
        }
    }

    /// Default ledger description
    pub fn describe(&self) -> &'static str {
        match self {
            Self::DoubtCreated => "Asked a doubt",
            Self::AnswerPosted => "Posted an answer",
            Self::CommentPosted => "Posted a comment",
            Self::UpvoteReceived => "Received an upvote",
            Self::DownvoteReceived => "Received a downvote",
            Self::AnswerAccepted => "Answer was accepted",
            Self::DoubtResolved => "Resolved a doubt",
            Self::DailyLogin => "Daily login bonus",
            Self::StreakBonus => "Streak milestone bonus",
            Self::AchievementUnlocked => "Achievement unlocked",
            Self::BadgeEarned => "Badge earned",
        }
    }

    /// Which user_stats counter this event advances, if any
    pub fn stat_column(&self) -> Option<&'static str> {
        match self {
            Self::DoubtCreated => Some("doubts_asked"),
            Self::AnswerPosted => Some("answers_posted"),
            Self::AnswerAccepted => Some("answers_accepted"),
            Self::DoubtResolved => Some("doubts_resolved"),
            _ => None,
        }
    }
}

/// Cumulative points required to reach a level. Level 1 is free.
pub fn xp_for_level(level: i64) -> i64 {
    if level <= 1 {
        return 0;
    }
    (LEVEL_BASE_XP * LEVEL_GROWTH.powi((level - 2) as i32)).floor() as i64
}

/// Largest level whose threshold the point total meets
pub fn level_for_points(total_points: i64) -> i64 {
    let mut level = 1;
    while xp_for_level(level + 1) <= total_points {
        level += 1;
    }
    level
}

/// Display tier for a level
pub fn tier_for_level(level: i64) -> &'static str {
    match level {
        ..=5 => "Initiate",
        6..=15 => "Contributor",
        16..=30 => "Authority",
        31..=50 => "Luminary",
        _ => "Sage",
    }
}

/// 1.0 for AI-assisted work, 1.5 for unassisted
pub fn rigor_multiplier(ai_assisted: bool) -> f64 {
    if ai_assisted {
        1.0
    } else {
        1.5
    }
}

/// Scales with reputation, saturating at 2.0 (reputation >= 1000)
pub fn reputation_multiplier(reputation: i64) -> f64 {
    (1.0 + reputation as f64 / 1000.0).min(2.0)
}

/// Final point delta for an event: base times both multipliers, floored
pub fn compute_points(base: i64, ai_assisted: bool, reputation: i64) -> i64 {
    (base as f64 * rigor_multiplier(ai_assisted) * reputation_multiplier(reputation)).floor() as i64
}
