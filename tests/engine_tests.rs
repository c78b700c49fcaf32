//! Progression engine tests: scoring, awards, streaks, achievements, credits

use lyceum::db::Database;
use lyceum::engine::scoring::{
    compute_points, level_for_points, reputation_multiplier, rigor_multiplier, tier_for_level,
    xp_for_level,
};
use lyceum::engine::{AwardOptions, EngineError, EventKind, Period};
use lyceum::models::{NewDoubt, NewUser, VoteTarget};
use rusqlite::params;
use tempfile::TempDir;

fn setup_test_db() -> (TempDir, Database) {
    let tmp = TempDir::new().unwrap();
    let db = Database::new(&tmp.path().join("test.db")).unwrap();
    (tmp, db)
}

fn create_user(db: &Database, username: &str) -> lyceum::models::User {
    db.create_user(NewUser {
        username: username.to_string(),
        email: Some(format!("{}@example.edu", username)),
        password: "correct-horse-battery".to_string(),
        display_name: None,
    })
    .unwrap()
}

fn set_reputation(db: &Database, user_id: i64, reputation: i64) {
    let conn = db.conn();
    conn.execute(
        "UPDATE users SET reputation = ?1 WHERE id = ?2",
        params![reputation, user_id],
    )
    .unwrap();
}

fn seed_streak(db: &Database, user_id: i64, current: i64, longest: i64, days_ago: i64) {
    let conn = db.conn();
    conn.execute(
        "INSERT INTO streaks (user_id, current_streak, longest_streak, last_activity_date)
         VALUES (?1, ?2, ?3, date('now', ?4))",
        params![user_id, current, longest, format!("-{} days", days_ago)],
    )
    .unwrap();
}

fn ledger_count(db: &Database, user_id: i64, event_type: &str) -> i64 {
    let conn = db.conn();
    conn.query_row(
        "SELECT COUNT(*) FROM points_ledger WHERE user_id = ?1 AND event_type = ?2",
        params![user_id, event_type],
        |row| row.get(0),
    )
    .unwrap()
}

fn credits_of(db: &Database, user_id: i64) -> i64 {
    let conn = db.conn();
    conn.query_row(
        "SELECT credits FROM users WHERE id = ?1",
        params![user_id],
        |row| row.get(0),
    )
    .unwrap()
}

// ============================================================================
// Scoring policy
// ============================================================================

#[test]
fn test_level_curve_thresholds() {
    assert_eq!(xp_for_level(1), 0);
    assert_eq!(xp_for_level(2), 100);
    assert_eq!(xp_for_level(3), 150);
    assert_eq!(xp_for_level(4), 225);
    assert_eq!(xp_for_level(5), 337);
    assert_eq!(xp_for_level(6), 506);

    for level in 2..=40 {
        assert!(
            xp_for_level(level) > xp_for_level(level - 1),
            "curve must be strictly increasing at level {}",
            level
        );
    }
}

#[test]
fn test_level_for_points_boundaries() {
    assert_eq!(level_for_points(0), 1);
    assert_eq!(level_for_points(99), 1);
    assert_eq!(level_for_points(100), 2);
    assert_eq!(level_for_points(149), 2);
    assert_eq!(level_for_points(150), 3);
    assert_eq!(level_for_points(224), 3);
    assert_eq!(level_for_points(225), 4);
    assert_eq!(level_for_points(506), 6);

    // Every total lands inside its level's band
    for points in (0..5000).step_by(37) {
        let level = level_for_points(points);
        assert!(level >= 1);
        assert!(xp_for_level(level) <= points);
        assert!(points < xp_for_level(level + 1));
    }
}

#[test]
fn test_tier_boundaries() {
    assert_eq!(tier_for_level(1), "Initiate");
    assert_eq!(tier_for_level(5), "Initiate");
    assert_eq!(tier_for_level(6), "Contributor");
    assert_eq!(tier_for_level(15), "Contributor");
    assert_eq!(tier_for_level(16), "Authority");
    assert_eq!(tier_for_level(30), "Authority");
    assert_eq!(tier_for_level(31), "Luminary");
    assert_eq!(tier_for_level(50), "Luminary");
    assert_eq!(tier_for_level(51), "Sage");
    assert_eq!(tier_for_level(120), "Sage");
}

#[test]
fn test_multipliers() {
    assert_eq!(rigor_multiplier(false), 1.5);
    assert_eq!(rigor_multiplier(true), 1.0);

    assert_eq!(reputation_multiplier(0), 1.0);
    assert_eq!(reputation_multiplier(500), 1.5);
    assert_eq!(reputation_multiplier(1000), 2.0);
    assert_eq!(reputation_multiplier(2500), 2.0); // saturates
}

#[test]
fn test_point_computation() {
    // Unassisted doubt at zero reputation
    assert_eq!(compute_points(10, false, 0), 15);
    // AI-assisted doubt at saturated reputation
    assert_eq!(compute_points(10, true, 1000), 20);
    // Fractional products floor
    assert_eq!(compute_points(15, true, 250), 18);
    // Negative bases flow through the same formula
    assert_eq!(compute_points(-2, false, 0), -3);
}

// ============================================================================
// Awards
// ============================================================================

#[test]
fn test_award_doubt_created() {
    let (_tmp, db) = setup_test_db();
    let user = create_user(&db, "asker");

    let outcome = db
        .award_xp(user.id, EventKind::DoubtCreated, AwardOptions::default())
        .unwrap();

    assert_eq!(outcome.points, 15);
    assert_eq!(outcome.total_points, 15);
    assert_eq!(outcome.level, 1);
    assert_eq!(outcome.tier, "Initiate");
    assert!(!outcome.leveled_up);

    assert_eq!(ledger_count(&db, user.id, "DOUBT_CREATED"), 1);

    let progress = db.user_progress(user.id).unwrap();
    assert_eq!(progress.doubts_asked, 1);
    assert_eq!(progress.total_points, 15);
}

#[test]
fn test_award_ai_assisted_earns_less() {
    let (_tmp, db) = setup_test_db();
    let user = create_user(&db, "answerer");

    let assisted = db
        .award_xp(
            user.id,
            EventKind::AnswerPosted,
            AwardOptions {
                ai_assisted: true,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(assisted.points, 15);

    let unassisted = db
        .award_xp(user.id, EventKind::AnswerPosted, AwardOptions::default())
        .unwrap();
    assert_eq!(unassisted.points, 22);
}

#[test]
fn test_award_reputation_multiplier() {
    let (_tmp, db) = setup_test_db();
    let user = create_user(&db, "veteran");
    set_reputation(&db, user.id, 1000);

    let outcome = db
        .award_xp(user.id, EventKind::DoubtCreated, AwardOptions::default())
        .unwrap();

    // floor(10 * 1.5 * 2.0)
    assert_eq!(outcome.points, 30);
}

#[test]
fn test_award_unknown_user_fails_clean() {
    let (_tmp, db) = setup_test_db();

    let err = db
        .award_xp(9999, EventKind::DoubtCreated, AwardOptions::default())
        .unwrap_err();
    assert!(matches!(err, EngineError::UserNotFound(9999)));

    let count: i64 = db
        .conn()
        .query_row("SELECT COUNT(*) FROM points_ledger", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn test_level_up_and_tier_transition() {
    let (_tmp, db) = setup_test_db();
    let user = create_user(&db, "climber");

    // 7 accepted answers at 75 points each crosses the 506-point line
    let mut outcome = None;
    for _ in 0..7 {
        outcome = Some(
            db.award_xp(user.id, EventKind::AnswerAccepted, AwardOptions::default())
                .unwrap(),
        );
    }

    let outcome = outcome.unwrap();
    assert_eq!(outcome.total_points, 525);
    assert_eq!(outcome.level, 6);
    assert_eq!(outcome.tier, "Contributor");
    assert!(outcome.leveled_up);

    let user = db.get_user_by_id(user.id).unwrap();
    assert_eq!(user.tier, "Contributor");
}

#[test]
fn test_negative_awards_can_lower_level() {
    let (_tmp, db) = setup_test_db();
    let user = create_user(&db, "slipping");

    for _ in 0..7 {
        db.award_xp(user.id, EventKind::AnswerAccepted, AwardOptions::default())
            .unwrap();
    }

    // Seven downvotes at -3 each drops the total below the level-6 line
    let mut outcome = None;
    for _ in 0..7 {
        outcome = Some(
            db.award_xp(user.id, EventKind::DownvoteReceived, AwardOptions::default())
                .unwrap(),
        );
    }

    let outcome = outcome.unwrap();
    assert_eq!(outcome.points, -3);
    assert_eq!(outcome.total_points, 504);
    assert_eq!(outcome.level, 5);
    assert!(!outcome.leveled_up);

    let user = db.get_user_by_id(user.id).unwrap();
    assert_eq!(user.tier, "Initiate");
}

// ============================================================================
// Daily login
// ============================================================================

#[test]
fn test_daily_login_awards_once() {
    let (_tmp, db) = setup_test_db();
    let user = create_user(&db, "regular");

    let first = db.check_daily_login(user.id).unwrap();
    let summary = first.expect("first login of the day should award");
    assert_eq!(summary.award.points, 7); // floor(5 * 1.5)
    assert_eq!(summary.streak.current_streak, 1);
    assert_eq!(credits_of(&db, user.id), 1);

    let second = db.check_daily_login(user.id).unwrap();
    assert!(second.is_none());
    assert_eq!(ledger_count(&db, user.id, "DAILY_LOGIN"), 1);
    assert_eq!(credits_of(&db, user.id), 1);
}

// ============================================================================
// Streaks
// ============================================================================

#[test]
fn test_streak_same_day_is_noop() {
    let (_tmp, db) = setup_test_db();
    let user = create_user(&db, "steady");

    let first = db.update_streak(user.id).unwrap();
    assert_eq!(first.current_streak, 1);
    assert_eq!(first.longest_streak, 1);

    let second = db.update_streak(user.id).unwrap();
    assert_eq!(second.current_streak, 1);
    assert_eq!(second.longest_streak, 1);
}

#[test]
fn test_streak_increments_after_one_day() {
    let (_tmp, db) = setup_test_db();
    let user = create_user(&db, "daily");
    seed_streak(&db, user.id, 2, 4, 1);

    let state = db.update_streak(user.id).unwrap();
    assert_eq!(state.current_streak, 3);
    assert_eq!(state.longest_streak, 4);
    assert_eq!(ledger_count(&db, user.id, "STREAK_BONUS"), 0);
}

#[test]
fn test_streak_milestone_pays_bonus() {
    let (_tmp, db) = setup_test_db();
    let user = create_user(&db, "milestone");
    seed_streak(&db, user.id, 4, 4, 1);

    let state = db.update_streak(user.id).unwrap();
    assert_eq!(state.current_streak, 5);
    assert_eq!(state.longest_streak, 5);
    assert_eq!(ledger_count(&db, user.id, "STREAK_BONUS"), 1);

    // floor(25 * 1.5) through the standard multiplier path
    let points: i64 = db
        .conn()
        .query_row(
            "SELECT points FROM points_ledger WHERE user_id = ?1 AND event_type = 'STREAK_BONUS'",
            params![user.id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(points, 37);
}

#[test]
fn test_streak_gap_resets_but_keeps_longest() {
    let (_tmp, db) = setup_test_db();
    let user = create_user(&db, "lapsed");
    seed_streak(&db, user.id, 6, 6, 3);

    let state = db.update_streak(user.id).unwrap();
    assert_eq!(state.current_streak, 1);
    assert_eq!(state.longest_streak, 6);
}

#[test]
fn test_oath_trial_discount_at_thirty_days() {
    let (_tmp, db) = setup_test_db();
    let user = create_user(&db, "oath-trial");
    seed_streak(&db, user.id, 29, 29, 1);

    let state = db.update_streak(user.id).unwrap();
    assert_eq!(state.current_streak, 30);

    let discount = db.active_discount(user.id).unwrap().expect("discount granted");
    assert_eq!(discount.discount_percent, 10);

    // Expiry is stored in the store's own datetime format, about 60 days out
    let expires = discount.expires_at.expect("trial tier expires");
    let parsed = chrono::NaiveDateTime::parse_from_str(&expires, "%Y-%m-%d %H:%M:%S")
        .expect("sqlite datetime");
    let days_out = (parsed.date() - chrono::Utc::now().date_naive()).num_days();
    assert!((59..=61).contains(&days_out));
}

#[test]
fn test_oath_permanent_discount_at_ninety_days() {
    let (_tmp, db) = setup_test_db();
    let user = create_user(&db, "oath-permanent");
    seed_streak(&db, user.id, 89, 89, 1);

    let state = db.update_streak(user.id).unwrap();
    assert_eq!(state.current_streak, 90);

    let discount = db.active_discount(user.id).unwrap().expect("discount granted");
    assert_eq!(discount.discount_percent, 20);
    assert!(discount.expires_at.is_none());
}

#[test]
fn test_oath_rebuild_keeps_permanent_discount() {
    let (_tmp, db) = setup_test_db();
    let user = create_user(&db, "oath-rebuilt");
    seed_streak(&db, user.id, 89, 89, 1);
    db.update_streak(user.id).unwrap();

    // Streak broke and was rebuilt to day 29 as of yesterday
    {
        let conn = db.conn();
        conn.execute(
            "UPDATE streaks SET current_streak = 29, last_activity_date = date('now', '-1 days')
             WHERE user_id = ?1",
            params![user.id],
        )
        .unwrap();
    }

    let state = db.update_streak(user.id).unwrap();
    assert_eq!(state.current_streak, 30);
    assert_eq!(state.longest_streak, 90);

    // Crossing the trial threshold again must not overwrite the permanent grant
    let discount = db.active_discount(user.id).unwrap().expect("discount kept");
    assert_eq!(discount.discount_percent, 20);
    assert!(discount.expires_at.is_none());
}

#[test]
fn test_get_streak_without_history() {
    let (_tmp, db) = setup_test_db();
    let user = create_user(&db, "fresh");

    let state = db.get_streak(user.id).unwrap();
    assert_eq!(state.current_streak, 0);
    assert_eq!(state.longest_streak, 0);
}

// ============================================================================
// Credits
// ============================================================================

#[test]
fn test_deduct_more_than_balance_fails() {
    let (_tmp, db) = setup_test_db();
    let user = create_user(&db, "broke");

    let err = db.deduct_credits(user.id, 5, "Feature unlock").unwrap_err();
    match err {
        EngineError::InsufficientCredits { balance, required } => {
            assert_eq!(balance, 0);
            assert_eq!(required, 5);
        }
        other => panic!("expected InsufficientCredits, got {:?}", other),
    }

    assert_eq!(credits_of(&db, user.id), 0);
    assert_eq!(ledger_count(&db, user.id, "CREDITS_SPENT"), 0);
}

#[test]
fn test_grant_and_spend_credits() {
    let (_tmp, db) = setup_test_db();
    let user = create_user(&db, "spender");

    let balance = db.grant_credits(user.id, 10, "Welcome pack").unwrap();
    assert_eq!(balance, 10);

    let balance = db.deduct_credits(user.id, 4, "Priority review").unwrap();
    assert_eq!(balance, 6);

    assert_eq!(ledger_count(&db, user.id, "CREDITS_GRANTED"), 1);
    assert_eq!(ledger_count(&db, user.id, "CREDITS_SPENT"), 1);

    // Currency movement never touches point totals
    let progress = db.user_progress(user.id).unwrap();
    assert_eq!(progress.total_points, 0);
    assert_eq!(progress.credits, 6);
}

#[test]
fn test_credit_ops_for_missing_user() {
    let (_tmp, db) = setup_test_db();

    let err = db.grant_credits(4242, 5, "Ghost grant").unwrap_err();
    assert!(matches!(err, EngineError::UserNotFound(4242)));

    let err = db.deduct_credits(4242, 5, "Ghost spend").unwrap_err();
    assert!(matches!(err, EngineError::UserNotFound(4242)));
}

// ============================================================================
// Achievements
// ============================================================================

#[test]
fn test_achievement_unlocks_exactly_once() {
    let (_tmp, db) = setup_test_db();
    let user = create_user(&db, "curious");

    db.award_xp(user.id, EventKind::DoubtCreated, AwardOptions::default())
        .unwrap();

    let first = db.check_achievements(user.id, EventKind::DoubtCreated).unwrap();
    assert_eq!(first, vec!["Curious Mind"]);

    let second = db.check_achievements(user.id, EventKind::DoubtCreated).unwrap();
    assert!(second.is_empty());

    let unlocks: i64 = db
        .conn()
        .query_row(
            "SELECT COUNT(*) FROM achievement_unlocks WHERE user_id = ?1 AND achievement_key = 'first_doubt'",
            params![user.id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(unlocks, 1);
    assert_eq!(ledger_count(&db, user.id, "ACHIEVEMENT_UNLOCKED"), 1);

    // Award 15 + unlock bonus floor(10 * 1.5)
    let progress = db.user_progress(user.id).unwrap();
    assert_eq!(progress.total_points, 30);
    assert_eq!(progress.achievements_unlocked, 1);
}

#[test]
fn test_achievement_progress_is_recomputed() {
    let (_tmp, db) = setup_test_db();
    let user = create_user(&db, "grinder");

    for _ in 0..3 {
        db.award_xp(user.id, EventKind::DoubtCreated, AwardOptions::default())
            .unwrap();
    }
    db.check_achievements(user.id, EventKind::DoubtCreated).unwrap();

    let report = db.achievement_report(user.id).unwrap();

    let first_doubt = report.iter().find(|a| a.key == "first_doubt").unwrap();
    assert!(first_doubt.unlocked);
    assert_eq!(first_doubt.current, first_doubt.target);

    let doubts_10 = report.iter().find(|a| a.key == "doubts_10").unwrap();
    assert!(!doubts_10.unlocked);
    assert_eq!(doubts_10.current, 3);
    assert_eq!(doubts_10.target, 10);
}

#[test]
fn test_streak_achievement_unlocks() {
    let (_tmp, db) = setup_test_db();
    let user = create_user(&db, "weekly");
    seed_streak(&db, user.id, 7, 7, 0);

    let unlocked = db.check_achievements(user.id, EventKind::DailyLogin).unwrap();
    assert!(unlocked.contains(&"Week of Wisdom"));
}

#[test]
fn test_unwired_criterion_stays_locked() {
    let (_tmp, db) = setup_test_db();
    let user = create_user(&db, "helper");

    for _ in 0..20 {
        db.award_xp(user.id, EventKind::AnswerPosted, AwardOptions::default())
            .unwrap();
    }
    db.check_achievements(user.id, EventKind::AnswerPosted).unwrap();

    let report = db.achievement_report(user.id).unwrap();
    let mentor = report.iter().find(|a| a.key == "mentor").unwrap();
    assert!(!mentor.unlocked);
    assert_eq!(mentor.current, 0);
    assert_eq!(mentor.target, 5);
}

// ============================================================================
// Composite flows
// ============================================================================

#[test]
fn test_record_activity_runs_all_followups() {
    let (_tmp, db) = setup_test_db();
    let user = create_user(&db, "active");

    let summary = db
        .record_activity(user.id, EventKind::DoubtCreated, AwardOptions::default())
        .unwrap();

    assert_eq!(summary.award.points, 15);
    assert_eq!(summary.streak.current_streak, 1);
    assert_eq!(summary.unlocked, vec!["Curious Mind"]);

    let progress = db.user_progress(user.id).unwrap();
    assert_eq!(progress.total_points, 30);
    assert_eq!(progress.current_streak, 1);
}

#[test]
fn test_recognition_does_not_advance_streak() {
    let (_tmp, db) = setup_test_db();
    let user = create_user(&db, "recognized");

    let summary = db
        .record_recognition(user.id, EventKind::UpvoteReceived, AwardOptions::default())
        .unwrap();

    assert_eq!(summary.award.points, 7); // floor(5 * 1.5)

    let streak = db.get_streak(user.id).unwrap();
    assert_eq!(streak.current_streak, 0);
}

#[test]
fn test_ledger_totals_reconcile() {
    let (_tmp, db) = setup_test_db();
    let user = create_user(&db, "audited");

    db.record_activity(user.id, EventKind::DoubtCreated, AwardOptions::default())
        .unwrap();
    db.record_activity(user.id, EventKind::AnswerPosted, AwardOptions::default())
        .unwrap();
    db.record_recognition(user.id, EventKind::DownvoteReceived, AwardOptions::default())
        .unwrap();
    db.grant_credits(user.id, 3, "Promo").unwrap();
    db.deduct_credits(user.id, 1, "Sticker").unwrap();

    let (earn_sum, total_points): (i64, i64) = {
        let conn = db.conn();
        let earn_sum = conn
            .query_row(
                "SELECT COALESCE(SUM(points), 0) FROM points_ledger
                 WHERE user_id = ?1 AND event_type NOT IN ('CREDITS_SPENT', 'CREDITS_GRANTED')",
                params![user.id],
                |row| row.get(0),
            )
            .unwrap();
        let total = conn
            .query_row(
                "SELECT total_points FROM user_stats WHERE user_id = ?1",
                params![user.id],
                |row| row.get(0),
            )
            .unwrap();
        (earn_sum, total)
    };
    assert_eq!(earn_sum, total_points);

    // Newest first
    let page = db.ledger_page(user.id, 10, 0).unwrap();
    assert!(page.len() >= 5);
    for pair in page.windows(2) {
        assert!(pair[0].id > pair[1].id);
    }
}

// ============================================================================
// Leaderboard
// ============================================================================

#[test]
fn test_leaderboard_all_time_ordering() {
    let (_tmp, db) = setup_test_db();
    let alice = create_user(&db, "alice");
    let bob = create_user(&db, "bob");
    let _carol = create_user(&db, "carol");

    for _ in 0..2 {
        db.award_xp(alice.id, EventKind::DoubtCreated, AwardOptions::default())
            .unwrap();
    }
    db.award_xp(bob.id, EventKind::DoubtCreated, AwardOptions::default())
        .unwrap();

    let board = db.leaderboard(Period::AllTime).unwrap();
    assert_eq!(board.len(), 2); // carol has no stat row yet
    assert_eq!(board[0].user_id, alice.id);
    assert_eq!(board[0].total_points, 30);
    assert_eq!(board[0].tier, "Initiate");
    assert_eq!(board[1].user_id, bob.id);
}

#[test]
fn test_leaderboard_windows_drop_old_points() {
    let (_tmp, db) = setup_test_db();
    let recent = create_user(&db, "recent");
    let dormant = create_user(&db, "dormant");

    db.award_xp(recent.id, EventKind::DoubtCreated, AwardOptions::default())
        .unwrap();
    db.award_xp(dormant.id, EventKind::AnswerAccepted, AwardOptions::default())
        .unwrap();

    {
        let conn = db.conn();
        conn.execute(
            "UPDATE points_ledger SET created_at = datetime('now', '-40 days') WHERE user_id = ?1",
            params![dormant.id],
        )
        .unwrap();
    }

    let monthly = db.leaderboard(Period::Monthly).unwrap();
    assert!(monthly.iter().any(|e| e.user_id == recent.id));
    assert!(!monthly.iter().any(|e| e.user_id == dormant.id));

    // All-time still counts the old points
    let all_time = db.leaderboard(Period::AllTime).unwrap();
    assert_eq!(all_time[0].user_id, dormant.id);
}

// ============================================================================
// Badges
// ============================================================================

#[test]
fn test_badge_grant_is_idempotent() {
    let (_tmp, db) = setup_test_db();
    let user = create_user(&db, "honored");

    assert!(db.grant_badge(user.id, "deans_list", None).unwrap());
    assert!(!db.grant_badge(user.id, "deans_list", None).unwrap());

    assert_eq!(ledger_count(&db, user.id, "BADGE_EARNED"), 1);
}

#[test]
fn test_badge_grant_rejects_unknown_inputs() {
    let (_tmp, db) = setup_test_db();
    let user = create_user(&db, "plain");

    let err = db.grant_badge(user.id, "no_such_badge", None).unwrap_err();
    assert!(matches!(err, EngineError::Invariant(_)));

    let err = db.grant_badge(31337, "deans_list", None).unwrap_err();
    assert!(matches!(err, EngineError::UserNotFound(31337)));
}

// ============================================================================
// Content layer interplay
// ============================================================================

#[test]
fn test_votes_move_author_reputation() {
    let (_tmp, db) = setup_test_db();
    let alice = create_user(&db, "author");
    let bob = create_user(&db, "voter");

    let doubt = db
        .create_doubt(NewDoubt {
            user_id: alice.id,
            title: "What is ownership?".to_string(),
            body: "Trying to build a mental model.".to_string(),
            tags: vec!["rust".to_string()],
        })
        .unwrap();

    let author = db.cast_vote(bob.id, VoteTarget::Doubt, doubt.id, 1).unwrap();
    assert_eq!(author, alice.id);
    assert_eq!(db.get_user_by_id(alice.id).unwrap().reputation, 5);

    let err = db.cast_vote(bob.id, VoteTarget::Doubt, doubt.id, 1).unwrap_err();
    assert!(err.to_string().contains("UNIQUE constraint failed"));
    assert_eq!(db.get_user_by_id(alice.id).unwrap().reputation, 5);
}

#[test]
fn test_downvote_reputation_floors_at_zero() {
    let (_tmp, db) = setup_test_db();
    let alice = create_user(&db, "newbie");
    let bob = create_user(&db, "critic");

    let doubt = db
        .create_doubt(NewDoubt {
            user_id: alice.id,
            title: "Why won't this borrow?".to_string(),
            body: "Full error attached.".to_string(),
            tags: vec![],
        })
        .unwrap();

    db.cast_vote(bob.id, VoteTarget::Doubt, doubt.id, -1).unwrap();
    assert_eq!(db.get_user_by_id(alice.id).unwrap().reputation, 0);
    assert_eq!(db.get_doubt_by_id(doubt.id).unwrap().downvotes, 1);
}

#[test]
fn test_accept_answer_flow() {
    let (_tmp, db) = setup_test_db();
    let asker = create_user(&db, "student");
    let answerer = create_user(&db, "tutor");

    let doubt = db
        .create_doubt(NewDoubt {
            user_id: asker.id,
            title: "How do lifetimes work?".to_string(),
            body: "Elision keeps confusing me.".to_string(),
            tags: vec!["rust".to_string(), "lifetimes".to_string()],
        })
        .unwrap();

    let answer = db
        .create_answer(doubt.id, answerer.id, "They are scopes for borrows.", false)
        .unwrap();

    db.accept_answer(doubt.id, answer.id).unwrap();

    let summary = db
        .record_recognition(answerer.id, EventKind::AnswerAccepted, AwardOptions::default())
        .unwrap();
    assert_eq!(summary.award.points, 75);

    let progress = db.user_progress(answerer.id).unwrap();
    assert_eq!(progress.answers_accepted, 1);

    let doubt = db.get_doubt_by_uuid(&doubt.uuid).unwrap().unwrap();
    assert_eq!(doubt.status, "resolved");
    assert_eq!(doubt.accepted_answer_id, Some(answer.id));
}

#[test]
fn test_user_progress_snapshot() {
    let (_tmp, db) = setup_test_db();
    let user = create_user(&db, "snapshot");

    db.record_activity(user.id, EventKind::DoubtCreated, AwardOptions::default())
        .unwrap();

    let progress = db.user_progress(user.id).unwrap();
    assert_eq!(progress.user_id, user.id);
    assert_eq!(progress.total_points, 30);
    assert_eq!(progress.level, level_for_points(progress.total_points));
    assert_eq!(progress.tier, "Initiate");
    assert_eq!(progress.xp_for_current_level, 0);
    assert_eq!(progress.xp_for_next_level, 100);
    assert_eq!(progress.doubts_asked, 1);
    assert_eq!(progress.achievements_unlocked, 1);
}
