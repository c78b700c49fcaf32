//! Credit economy: guarded balance updates plus spend/grant ledger rows

use rusqlite::{params, Connection};

use crate::engine::error::EngineError;

/// Credits minted by the daily login bonus
pub const DAILY_LOGIN_CREDIT: i64 = 1;

/// Ledger event names for the credit side of the ledger. These rows track
/// currency movement and are excluded from point totals.
pub const CREDITS_SPENT: &str = "CREDITS_SPENT";
pub const CREDITS_GRANTED: &str = "CREDITS_GRANTED";

/// Current balance, or UserNotFound
pub fn current_balance(conn: &Connection, user_id: i64) -> Result<i64, EngineError> {
    conn.query_row(
        "SELECT credits FROM users WHERE id = ?1",
        params![user_id],
        |row| row.get(0),
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => EngineError::UserNotFound(user_id),
        other => EngineError::Storage(other),
    })
}

/// Shared atomic primitive for every balance mutation. Decrements are guarded
/// in the UPDATE itself so a too-large spend touches nothing.
pub fn apply_credit_delta(conn: &Connection, user_id: i64, delta: i64) -> Result<i64, EngineError> {
    let updated = if delta < 0 {
        conn.execute(
            "UPDATE users SET credits = credits + ?1 WHERE id = ?2 AND credits >= ?3",
            params![delta, user_id, -delta],
        )?
    } else {
        conn.execute(
            "UPDATE users SET credits = credits + ?1 WHERE id = ?2",
            params![delta, user_id],
        )?
    };

    if updated == 0 {
        // Either the user is missing or the guard rejected the spend;
        // current_balance distinguishes the two.
        let balance = current_balance(conn, user_id)?;
        return Err(EngineError::InsufficientCredits {
            balance,
            required: -delta,
        });
    }

    let balance = current_balance(conn, user_id)?;
    if balance < 0 {
        return Err(EngineError::Invariant(format!(
            "credit balance went negative ({}) for user {}",
            balance, user_id
        )));
    }

    Ok(balance)
}

/// Spend credits. Fails with InsufficientCredits before touching the balance
/// when it does not cover the amount.
pub fn deduct_credits(
    conn: &Connection,
    user_id: i64,
    amount: i64,
    description: &str,
) -> Result<i64, EngineError> {
    if amount <= 0 {
        return Err(EngineError::Invariant(format!(
            "credit deduction must be positive, got {}",
            amount
        )));
    }

    let balance = apply_credit_delta(conn, user_id, -amount)?;

    conn.execute(
        "INSERT INTO points_ledger (user_id, event_type, points, description) VALUES (?1, ?2, ?3, ?4)",
        params![user_id, CREDITS_SPENT, -amount, description],
    )?;

    tracing::debug!("User {} spent {} credits ({} left)", user_id, amount, balance);
    Ok(balance)
}

/// Manual credit grant (admin rewards, promotions)
pub fn grant_credits(
    conn: &Connection,
    user_id: i64,
    amount: i64,
    description: &str,
) -> Result<i64, EngineError> {
    if amount <= 0 {
        return Err(EngineError::Invariant(format!(
            "credit grant must be positive, got {}",
            amount
        )));
    }

    let balance = apply_credit_delta(conn, user_id, amount)?;

    conn.execute(
        "INSERT INTO points_ledger (user_id, event_type, points, description) VALUES (?1, ?2, ?3, ?4)",
        params![user_id, CREDITS_GRANTED, amount, description],
    )?;

    tracing::info!("Granted {} credits to user {} ({})", amount, user_id, description);
    Ok(balance)
}
