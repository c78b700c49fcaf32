//! Engine error taxonomy

use thiserror::Error;

/// Errors surfaced by progression, streak, achievement, and credit operations.
///
/// Duplicate-unique-key conditions on unlock and grant inserts never appear
/// here: those are absorbed at the insert site and reported as
/// "already unlocked" / "already granted".
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("user {0} not found")]
    UserNotFound(i64),

    #[error("insufficient credits: balance {balance}, required {required}")]
    InsufficientCredits { balance: i64, required: i64 },

    /// A state the engine must never produce: negative balance, level
    /// regression on a non-negative award, streak exceeding longest.
    /// Aborts the enclosing transaction.
    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error(transparent)]
    Storage(#[from] rusqlite::Error),
}

impl EngineError {
    /// True when the caller supplied bad input rather than hitting a fault
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UserNotFound(_) | Self::InsufficientCredits { .. }
        )
    }
}
