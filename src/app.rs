//! Application state and configuration

use std::path::PathBuf;

use crate::db::Database;

/// Application state shared across all handlers
pub struct AppState {
    /// Data directory for Lyceum
    pub data_dir: PathBuf,

    /// SQLite database for users, doubts, and progression
    pub db: Database,
}

impl AppState {
    pub fn new(data_dir: PathBuf) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&data_dir)?;

        let db_path = data_dir.join("lyceum.db");
        let db = Database::new(&db_path)?;

        let removed = db.cleanup_sessions()?;
        if removed > 0 {
            tracing::info!("Removed {} expired sessions", removed);
        }

        tracing::info!("Lyceum data directory: {:?}", data_dir);

        Ok(Self { data_dir, db })
    }
}
