//! Conversation memory.
//!
//! Append-only per-session turn log backed by sqlite. Storage keeps the full
//! history; callers surface only a sliding window of the most recent turns.
//! Appends to the same session serialize through the database, appends to
//! different sessions do not contend.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use crate::core::errors::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    fn from_db(value: &str) -> Self {
        match value {
            "assistant" => Role::Assistant,
            _ => Role::User,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
    pub timestamp: String,
}

#[derive(Clone)]
pub struct HistoryStore {
    pool: SqlitePool,
}

impl HistoryStore {
    pub async fn new(db_path: PathBuf) -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| ApiError::internal(format!("failed to open history db: {}", e)))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| ApiError::internal(format!("failed to init sessions table: {}", e)))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS turns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY(session_id) REFERENCES sessions(id) ON DELETE CASCADE
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| ApiError::internal(format!("failed to init turns table: {}", e)))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_turns_session_id ON turns(session_id)")
            .execute(&pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(Self { pool })
    }

    /// Append a turn, creating the session implicitly on first use.
    pub async fn append(
        &self,
        session_id: &str,
        role: Role,
        text: &str,
    ) -> Result<i64, ApiError> {
        let now = chrono::Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;

        sqlx::query("INSERT OR IGNORE INTO sessions (id, created_at, updated_at) VALUES (?, ?, ?)")
            .bind(session_id)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;

        sqlx::query("UPDATE sessions SET updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;

        let result = sqlx::query(
            "INSERT INTO turns (session_id, role, content, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(session_id)
        .bind(role.as_str())
        .bind(text)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::internal)?;

        tx.commit().await.map_err(ApiError::internal)?;

        Ok(result.last_insert_rowid())
    }

    /// Last `n` turns of a session, oldest first. An unknown session or
    /// `n <= 0` yields an empty list.
    pub async fn recent(
        &self,
        session_id: &str,
        n: i64,
    ) -> Result<Vec<ConversationTurn>, ApiError> {
        if n <= 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT role, content, created_at FROM
             (SELECT * FROM turns WHERE session_id = ? ORDER BY id DESC LIMIT ?)
             ORDER BY id ASC",
        )
        .bind(session_id)
        .bind(n)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(rows
            .iter()
            .map(|row| ConversationTurn {
                role: Role::from_db(row.get("role")),
                text: row.get("content"),
                timestamp: row.get("created_at"),
            })
            .collect())
    }

    /// Clear a session's turns atomically. A concurrent read sees either the
    /// full history or none of it, never a partial one.
    pub async fn reset(&self, session_id: &str) -> Result<u64, ApiError> {
        let result = sqlx::query("DELETE FROM turns WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(result.rows_affected())
    }
}
