//! SQLite history store.
//!
//! Uses a single SQLite database file with two tables:
//! - `chat_turns`: one row per persisted user/assistant turn
//! - `conversations`: the summary (title and tag) shown in conversation lists
//!
//! Turn order is the autoincrement key, so rows sharing a timestamp still
//! come back in insertion order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parley_core::error::MemoryError;
use parley_core::history::{ChatTurn, ConversationSummary, HistoryStore, TurnRole};
use parley_core::message::ConversationId;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

pub struct SqliteHistoryStore {
    pool: SqlitePool,
}

impl SqliteHistoryStore {
    /// Open (or create) a history database.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, MemoryError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite://{path}")
        };
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(|e| MemoryError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        // Every connection to `:memory:` is a separate database.
        let ephemeral = url.contains(":memory:");
        let mut pool_options = SqlitePoolOptions::new().max_connections(if ephemeral { 1 } else { 4 });
        if ephemeral {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite history store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, MemoryError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), MemoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chat_turns (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id TEXT NOT NULL,
                role            TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
                content         TEXT NOT NULL,
                created_at      TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::MigrationFailed(format!("chat_turns table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chat_turns_conversation ON chat_turns(conversation_id, id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::MigrationFailed(format!("chat_turns index: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                conversation_id TEXT PRIMARY KEY,
                title           TEXT NOT NULL,
                tag             TEXT,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::MigrationFailed(format!("conversations table: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn parse_timestamp(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn row_to_turn(row: &sqlx::sqlite::SqliteRow) -> Result<ChatTurn, MemoryError> {
        let conversation_id: String = row
            .try_get("conversation_id")
            .map_err(|e| MemoryError::QueryFailed(format!("conversation_id column: {e}")))?;
        let role: String = row
            .try_get("role")
            .map_err(|e| MemoryError::QueryFailed(format!("role column: {e}")))?;
        let content: String = row
            .try_get("content")
            .map_err(|e| MemoryError::QueryFailed(format!("content column: {e}")))?;
        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| MemoryError::QueryFailed(format!("created_at column: {e}")))?;

        let role = TurnRole::parse(&role)
            .ok_or_else(|| MemoryError::QueryFailed(format!("unexpected role '{role}'")))?;

        Ok(ChatTurn {
            conversation_id: ConversationId(conversation_id),
            role,
            content,
            created_at: Self::parse_timestamp(&created_at),
        })
    }

    fn row_to_summary(row: &sqlx::sqlite::SqliteRow) -> Result<ConversationSummary, MemoryError> {
        let conversation_id: String = row
            .try_get("conversation_id")
            .map_err(|e| MemoryError::QueryFailed(format!("conversation_id column: {e}")))?;
        let title: String = row
            .try_get("title")
            .map_err(|e| MemoryError::QueryFailed(format!("title column: {e}")))?;
        let tag: Option<String> = row
            .try_get("tag")
            .map_err(|e| MemoryError::QueryFailed(format!("tag column: {e}")))?;
        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| MemoryError::QueryFailed(format!("created_at column: {e}")))?;
        let updated_at: String = row
            .try_get("updated_at")
            .map_err(|e| MemoryError::QueryFailed(format!("updated_at column: {e}")))?;

        Ok(ConversationSummary {
            conversation_id: ConversationId(conversation_id),
            title,
            tag,
            created_at: Self::parse_timestamp(&created_at),
            updated_at: Self::parse_timestamp(&updated_at),
        })
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn insert_turns(&self, turns: &[ChatTurn]) -> Result<u64, MemoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| MemoryError::Storage(format!("BEGIN failed: {e}")))?;

        let mut written = 0;
        for turn in turns {
            let result = sqlx::query(
                "INSERT INTO chat_turns (conversation_id, role, content, created_at) VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(turn.conversation_id.as_str())
            .bind(turn.role.as_str())
            .bind(&turn.content)
            .bind(turn.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(|e| MemoryError::Storage(format!("INSERT failed: {e}")))?;
            written += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| MemoryError::Storage(format!("COMMIT failed: {e}")))?;

        debug!(rows = written, "Stored chat turns");
        Ok(written)
    }

    async fn turns_for(&self, id: &ConversationId) -> Result<Vec<ChatTurn>, MemoryError> {
        let rows = sqlx::query("SELECT * FROM chat_turns WHERE conversation_id = ?1 ORDER BY id ASC")
            .bind(id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("turns query: {e}")))?;

        rows.iter().map(Self::row_to_turn).collect()
    }

    async fn delete_turns(&self, id: &ConversationId) -> Result<u64, MemoryError> {
        let result = sqlx::query("DELETE FROM chat_turns WHERE conversation_id = ?1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| MemoryError::Storage(format!("DELETE turns failed: {e}")))?;
        Ok(result.rows_affected())
    }

    async fn list_summaries(&self) -> Result<Vec<ConversationSummary>, MemoryError> {
        let rows = sqlx::query("SELECT * FROM conversations ORDER BY updated_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("conversations query: {e}")))?;

        rows.iter().map(Self::row_to_summary).collect()
    }

    async fn insert_summary(&self, summary: &ConversationSummary) -> Result<(), MemoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO conversations (conversation_id, title, tag, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(conversation_id) DO NOTHING
            "#,
        )
        .bind(summary.conversation_id.as_str())
        .bind(&summary.title)
        .bind(&summary.tag)
        .bind(summary.created_at.to_rfc3339())
        .bind(summary.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Storage(format!("INSERT conversation failed: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(MemoryError::Validation(format!(
                "conversation '{}' already exists",
                summary.conversation_id
            )));
        }
        Ok(())
    }

    async fn update_summary(&self, summary: &ConversationSummary) -> Result<bool, MemoryError> {
        let result = sqlx::query(
            "UPDATE conversations SET title = ?2, tag = ?3, updated_at = ?4 WHERE conversation_id = ?1",
        )
        .bind(summary.conversation_id.as_str())
        .bind(&summary.title)
        .bind(&summary.tag)
        .bind(summary.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Storage(format!("UPDATE conversation failed: {e}")))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_summary(&self, id: &ConversationId) -> Result<bool, MemoryError> {
        let result = sqlx::query("DELETE FROM conversations WHERE conversation_id = ?1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| MemoryError::Storage(format!("DELETE conversation failed: {e}")))?;
        Ok(result.rows_affected() > 0)
    }
}
