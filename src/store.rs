//! Conversation store
//!
//! Postgres-backed persistence for conversation turns, one table per
//! subject-area deployment, plus the shared `insights` table backing the
//! insights/feedback tools. The pool connects lazily and the schema is
//! ensured once on first use.

use crate::config::validate_table_name;
use crate::error::ChatError;
use crate::models::{ChatTurnMessage, MessageRole};
use crate::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tokio::sync::OnceCell;
use tracing::info;

/// Handle to the conversation store.
pub struct ConversationStore {
    pool: PgPool,
    /// Variant tables ensured at first use.
    tables: Vec<String>,
    schema_ready: OnceCell<()>,
}

impl ConversationStore {
    /// Create a store over a lazily-connected pool. The connection is not
    /// exercised until the first query.
    pub fn connect(database_url: &str, tables: Vec<String>) -> Result<Self> {
        for table in &tables {
            validate_table_name(table)?;
        }

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(database_url)
            .map_err(|e| ChatError::Config(format!("Invalid database URL: {}", e)))?;

        Ok(Self {
            pool,
            tables,
            schema_ready: OnceCell::new(),
        })
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                for table in &self.tables {
                    sqlx::query(&create_table_sql(table))
                        .execute(&self.pool)
                        .await?;
                    sqlx::query(&create_index_sql(table))
                        .execute(&self.pool)
                        .await?;
                }

                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS insights (
                      id BIGSERIAL PRIMARY KEY,
                      feedback TEXT NOT NULL,
                      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                info!(tables = self.tables.len(), "Conversation store schema ready");
                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| ChatError::Storage(format!("Failed to initialize schema: {}", e)))?;

        Ok(())
    }

    /// Fetch the most recent `limit` messages for a session, returned in
    /// chronological order (the recency query runs newest-first and is
    /// reversed before formatting).
    pub async fn recent_messages(
        &self,
        table: &str,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatTurnMessage>> {
        self.ensure_schema().await?;

        let rows = sqlx::query(&recent_messages_sql(table))
            .bind(session_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ChatError::Storage(format!("Failed to load history: {}", e)))?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in rows {
            let role: String = row
                .try_get("role")
                .map_err(|e| ChatError::Storage(format!("Bad history row: {}", e)))?;
            messages.push(ChatTurnMessage {
                role: MessageRole::from_db(&role),
                content: row
                    .try_get("content")
                    .map_err(|e| ChatError::Storage(format!("Bad history row: {}", e)))?,
                created_at: row
                    .try_get("created_at")
                    .map_err(|e| ChatError::Storage(format!("Bad history row: {}", e)))?,
            });
        }

        messages.reverse();
        Ok(messages)
    }

    /// Persist one completed turn: the user message row, then the assistant
    /// reply row. The two inserts are sequential and not wrapped in a
    /// transaction; a failure after the first insert leaves the user row
    /// behind (known gap, surfaced to the caller as a storage error).
    pub async fn append_turn(
        &self,
        table: &str,
        session_id: &str,
        user_message: &str,
        assistant_reply: &str,
    ) -> Result<()> {
        self.ensure_schema().await?;

        let insert = insert_message_sql(table);

        sqlx::query(&insert)
            .bind(session_id)
            .bind(MessageRole::User.as_str())
            .bind(user_message)
            .execute(&self.pool)
            .await
            .map_err(|e| ChatError::Storage(format!("Failed to persist user message: {}", e)))?;

        sqlx::query(&insert)
            .bind(session_id)
            .bind(MessageRole::Assistant.as_str())
            .bind(assistant_reply)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                ChatError::Storage(format!("Failed to persist assistant reply: {}", e))
            })?;

        Ok(())
    }

    /// Recent feedback rows for the insights tool, newest first.
    pub async fn list_insights(&self, limit: usize) -> Result<Vec<String>> {
        self.ensure_schema().await?;

        let rows = sqlx::query(
            "SELECT feedback FROM insights ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ChatError::Storage(format!("Failed to load insights: {}", e)))?;

        rows.into_iter()
            .map(|row| {
                row.try_get::<String, _>("feedback")
                    .map_err(|e| ChatError::Storage(format!("Bad insights row: {}", e)))
            })
            .collect()
    }

    /// Store a feedback string from the feedback tool.
    pub async fn insert_feedback(&self, feedback: &str) -> Result<()> {
        self.ensure_schema().await?;

        sqlx::query("INSERT INTO insights (feedback) VALUES ($1)")
            .bind(feedback)
            .execute(&self.pool)
            .await
            .map_err(|e| ChatError::Storage(format!("Failed to store feedback: {}", e)))?;

        Ok(())
    }
}

fn create_table_sql(table: &str) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
          id BIGSERIAL PRIMARY KEY,
          session_id TEXT NOT NULL,
          role TEXT NOT NULL,
          content TEXT NOT NULL,
          created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        );
        "#
    )
}

fn create_index_sql(table: &str) -> String {
    format!(
        "CREATE INDEX IF NOT EXISTS idx_{table}_session_time ON {table} (session_id, created_at);"
    )
}

fn recent_messages_sql(table: &str) -> String {
    format!(
        "SELECT role, content, created_at FROM {table} \
         WHERE session_id = $1 ORDER BY created_at DESC LIMIT $2"
    )
}

fn insert_message_sql(table: &str) -> String {
    format!("INSERT INTO {table} (session_id, role, content) VALUES ($1, $2, $3)")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_query_orders_by_recency() {
        let sql = recent_messages_sql("science_messages");
        assert!(sql.contains("FROM science_messages"));
        assert!(sql.contains("ORDER BY created_at DESC"));
        assert!(sql.contains("LIMIT $2"));
    }

    #[test]
    fn test_insert_binds_three_columns() {
        let sql = insert_message_sql("math_messages");
        assert_eq!(
            sql,
            "INSERT INTO math_messages (session_id, role, content) VALUES ($1, $2, $3)"
        );
    }

    #[test]
    fn test_schema_sql_names_table() {
        let sql = create_table_sql("science_messages");
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS science_messages"));
        assert!(sql.contains("session_id TEXT NOT NULL"));
        assert!(create_index_sql("science_messages")
            .contains("idx_science_messages_session_time"));
    }

    #[test]
    fn test_connect_rejects_bad_table_names() {
        let result = ConversationStore::connect(
            "postgres://localhost/chat",
            vec!["ok_table".into(), "bad table".into()],
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_connect_is_lazy() {
        // No server behind this URL; connect must still succeed because the
        // pool only dials on first query.
        let store = ConversationStore::connect(
            "postgres://user:pw@localhost:1/none",
            vec!["science_messages".into()],
        );
        assert!(store.is_ok());
    }
}
