use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::chat::{ChatMessage, ChatRole};

/// Append-only chat log keyed by session id.
#[async_trait]
pub trait MessageLog: Send + Sync {
    /// Creates the session row if missing. Returns true when it was created.
    async fn ensure_session(&self, session_id: Uuid) -> Result<bool>;

    /// Up to `limit` messages, most recent first.
    async fn recent(&self, session_id: Uuid, limit: i64) -> Result<Vec<ChatMessage>>;

    async fn append(&self, session_id: Uuid, role: ChatRole, content: &str) -> Result<()>;

    async fn set_title(&self, session_id: Uuid, title: &str) -> Result<()>;

    /// Removes the session and its messages. Returns false if it did not exist.
    async fn delete_session(&self, session_id: Uuid) -> Result<bool>;
}

pub struct PgMessageLog {
    pool: PgPool,
}

impl PgMessageLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageLog for PgMessageLog {
    async fn ensure_session(&self, session_id: Uuid) -> Result<bool> {
        let result = sqlx::query("INSERT INTO chat_sessions (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn recent(&self, session_id: Uuid, limit: i64) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query_as::<_, ChatMessage>(
            r#"
            SELECT id, session_id, role, content, created_at
            FROM chat_messages
            WHERE session_id = $1
            ORDER BY id DESC
            LIMIT $2
            "#,
        )
        .bind(session_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn append(&self, session_id: Uuid, role: ChatRole, content: &str) -> Result<()> {
        sqlx::query("INSERT INTO chat_messages (session_id, role, content) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(role.as_str())
            .bind(content)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_title(&self, session_id: Uuid, title: &str) -> Result<()> {
        sqlx::query("UPDATE chat_sessions SET title = $2 WHERE id = $1")
            .bind(session_id)
            .bind(title)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_session(&self, session_id: Uuid) -> Result<bool> {
        // chat_messages rows go with it (ON DELETE CASCADE).
        let result = sqlx::query("DELETE FROM chat_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Renders the newest `turns` messages of a most-recent-first history,
/// oldest first, for prompts.
pub fn transcript(history: &[ChatMessage], turns: usize) -> String {
    if history.is_empty() {
        return "(no earlier messages)".to_string();
    }
    let mut lines: Vec<String> = history
        .iter()
        .take(turns)
        .map(|message| {
            let speaker = if message.is_user() { "User" } else { "Assistant" };
            format!("{speaker}: {}", message.content.trim())
        })
        .collect();
    lines.reverse();
    lines.join("\n")
}
