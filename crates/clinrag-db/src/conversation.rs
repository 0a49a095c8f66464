//! Conversation history: append-only per-conversation turn log, one writer
//! per conversation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::DbError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "assistant" => Role::Assistant,
            "system" => Role::System,
            _ => Role::User,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

pub struct ConversationStore<'a> {
    pool: &'a PgPool,
}

impl<'a> ConversationStore<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Appends one turn. Called once for the user message and, only on a
    /// successfully completed (non-canceled) answer, once for the assistant
    /// reply — an abandoned stream's partial text is never persisted as a
    /// completed message.
    pub async fn append(&self, conversation_id: Uuid, role: Role, content: &str) -> Result<(), DbError> {
        sqlx::query("INSERT INTO conversation_turn (conversation_id, role, content) VALUES ($1, $2, $3)")
            .bind(conversation_id)
            .bind(role.as_str())
            .bind(content)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    pub async fn history(&self, conversation_id: Uuid) -> Result<Vec<Turn>, DbError> {
        let rows = sqlx::query(
            "SELECT role, content, created_at FROM conversation_turn WHERE conversation_id = $1 ORDER BY id",
        )
        .bind(conversation_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(Turn {
                    role: Role::from_str(&row.try_get::<String, _>("role")?),
                    content: row.try_get("content")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }
}
