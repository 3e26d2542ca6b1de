use crate::error::Result;
use crate::models::{ChatMessage, MessageRole};
use crate::repositories::ConversationRepository;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::FromRow;

#[derive(FromRow)]
struct MessageRow {
    id: i64,
    conversation_id: i64,
    role: String,
    content: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for ChatMessage {
    type Error = crate::error::PersistError;

    fn try_from(row: MessageRow) -> Result<Self> {
        Ok(ChatMessage {
            id: row.id,
            conversation_id: row.conversation_id,
            role: row.role.parse()?,
            content: row.content,
            created_at: row.created_at,
        })
    }
}

pub struct MessageRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MessageRepository<'a> {
    pub(crate) fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a message and bump the conversation's updated_at.
    pub async fn save(
        &self,
        conversation_id: i64,
        role: MessageRole,
        content: &str,
    ) -> Result<ChatMessage> {
        let now = Utc::now();
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO messages (conversation_id, role, content, created_at) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(conversation_id)
        .bind(role.to_string())
        .bind(content)
        .bind(now)
        .fetch_one(self.pool)
        .await?;

        ConversationRepository::new(self.pool)
            .touch(conversation_id)
            .await?;

        Ok(ChatMessage {
            id,
            conversation_id,
            role,
            content: content.to_string(),
            created_at: now,
        })
    }

    pub async fn list(&self, conversation_id: i64) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT id, conversation_id, role, content, created_at \
             FROM messages WHERE conversation_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(conversation_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(ChatMessage::try_from).collect()
    }

    pub async fn count(&self, conversation_id: i64) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE conversation_id = ?")
                .bind(conversation_id)
                .fetch_one(self.pool)
                .await?;
        Ok(count)
    }
}
