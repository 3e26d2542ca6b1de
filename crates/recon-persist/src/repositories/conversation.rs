use crate::error::Result;
use crate::models::Conversation;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::FromRow;
use tracing::info;

const TITLE_MAX_CHARS: usize = 60;

/// Derive a conversation title from the first user input: collapsed
/// whitespace, truncated to 60 chars with an ellipsis.
pub fn title_from_input(input: &str) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return "New Chat".to_string();
    }
    if collapsed.chars().count() <= TITLE_MAX_CHARS {
        return collapsed;
    }
    let head: String = collapsed.chars().take(TITLE_MAX_CHARS - 3).collect();
    format!("{}...", head)
}

#[derive(FromRow)]
struct ConversationRow {
    id: i64,
    title: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        Conversation {
            id: row.id,
            title: row.title,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub struct ConversationRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ConversationRepository<'a> {
    pub(crate) fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self) -> Result<Conversation> {
        let now = Utc::now();
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO conversations (title, created_at, updated_at) VALUES (NULL, ?, ?) RETURNING id",
        )
        .bind(now)
        .bind(now)
        .fetch_one(self.pool)
        .await?;

        info!(conversation_id = id, "created conversation");
        Ok(Conversation {
            id,
            title: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn get(&self, id: i64) -> Result<Option<Conversation>> {
        let row = sqlx::query_as::<_, ConversationRow>(
            "SELECT id, title, created_at, updated_at FROM conversations WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Conversation::from))
    }

    pub async fn list(&self, limit: i64) -> Result<Vec<Conversation>> {
        let rows = sqlx::query_as::<_, ConversationRow>(
            "SELECT id, title, created_at, updated_at FROM conversations ORDER BY updated_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Conversation::from).collect())
    }

    /// Delete a conversation; messages and mission logs cascade.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM conversations WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(conversation_id = id, "deleted conversation");
        }
        Ok(deleted)
    }

    pub async fn update_title(&self, id: i64, title: &str) -> Result<Option<Conversation>> {
        let result = sqlx::query("UPDATE conversations SET title = ?, updated_at = ? WHERE id = ?")
            .bind(title)
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get(id).await
    }

    /// Set the title from the first user input, but only if none is set yet.
    pub async fn ensure_title(&self, id: i64, user_input: &str) -> Result<()> {
        sqlx::query("UPDATE conversations SET title = ? WHERE id = ? AND title IS NULL")
            .bind(title_from_input(user_input))
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    pub(crate) async fn touch(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}
