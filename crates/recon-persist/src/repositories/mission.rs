use crate::error::Result;
use crate::models::{MissionLog, MissionStats, MissionStatus};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::FromRow;
use tracing::info;

/// Objectives are stored truncated; the full report goes in `response`.
const QUERY_MAX_CHARS: usize = 255;

#[derive(FromRow)]
struct MissionLogRow {
    id: i64,
    conversation_id: i64,
    query: String,
    response: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<MissionLogRow> for MissionLog {
    type Error = crate::error::PersistError;

    fn try_from(row: MissionLogRow) -> Result<Self> {
        Ok(MissionLog {
            id: row.id,
            conversation_id: row.conversation_id,
            query: row.query,
            response: row.response,
            status: row.status.parse()?,
            created_at: row.created_at,
        })
    }
}

pub struct MissionRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MissionRepository<'a> {
    pub(crate) fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a PENDING log row for a new mission attempt.
    pub async fn create(&self, conversation_id: i64, query: &str) -> Result<MissionLog> {
        let truncated: String = query.chars().take(QUERY_MAX_CHARS).collect();
        let now = Utc::now();
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO mission_logs (conversation_id, query, response, status, created_at) \
             VALUES (?, ?, NULL, ?, ?) RETURNING id",
        )
        .bind(conversation_id)
        .bind(&truncated)
        .bind(MissionStatus::Pending.to_string())
        .bind(now)
        .fetch_one(self.pool)
        .await?;

        info!(mission_id = id, conversation_id, "opened mission log");
        Ok(MissionLog {
            id,
            conversation_id,
            query: truncated,
            response: None,
            status: MissionStatus::Pending,
            created_at: now,
        })
    }

    pub async fn mark_in_progress(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE mission_logs SET status = ? WHERE id = ? AND status = ?")
            .bind(MissionStatus::InProgress.to_string())
            .bind(id)
            .bind(MissionStatus::Pending.to_string())
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Write a terminal status. The WHERE clause excludes rows that are
    /// already terminal, so the first writer wins and repeats are no-ops.
    async fn mark_terminal(&self, id: i64, status: MissionStatus, response: &str) -> Result<bool> {
        debug_assert!(status.is_terminal());
        let result = sqlx::query(
            "UPDATE mission_logs SET status = ?, response = ? \
             WHERE id = ? AND status NOT IN (?, ?)",
        )
        .bind(status.to_string())
        .bind(response)
        .bind(id)
        .bind(MissionStatus::Completed.to_string())
        .bind(MissionStatus::Failed.to_string())
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn complete(&self, id: i64, report: &str) -> Result<bool> {
        self.mark_terminal(id, MissionStatus::Completed, report).await
    }

    pub async fn fail(&self, id: i64, reason: &str) -> Result<bool> {
        self.mark_terminal(id, MissionStatus::Failed, reason).await
    }

    pub async fn get(&self, id: i64) -> Result<Option<MissionLog>> {
        let row = sqlx::query_as::<_, MissionLogRow>(
            "SELECT id, conversation_id, query, response, status, created_at \
             FROM mission_logs WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        row.map(MissionLog::try_from).transpose()
    }

    pub async fn find_by_conversation(&self, conversation_id: i64) -> Result<Option<MissionLog>> {
        let row = sqlx::query_as::<_, MissionLogRow>(
            "SELECT id, conversation_id, query, response, status, created_at \
             FROM mission_logs WHERE conversation_id = ? ORDER BY created_at DESC LIMIT 1",
        )
        .bind(conversation_id)
        .fetch_optional(self.pool)
        .await?;
        row.map(MissionLog::try_from).transpose()
    }

    pub async fn list_recent(&self, limit: i64) -> Result<Vec<MissionLog>> {
        let rows = sqlx::query_as::<_, MissionLogRow>(
            "SELECT id, conversation_id, query, response, status, created_at \
             FROM mission_logs ORDER BY created_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(MissionLog::try_from).collect()
    }

    pub async fn stats(&self) -> Result<MissionStats> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM mission_logs")
            .fetch_one(self.pool)
            .await?;
        let completed: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM mission_logs WHERE status = ?")
                .bind(MissionStatus::Completed.to_string())
                .fetch_one(self.pool)
                .await?;
        let failed: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM mission_logs WHERE status = ?")
            .bind(MissionStatus::Failed.to_string())
            .fetch_one(self.pool)
            .await?;

        Ok(MissionStats {
            total_missions: total,
            completed_missions: completed,
            failed_missions: failed,
        })
    }
}
