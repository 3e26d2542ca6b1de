use crate::error::Result;
use crate::repositories::{ConversationRepository, MessageRepository, MissionRepository};
use crate::schema::SCHEMA_SQL;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Base pool size plus overflow headroom.
const MAX_CONNECTIONS: u32 = 15;

/// Connections older than this are recycled.
const CONNECTION_MAX_LIFETIME: Duration = Duration::from_secs(300);

/// Handle to the relational audit log.
///
/// Wraps a connection pool; repositories are cheap views over it.
#[derive(Clone)]
pub struct PersistClient {
    pool: SqlitePool,
}

impl PersistClient {
    /// Connect using a `sqlite:` database URL and initialize the schema.
    pub async fn connect(database_url: &str) -> Result<Self> {
        debug!(%database_url, "connecting to relational store");

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .test_before_acquire(true)
            .max_lifetime(CONNECTION_MAX_LIFETIME)
            .connect_with(options)
            .await?;

        let client = Self { pool };
        client.init_schema().await?;
        Ok(client)
    }

    /// Single-connection in-memory database, used by tests.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let client = Self { pool };
        client.init_schema().await?;
        Ok(client)
    }

    async fn init_schema(&self) -> Result<()> {
        info!("initializing relational schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Lightweight liveness check for health reporting.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub fn conversations(&self) -> ConversationRepository<'_> {
        ConversationRepository::new(&self.pool)
    }

    pub fn messages(&self) -> MessageRepository<'_> {
        MessageRepository::new(&self.pool)
    }

    pub fn missions(&self) -> MissionRepository<'_> {
        MissionRepository::new(&self.pool)
    }
}
