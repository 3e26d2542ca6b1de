use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Conversation not found: {0}")]
    ConversationNotFound(i64),

    #[error("Mission log not found: {0}")]
    MissionNotFound(i64),

    #[error("Invalid stored value: {0}")]
    InvalidValue(String),
}

pub type Result<T> = std::result::Result<T, PersistError>;
