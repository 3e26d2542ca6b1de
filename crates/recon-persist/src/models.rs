use crate::error::PersistError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = PersistError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(PersistError::InvalidValue(format!(
                "unknown message role: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub conversation_id: i64,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Mission lifecycle. Transitions are monotonic; a terminal status is
/// written at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MissionStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl MissionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MissionStatus::Completed | MissionStatus::Failed)
    }
}

impl fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissionStatus::Pending => write!(f, "PENDING"),
            MissionStatus::InProgress => write!(f, "IN_PROGRESS"),
            MissionStatus::Completed => write!(f, "COMPLETED"),
            MissionStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl FromStr for MissionStatus {
    type Err = PersistError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(MissionStatus::Pending),
            "IN_PROGRESS" => Ok(MissionStatus::InProgress),
            "COMPLETED" => Ok(MissionStatus::Completed),
            "FAILED" => Ok(MissionStatus::Failed),
            other => Err(PersistError::InvalidValue(format!(
                "unknown mission status: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionLog {
    pub id: i64,
    pub conversation_id: i64,
    pub query: String,
    pub response: Option<String>,
    pub status: MissionStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MissionStats {
    pub total_missions: i64,
    pub completed_missions: i64,
    pub failed_missions: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrip() {
        for status in [
            MissionStatus::Pending,
            MissionStatus::InProgress,
            MissionStatus::Completed,
            MissionStatus::Failed,
        ] {
            let parsed: MissionStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn terminal_statuses() {
        assert!(!MissionStatus::Pending.is_terminal());
        assert!(!MissionStatus::InProgress.is_terminal());
        assert!(MissionStatus::Completed.is_terminal());
        assert!(MissionStatus::Failed.is_terminal());
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!("system".parse::<MessageRole>().is_err());
    }
}
