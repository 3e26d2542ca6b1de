pub mod client;
pub mod error;
pub mod models;
pub mod repositories;
pub mod schema;

pub use client::PersistClient;
pub use error::{PersistError, Result};
pub use models::{ChatMessage, Conversation, MessageRole, MissionLog, MissionStats, MissionStatus};
pub use repositories::{title_from_input, ConversationRepository, MessageRepository, MissionRepository};
