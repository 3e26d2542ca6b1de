mod conversation;
mod message;
mod mission;

pub use conversation::{title_from_input, ConversationRepository};
pub use message::MessageRepository;
pub use mission::MissionRepository;
