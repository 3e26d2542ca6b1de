pub mod config;
pub mod error;
pub mod gemini;
pub mod groq;
pub mod retry;
pub mod traits;

pub use config::{ClientFactory, GeminiConfig, GroqConfig, ProviderConfig, ProviderDetails, ProviderType};
pub use error::LlmError;
pub use gemini::GeminiClient;
pub use groq::GroqClient;
pub use traits::{GenerateOptions, LlmClient};
