use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request payload of {size} bytes exceeds the provider limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("provider quota exhausted after {attempts} attempts")]
    QuotaExhausted { attempts: u32 },

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("provider returned an unusable response: {0}")]
    InvalidResponse(String),

    #[error("model discovery failed: {0}")]
    ModelDiscovery(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, LlmError>;
