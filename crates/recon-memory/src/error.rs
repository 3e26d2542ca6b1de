use thiserror::Error;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Retrieval unavailable: {0}")]
    RagUnavailable(String),

    #[error("LLM error: {0}")]
    Llm(#[from] recon_llm::LlmError),
}

pub type Result<T> = std::result::Result<T, MemoryError>;
