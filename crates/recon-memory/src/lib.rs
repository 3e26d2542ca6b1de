pub mod chunk;
pub mod embed;
pub mod error;
pub mod ingest;
pub mod rag;
pub mod store;

pub use chunk::{chunk_text, ChunkParams};
pub use embed::{model_dimension, Embedder, FastEmbedder};
pub use error::MemoryError;
pub use ingest::MemoryIngestor;
pub use rag::{RagAnswer, RagService, NO_CONTEXT_ANSWER, RAG_TOP_K};
pub use store::{BackendError, ChunkRecord, DocumentStore, QdrantBackend, RetrievedChunk, VectorBackend};
