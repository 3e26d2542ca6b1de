//! Vector store adapter
//!
//! One process-wide collection holds all chunks across conversations;
//! isolation is enforced at query time by filtering on `conversation_id`.
//! The adapter owns the dimension self-heal: a mismatch destroys and
//! recreates the collection rather than leaving the index unusable — the
//! relational log keeps the canonical reports, so the index is rebuildable.

mod qdrant;

pub use qdrant::QdrantBackend;

use crate::error::{MemoryError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::warn;

/// Canonical collection name; bump the suffix when the payload schema changes.
pub const COLLECTION_NAME: &str = "document_store_v2";

#[derive(Debug, Error)]
#[error("{0}")]
pub struct BackendError(pub String);

/// A chunk ready to be written, keyed by `(report title, ordinal)`.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub key: String,
    pub vector: Vec<f32>,
    pub text: String,
    pub conversation_id: i64,
    pub title: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub text: String,
    pub score: f32,
    pub title: String,
    pub conversation_id: i64,
}

#[async_trait]
pub trait VectorBackend: Send + Sync {
    async fn add(&self, records: Vec<ChunkRecord>) -> std::result::Result<(), BackendError>;

    /// `conversation_id = None` searches across all conversations.
    async fn query(
        &self,
        vector: Vec<f32>,
        top_k: usize,
        conversation_id: Option<i64>,
    ) -> std::result::Result<Vec<RetrievedChunk>, BackendError>;

    /// Destroy the collection and recreate it empty at the process dimension.
    async fn reset(&self) -> std::result::Result<(), BackendError>;

    async fn ping(&self) -> std::result::Result<(), BackendError>;
}

fn is_dimension_mismatch(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("dimension") || lower.contains("vector size") || lower.contains("expected dim")
}

/// Adapter over a [`VectorBackend`] adding the self-heal path.
pub struct DocumentStore {
    backend: Arc<dyn VectorBackend>,
    heal_lock: Mutex<()>,
}

impl DocumentStore {
    pub fn new(backend: Arc<dyn VectorBackend>) -> Self {
        Self {
            backend,
            heal_lock: Mutex::new(()),
        }
    }

    pub async fn add(&self, records: Vec<ChunkRecord>) -> Result<()> {
        self.run_with_heal(|| self.backend.add(records.clone())).await
    }

    pub async fn query(
        &self,
        vector: Vec<f32>,
        top_k: usize,
        conversation_id: Option<i64>,
    ) -> Result<Vec<RetrievedChunk>> {
        self.run_with_heal(|| self.backend.query(vector.clone(), top_k, conversation_id))
            .await
    }

    pub async fn reset(&self) -> Result<()> {
        let _guard = self.heal_lock.lock().await;
        self.backend.reset().await.map_err(|e| MemoryError::VectorStore(e.0))
    }

    pub async fn ping(&self) -> Result<()> {
        self.backend.ping().await.map_err(|e| MemoryError::VectorStore(e.0))
    }

    /// Run an operation; on a dimension mismatch, serialize behind the heal
    /// lock, retry once (another task may have already healed), then reset
    /// the collection and retry a final time.
    async fn run_with_heal<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, BackendError>>,
    {
        match op().await {
            Ok(value) => Ok(value),
            Err(err) if is_dimension_mismatch(&err.0) => {
                let _guard = self.heal_lock.lock().await;
                match op().await {
                    Ok(value) => Ok(value),
                    Err(err) if is_dimension_mismatch(&err.0) => {
                        warn!(
                            reason = %err.0,
                            "vector collection dimension mismatch, destroying and recreating"
                        );
                        self.backend
                            .reset()
                            .await
                            .map_err(|e| MemoryError::VectorStore(e.0))?;
                        op().await.map_err(|e| MemoryError::VectorStore(e.0))
                    }
                    Err(err) => Err(MemoryError::VectorStore(err.0)),
                }
            }
            Err(err) => Err(MemoryError::VectorStore(err.0)),
        }
    }
}
