//! Report ingestion: chunk, embed, write to the vector store.

use crate::chunk::{chunk_text, ChunkParams};
use crate::embed::Embedder;
use crate::error::Result;
use crate::store::{ChunkRecord, DocumentStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

pub struct MemoryIngestor {
    embedder: Arc<dyn Embedder>,
    store: Arc<DocumentStore>,
    params: ChunkParams,
}

impl MemoryIngestor {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<DocumentStore>) -> Self {
        Self {
            embedder,
            store,
            params: ChunkParams::default(),
        }
    }

    pub fn with_params(mut self, params: ChunkParams) -> Self {
        self.params = params;
        self
    }

    /// Chunk and embed `text`, then write all chunks tagged with the
    /// conversation. Returns the number of chunks written.
    pub async fn ingest(&self, title: &str, text: &str, conversation_id: i64) -> Result<usize> {
        let chunks = chunk_text(text, &self.params);
        if chunks.is_empty() {
            return Ok(0);
        }

        let vectors = self.embedder.embed(chunks.clone()).await?;
        let now = Utc::now();

        let records: Vec<ChunkRecord> = chunks
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(ordinal, (text, vector))| ChunkRecord {
                key: format!("{}-{}", title, ordinal),
                vector,
                text,
                conversation_id,
                title: title.to_string(),
                timestamp: now,
            })
            .collect();

        let written = records.len();
        self.store.add(records).await?;

        debug!(title, conversation_id, chunks = written, "ingested report");
        Ok(written)
    }
}
