//! Retrieval-augmented question answering over the accumulated memory.

use crate::embed::Embedder;
use crate::error::{MemoryError, Result};
use crate::store::DocumentStore;
use recon_llm::{GenerateOptions, LlmClient};
use std::sync::Arc;
use tracing::debug;

pub const RAG_TOP_K: usize = 7;

pub const NO_CONTEXT_ANSWER: &str =
    "I could not find any stored research for this conversation. \
     Run a research mission first, then ask your question again.";

const CONTEXT_SEPARATOR: &str = "\n---\n";

#[derive(Debug, Clone)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<String>,
}

pub struct RagService {
    embedder: Arc<dyn Embedder>,
    store: Arc<DocumentStore>,
    llm: Arc<dyn LlmClient>,
}

impl RagService {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<DocumentStore>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            embedder,
            store,
            llm,
        }
    }

    /// Answer a question from stored chunks. Retrieval is scoped to the
    /// given conversation when one is provided; with `None` it spans all
    /// conversations.
    pub async fn ask(&self, question: &str, conversation_id: Option<i64>) -> Result<RagAnswer> {
        let query_vector = self
            .embedder
            .embed(vec![question.to_string()])
            .await
            .map_err(|e| MemoryError::RagUnavailable(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| MemoryError::RagUnavailable("embedder returned no vector".to_string()))?;

        let hits = self
            .store
            .query(query_vector, RAG_TOP_K, conversation_id)
            .await
            .map_err(|e| MemoryError::RagUnavailable(e.to_string()))?;

        if hits.is_empty() {
            debug!(?conversation_id, "no context found for question");
            return Ok(RagAnswer {
                answer: NO_CONTEXT_ANSWER.to_string(),
                sources: Vec::new(),
            });
        }

        let context = hits
            .iter()
            .map(|h| h.text.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);

        let prompt = format!(
            "Based on this context, answer: {}\n\nCONTEXT:\n{}",
            question, context
        );

        let answer = self.llm.generate(&prompt, &GenerateOptions::default()).await?;

        // Distinct source titles in retrieval order.
        let mut sources: Vec<String> = Vec::new();
        for hit in &hits {
            if !hit.title.is_empty() && !sources.contains(&hit.title) {
                sources.push(hit.title.clone());
            }
        }

        Ok(RagAnswer { answer, sources })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{BackendError, ChunkRecord, RetrievedChunk, VectorBackend};
    use async_trait::async_trait;
    use recon_llm::LlmError;

    struct FixedEmbedder {
        dimension: usize,
        fail: bool,
    }

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, texts: Vec<String>) -> crate::error::Result<Vec<Vec<f32>>> {
            if self.fail {
                return Err(MemoryError::Embedding("model unavailable".to_string()));
            }
            Ok(texts.iter().map(|_| vec![0.5; self.dimension]).collect())
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn model_name(&self) -> &str {
            "fixed-test-model"
        }
    }

    /// Backend holding canned chunks per conversation.
    struct CannedBackend {
        chunks: Vec<RetrievedChunk>,
    }

    #[async_trait]
    impl VectorBackend for CannedBackend {
        async fn add(&self, _records: Vec<ChunkRecord>) -> std::result::Result<(), BackendError> {
            Ok(())
        }

        async fn query(
            &self,
            _vector: Vec<f32>,
            top_k: usize,
            conversation_id: Option<i64>,
        ) -> std::result::Result<Vec<RetrievedChunk>, BackendError> {
            Ok(self
                .chunks
                .iter()
                .filter(|c| conversation_id.map_or(true, |id| c.conversation_id == id))
                .take(top_k)
                .cloned()
                .collect())
        }

        async fn reset(&self) -> std::result::Result<(), BackendError> {
            Ok(())
        }

        async fn ping(&self) -> std::result::Result<(), BackendError> {
            Ok(())
        }
    }

    struct EchoLlm;

    #[async_trait]
    impl LlmClient for EchoLlm {
        async fn generate(
            &self,
            prompt: &str,
            _options: &GenerateOptions,
        ) -> std::result::Result<String, LlmError> {
            Ok(format!("ANSWER<{}>", prompt.len()))
        }

        fn max_payload_bytes(&self) -> usize {
            28 * 1024
        }

        fn provider(&self) -> &str {
            "echo"
        }
    }

    fn chunk(conversation_id: i64, title: &str, text: &str) -> RetrievedChunk {
        RetrievedChunk {
            text: text.to_string(),
            score: 0.9,
            title: title.to_string(),
            conversation_id,
        }
    }

    fn service(chunks: Vec<RetrievedChunk>, fail_embed: bool) -> RagService {
        RagService::new(
            Arc::new(FixedEmbedder {
                dimension: 4,
                fail: fail_embed,
            }),
            Arc::new(DocumentStore::new(Arc::new(CannedBackend { chunks }))),
            Arc::new(EchoLlm),
        )
    }

    #[tokio::test]
    async fn no_hits_return_fixed_answer_with_empty_sources() {
        let svc = service(vec![], false);
        let result = svc.ask("What was the H100 price?", Some(7)).await.unwrap();
        assert_eq!(result.answer, NO_CONTEXT_ANSWER);
        assert!(result.sources.is_empty());
    }

    #[tokio::test]
    async fn retrieval_is_scoped_to_the_conversation() {
        let svc = service(
            vec![
                chunk(7, "H100 Pricing Report", "the H100 sells for $30,000"),
                chunk(9, "Other Report", "unrelated conversation data"),
            ],
            false,
        );

        let result = svc.ask("What was the H100 price?", Some(7)).await.unwrap();
        assert_eq!(result.sources, vec!["H100 Pricing Report".to_string()]);
    }

    #[tokio::test]
    async fn sources_are_distinct_titles_in_order() {
        let svc = service(
            vec![
                chunk(7, "Report A", "one"),
                chunk(7, "Report A", "two"),
                chunk(7, "Report B", "three"),
            ],
            false,
        );

        let result = svc.ask("question", Some(7)).await.unwrap();
        assert_eq!(
            result.sources,
            vec!["Report A".to_string(), "Report B".to_string()]
        );
    }

    #[tokio::test]
    async fn embedding_failure_surfaces_as_rag_unavailable() {
        let svc = service(vec![chunk(7, "Report", "text")], true);
        let result = svc.ask("question", Some(7)).await;
        assert!(matches!(result, Err(MemoryError::RagUnavailable(_))));
    }
}
