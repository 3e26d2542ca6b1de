//! Embedding backends
//!
//! All vectors produced in one process share the same dimension; mixing
//! models with different dimensions is a programming error.

mod fastembed_impl;

pub use fastembed_impl::FastEmbedder;

use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, preserving order.
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Fixed output dimension of this embedder.
    fn dimension(&self) -> usize;

    fn model_name(&self) -> &str;
}

/// Expected dimension for known models.
pub fn model_dimension(model_name: &str) -> Option<usize> {
    match model_name {
        "BAAI/bge-small-en-v1.5" => Some(384),
        "BAAI/bge-base-en-v1.5" => Some(768),
        "BAAI/bge-large-en-v1.5" => Some(1024),
        "sentence-transformers/all-MiniLM-L6-v2" => Some(384),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_model_dimensions() {
        assert_eq!(model_dimension("BAAI/bge-small-en-v1.5"), Some(384));
        assert_eq!(model_dimension("BAAI/bge-base-en-v1.5"), Some(768));
        assert_eq!(model_dimension("unknown-model"), None);
    }
}
