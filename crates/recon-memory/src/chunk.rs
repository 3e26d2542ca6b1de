//! Deterministic text segmentation for ingestion
//!
//! Chunking is pure: the same input always yields the same windows, so
//! re-ingestion is idempotent when chunk ids are derived from
//! `(title, ordinal)`.

#[derive(Debug, Clone)]
pub struct ChunkParams {
    /// Target window size in bytes (snapped down to char boundaries).
    pub chunk_size: usize,
    /// Bytes of trailing context carried into the next window.
    pub overlap: usize,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 150,
        }
    }
}

/// Split `text` into ordered overlapping windows covering the whole input.
pub fn chunk_text(text: &str, params: &ChunkParams) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let chunk_size = params.chunk_size.max(1);
    // Overlap must leave room to advance.
    let overlap = params.overlap.min(chunk_size.saturating_sub(1));

    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        let end = floor_char_boundary(text, (start + chunk_size).min(text.len()));
        chunks.push(text[start..end].to_string());

        if end >= text.len() {
            break;
        }

        let next = floor_char_boundary(text, end.saturating_sub(overlap));
        start = if next <= start { end } else { next };
    }

    chunks
}

fn floor_char_boundary(text: &str, pos: usize) -> usize {
    if pos >= text.len() {
        return text.len();
    }
    let mut adjusted = pos;
    while adjusted > 0 && !text.is_char_boundary(adjusted) {
        adjusted -= 1;
    }
    adjusted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = chunk_text("short document", &ChunkParams::default());
        assert_eq!(chunks, vec!["short document".to_string()]);
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(chunk_text("", &ChunkParams::default()).is_empty());
    }

    #[test]
    fn windows_cover_the_input_with_overlap() {
        let text = "abcdefghij".repeat(30);
        let params = ChunkParams {
            chunk_size: 100,
            overlap: 20,
        };
        let chunks = chunk_text(&text, &params);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= 100);
        }
        // Consecutive windows share their overlap region.
        assert_eq!(&chunks[0][80..], &chunks[1][..20]);
        // Tail of the input is covered.
        assert!(text.ends_with(chunks.last().unwrap()));
    }

    #[test]
    fn chunking_is_deterministic() {
        let text = "lorem ipsum dolor sit amet ".repeat(50);
        let params = ChunkParams::default();
        assert_eq!(chunk_text(&text, &params), chunk_text(&text, &params));
    }

    #[test]
    fn rechunking_a_chunk_is_idempotent() {
        let text = "word ".repeat(400);
        let params = ChunkParams::default();
        for chunk in chunk_text(&text, &params) {
            assert_eq!(chunk_text(&chunk, &params).len(), 1);
        }
    }

    #[test]
    fn multibyte_input_never_splits_a_char() {
        let text = "héllo wörld → ünïcode ".repeat(60);
        let params = ChunkParams {
            chunk_size: 64,
            overlap: 16,
        };
        // Would panic on a bad boundary slice.
        let chunks = chunk_text(&text, &params);
        assert!(!chunks.is_empty());
    }
}
