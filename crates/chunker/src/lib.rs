//! Document chunking: token-bounded pieces with overlap, ready for embedding.
//!
//! A document within the token budget becomes a single unchunked row.
//! Longer documents go through the [`RecursiveSplitter`] with character
//! budgets derived from the token budget ([`CHARS_PER_TOKEN`] chars/token),
//! and pieces below the minimum size are dropped.

pub mod splitter;
pub mod tokenizer;

pub use splitter::{DEFAULT_SEPARATORS, RecursiveSplitter};
pub use tokenizer::{ApproxTokenCounter, CHARS_PER_TOKEN, HfTokenCounter, TokenCounter};

use core_types::config::ChunkingConfig;
use core_types::{BuildResult, Chunk, Document};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
    pub min_chunk_size: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            overlap_tokens: 128,
            min_chunk_size: 100,
        }
    }
}

impl From<&ChunkingConfig> for ChunkerConfig {
    fn from(cfg: &ChunkingConfig) -> Self {
        Self {
            max_tokens: cfg.max_tokens,
            overlap_tokens: cfg.overlap_tokens,
            min_chunk_size: cfg.min_chunk_size,
        }
    }
}

/// Build the token counter described by the chunking config.
pub fn token_counter_from_config(cfg: &ChunkingConfig) -> BuildResult<Arc<dyn TokenCounter>> {
    match &cfg.tokenizer {
        Some(path) => Ok(Arc::new(HfTokenCounter::from_file(path)?)),
        None => Ok(Arc::new(ApproxTokenCounter)),
    }
}

pub struct Chunker {
    config: ChunkerConfig,
    counter: Arc<dyn TokenCounter>,
    splitter: RecursiveSplitter,
}

impl Chunker {
    pub fn new(config: ChunkerConfig, counter: Arc<dyn TokenCounter>) -> Self {
        let splitter = RecursiveSplitter::new(
            config.max_tokens * CHARS_PER_TOKEN,
            config.overlap_tokens * CHARS_PER_TOKEN,
        );
        Self {
            config,
            counter,
            splitter,
        }
    }

    pub const fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Chunk one document. Never returns an empty vector.
    pub fn chunk(&self, doc: &Document) -> Vec<Chunk> {
        let tokens = self.counter.count(&doc.text);
        if tokens <= self.config.max_tokens {
            return vec![Chunk::whole(doc)];
        }

        let pieces = self.splitter.split(&doc.text);
        let total = pieces.len();
        let mut sized: Vec<(String, usize)> = pieces
            .into_iter()
            .map(|p| {
                let n = self.counter.count(&p);
                (p, n)
            })
            .collect();

        let kept: Vec<String> = if sized.iter().any(|(_, n)| *n >= self.config.min_chunk_size) {
            sized
                .into_iter()
                .filter(|(_, n)| *n >= self.config.min_chunk_size)
                .map(|(p, _)| p)
                .collect()
        } else {
            // Every piece is below the minimum; keep the largest so the document stays indexed.
            sized.sort_by(|a, b| b.1.cmp(&a.1));
            sized.into_iter().take(1).map(|(p, _)| p).collect()
        };

        if kept.is_empty() {
            warn!(
                slug = %doc.slug,
                tokens,
                "splitting produced no usable pieces; indexing the document whole"
            );
            return vec![Chunk::whole(doc)];
        }

        debug!(
            slug = %doc.slug,
            tokens,
            pieces = total,
            kept = kept.len(),
            "split document"
        );

        kept.into_iter()
            .enumerate()
            .map(|(i, text)| Chunk::piece(doc, i as u32, text))
            .collect()
    }

    /// Chunk every document, preserving document order.
    pub fn chunk_all(&self, docs: &[Document]) -> Vec<Chunk> {
        let chunks: Vec<Chunk> = docs.iter().flat_map(|d| self.chunk(d)).collect();
        let chunked = chunks.iter().filter(|c| c.is_chunked).count();
        info!(
            documents = docs.len(),
            chunks = chunks.len(),
            chunked,
            unchanged = chunks.len() - chunked,
            max_tokens = self.config.max_tokens,
            overlap_tokens = self.config.overlap_tokens,
            tokenizer = self.counter.name(),
            "chunked documents"
        );
        chunks
    }
}

/// One unchunked row per document (chunking disabled).
pub fn whole_documents(docs: &[Document]) -> Vec<Chunk> {
    info!(documents = docs.len(), "chunking disabled; embedding full documents");
    docs.iter().map(Chunk::whole).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One token per whitespace-separated word.
    struct WordCounter;

    impl TokenCounter for WordCounter {
        fn count(&self, text: &str) -> usize {
            text.split_whitespace().count()
        }

        fn name(&self) -> &str {
            "words"
        }
    }

    /// `n` three-letter words: four characters per token including the space.
    fn words(n: usize) -> String {
        (0..n)
            .map(|i| format!("w{:02}", i % 100))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn chunker() -> Chunker {
        Chunker::new(ChunkerConfig::default(), Arc::new(WordCounter))
    }

    #[test]
    fn short_document_is_single_unchunked_row() {
        let doc = Document::new("a", "A", words(50));
        let chunks = chunker().chunk(&doc);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, doc.text);
        assert_eq!(chunks[0].id, "a");
        assert!(!chunks[0].is_chunked);
        assert_eq!(chunks[0].chunk_index, 0);
    }

    #[test]
    fn empty_document_yields_degenerate_chunk() {
        let doc = Document::new("empty", "Empty", "");
        let chunks = chunker().chunk(&doc);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "");
        assert!(!chunks[0].is_chunked);
    }

    #[test]
    fn long_and_short_documents() {
        let a = Document::new("doc-a", "A", words(50));
        let b = Document::new("doc-b", "B", words(2000));
        let chunks = chunker().chunk_all(&[a, b]);

        assert_eq!(chunks[0].id, "doc-a");
        assert!(!chunks[0].is_chunked);

        let b_chunks: Vec<&Chunk> = chunks.iter().filter(|c| c.parent_slug == "doc-b").collect();
        assert!(b_chunks.len() >= 4, "got {} chunks", b_chunks.len());
        for (i, c) in b_chunks.iter().enumerate() {
            assert!(c.is_chunked);
            assert_eq!(c.chunk_index as usize, i);
            assert_eq!(c.id, format!("doc-b#chunk{i}"));
            assert_eq!(c.title, "B");
            assert!(WordCounter.count(&c.text) <= 512 + 128);
            assert!(WordCounter.count(&c.text) >= 100);
        }
    }

    #[test]
    fn tiny_tail_pieces_are_dropped() {
        // ~2048-char budget; a 2100-char body leaves a short tail piece.
        let cfg = ChunkerConfig {
            max_tokens: 512,
            overlap_tokens: 0,
            min_chunk_size: 100,
        };
        let doc = Document::new("t", "T", "abcd ".repeat(420));
        let chunks = Chunker::new(cfg, Arc::new(ApproxTokenCounter)).chunk(&doc);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "t#chunk0");
        assert!(chunks[0].is_chunked);
    }

    #[test]
    fn all_small_pieces_keep_largest() {
        let cfg = ChunkerConfig {
            max_tokens: 4,
            overlap_tokens: 0,
            min_chunk_size: 1000,
        };
        let doc = Document::new("s", "S", words(30));
        let chunks = Chunker::new(cfg, Arc::new(WordCounter)).chunk(&doc);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_chunked);
        assert_eq!(chunks[0].chunk_index, 0);
    }

    #[test]
    fn whitespace_only_document_still_yields_a_row() {
        let doc = Document::new("ws", "WS", "\n".repeat(3000));
        let chunks = Chunker::new(ChunkerConfig::default(), Arc::new(ApproxTokenCounter)).chunk(&doc);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "ws");
        assert!(!chunks[0].is_chunked);
        assert_eq!(chunks[0].text, doc.text);
    }

    #[test]
    fn whole_documents_skip_chunking() {
        let docs = vec![Document::new("x", "X", words(5000))];
        let chunks = whole_documents(&docs);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "x");
        assert!(!chunks[0].is_chunked);
    }
}
