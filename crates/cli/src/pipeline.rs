//! End-to-end build: documents → chunks → vectors → index directory.

use crate::input::load_documents;
use chunker::{Chunker, ChunkerConfig, token_counter_from_config, whole_documents};
use core_types::config::AppConfig;
use core_types::{BuildError, BuildResult, Chunk};
use embedder::{BatchEmbedder, BatchProgress, EmbeddingProfile, EmbeddingProvider};
use semantic_index::{HnswParams, IndexOptions, VectorMatrix, write_index};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Debug, Clone)]
pub struct BuildSummary {
    pub documents: usize,
    pub chunks: usize,
    pub chunked: usize,
    pub model: String,
    pub profile: EmbeddingProfile,
    pub shards: usize,
    pub max_level: usize,
    pub out_dir: PathBuf,
    pub elapsed: Duration,
}

pub fn chunk_documents(cfg: &AppConfig, docs: &[core_types::Document]) -> BuildResult<Vec<Chunk>> {
    if !cfg.chunking.enabled {
        return Ok(whole_documents(docs));
    }
    let counter = token_counter_from_config(&cfg.chunking)?;
    let chunker = Chunker::new(ChunkerConfig::from(&cfg.chunking), counter);
    Ok(chunker.chunk_all(docs))
}

/// Run every stage. Returns [`BuildError::NoInputData`] before touching the
/// output directory when the input holds no documents.
pub fn run_build(
    cfg: &AppConfig,
    provider: Arc<dyn EmbeddingProvider>,
    on_progress: &mut dyn FnMut(BatchProgress),
) -> BuildResult<BuildSummary> {
    let started = Instant::now();
    cfg.validate()?;

    let docs = load_documents(&cfg.input.jsonl)?;
    if docs.is_empty() {
        return Err(BuildError::NoInputData);
    }

    let chunks = chunk_documents(cfg, &docs)?;
    let chunked = chunks.iter().filter(|c| c.is_chunked).count();

    let embedder = BatchEmbedder::new(
        provider,
        cfg.embedding.batch_size,
        cfg.embedding.concurrency,
    );
    let model = embedder.resolve_model(&cfg.embedding.model)?;
    let profile = EmbeddingProfile::resolve(cfg.embedding.profile.as_deref(), &model)?;
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let raw = embedder.embed_all(&model, profile, &texts, on_progress)?;

    let mut vectors = VectorMatrix::from_rows(&raw, cfg.vectors.dims);
    drop(raw);
    vectors.normalize_rows();

    let options = IndexOptions {
        dtype: cfg.vectors.dtype,
        shard_size_rows: cfg.vectors.shard_size_rows,
        public_path: cfg.output.public_path.clone(),
        hnsw: HnswParams::from(&cfg.hnsw),
    };
    let written = write_index(&cfg.output.dir, &chunks, &vectors, &options)?;

    let summary = BuildSummary {
        documents: docs.len(),
        chunks: chunks.len(),
        chunked,
        model,
        profile,
        shards: written.manifest.vectors.shards.len(),
        max_level: written.manifest.hnsw.max_level,
        out_dir: cfg.output.dir.clone(),
        elapsed: started.elapsed(),
    };
    info!(
        documents = summary.documents,
        chunks = summary.chunks,
        shards = summary.shards,
        max_level = summary.max_level,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "build complete"
    );
    Ok(summary)
}
