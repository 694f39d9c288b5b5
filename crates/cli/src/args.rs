//! Command-line surface. Every build flag is optional and only overrides the
//! loaded configuration when given (directly or through its env var).

use clap::{Args, Parser, Subcommand, ValueEnum};
use core_types::ElementType;
use core_types::config::{AppConfig, LogFormat, ProviderKind};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "embed-build",
    version,
    about = "Build a static HNSW semantic index from JSON Lines documents"
)]
pub struct Cli {
    /// TOML configuration file (default: ./embed-build.toml when present).
    #[arg(long, global = true, env = "SEM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `embedder=debug` (RUST_LOG takes precedence).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormatArg>,

    /// Also write logs to this file.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Chunk, embed and index documents, then write shards, graph and manifest.
    Build(BuildArgs),
    /// Check a written index directory against its manifest.
    Verify(VerifyArgs),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ProviderArg {
    Remote,
    Local,
}

impl From<ProviderArg> for ProviderKind {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Remote => Self::Remote,
            ProviderArg::Local => Self::Local,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => Self::Pretty,
            LogFormatArg::Json => Self::Json,
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct BuildArgs {
    /// JSON Lines input with `{slug, title, text}` records.
    #[arg(long, visible_alias = "jsonl", env = "SEM_INPUT")]
    pub input: Option<PathBuf>,

    /// Output directory for shards, graph and manifest.
    #[arg(long, env = "SEM_OUT")]
    pub out: Option<PathBuf>,

    /// URL prefix recorded in manifest file paths.
    #[arg(long, env = "SEM_PUBLIC_PATH")]
    pub public_path: Option<String>,

    #[arg(long, env = "SEM_MODEL")]
    pub model: Option<String>,

    /// Target vector dimension; provider output is truncated or zero-padded.
    #[arg(long, env = "SEM_DIMS")]
    pub dims: Option<usize>,

    /// Shard element type: fp16 or fp32.
    #[arg(long, env = "SEM_DTYPE")]
    pub dtype: Option<ElementType>,

    /// Maximum rows per vector shard.
    #[arg(long, env = "SEM_SHARD")]
    pub shard_size: Option<usize>,

    /// Maximum tokens per chunk.
    #[arg(long, env = "SEM_CHUNK_SIZE")]
    pub chunk_size: Option<usize>,

    /// Overlap tokens between consecutive chunks.
    #[arg(long, env = "SEM_CHUNK_OVERLAP")]
    pub chunk_overlap: Option<usize>,

    /// Chunks under this many tokens are dropped.
    #[arg(long, env = "SEM_MIN_CHUNK_SIZE")]
    pub min_chunk_size: Option<usize>,

    /// Embed whole documents.
    #[arg(long)]
    pub no_chunking: bool,

    /// `tokenizer.json` used for token counts.
    #[arg(long, env = "SEM_TOKENIZER")]
    pub tokenizer: Option<PathBuf>,

    #[arg(long, value_enum, env = "SEM_PROVIDER")]
    pub provider: Option<ProviderArg>,

    /// OpenAI-compatible API root; `/v1/embeddings` URLs are accepted too.
    #[arg(long, env = "VLLM_URL")]
    pub base_url: Option<String>,

    /// Local model directory (`local` provider).
    #[arg(long, env = "SEM_MODEL_DIR")]
    pub model_dir: Option<PathBuf>,

    /// Document prefix profile: e5, qwen3-embedding, embeddinggemma or plain.
    #[arg(long, env = "SEM_PROFILE")]
    pub profile: Option<String>,

    /// Texts per provider request.
    #[arg(long, env = "VLLM_BATCH_SIZE")]
    pub batch_size: Option<usize>,

    /// Concurrent provider requests.
    #[arg(long, env = "VLLM_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Per-request timeout in seconds.
    #[arg(long, env = "SEM_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    #[arg(long, env = "SEM_HNSW_M")]
    pub hnsw_m: Option<usize>,

    #[arg(long, env = "SEM_HNSW_EF_CONSTRUCTION")]
    pub hnsw_ef_construction: Option<usize>,

    /// Seed for HNSW level assignment.
    #[arg(long, env = "SEM_SEED")]
    pub seed: Option<u64>,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Index directory containing `manifest.json`.
    pub dir: PathBuf,
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

impl Cli {
    pub fn apply_logging(&self, cfg: &mut AppConfig) {
        set(&mut cfg.logging.level, self.log_level.clone());
        set(&mut cfg.logging.format, self.log_format.map(Into::into));
        if let Some(file) = &self.log_file {
            cfg.logging.file = Some(file.clone());
        }
    }
}

impl BuildArgs {
    /// Overlay the flags that were given onto `cfg`.
    pub fn apply(&self, cfg: &mut AppConfig) {
        set(&mut cfg.input.jsonl, self.input.clone());
        set(&mut cfg.output.dir, self.out.clone());
        set(&mut cfg.output.public_path, self.public_path.clone());

        set(&mut cfg.embedding.model, self.model.clone());
        set(&mut cfg.embedding.provider, self.provider.map(Into::into));
        let base_url = self
            .base_url
            .clone()
            .or_else(|| std::env::var("VLLM_EMBED_URL").ok().filter(|v| !v.trim().is_empty()));
        set(&mut cfg.embedding.base_url, base_url);
        if let Some(dir) = &self.model_dir {
            cfg.embedding.model_dir = Some(dir.clone());
        }
        if let Some(profile) = &self.profile {
            cfg.embedding.profile = Some(profile.clone());
        }
        set(&mut cfg.embedding.batch_size, self.batch_size);
        set(&mut cfg.embedding.concurrency, self.concurrency);
        set(&mut cfg.embedding.timeout_secs, self.timeout_secs);

        set(&mut cfg.vectors.dims, self.dims);
        set(&mut cfg.vectors.dtype, self.dtype);
        set(&mut cfg.vectors.shard_size_rows, self.shard_size);

        set(&mut cfg.chunking.max_tokens, self.chunk_size);
        set(&mut cfg.chunking.overlap_tokens, self.chunk_overlap);
        set(&mut cfg.chunking.min_chunk_size, self.min_chunk_size);
        if self.no_chunking {
            cfg.chunking.enabled = false;
        }
        if let Some(path) = &self.tokenizer {
            cfg.chunking.tokenizer = Some(path.clone());
        }

        set(&mut cfg.hnsw.m, self.hnsw_m);
        set(&mut cfg.hnsw.ef_construction, self.hnsw_ef_construction);
        set(&mut cfg.hnsw.seed, self.seed);
    }
}
