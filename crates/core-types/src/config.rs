//! Build configuration: TOML file + defaults, overridden by CLI flags.

use crate::{BuildError, BuildResult, ElementType};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "embed-build.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub input: InputConfig,
    pub output: OutputConfig,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub vectors: VectorConfig,
    pub hnsw: HnswConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// JSON Lines file with `{slug, title, text}` records.
    pub jsonl: PathBuf,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            jsonl: PathBuf::from("public/embeddings-text.jsonl"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// URL prefix written into manifest paths (`/embeddings/vectors-000.bin`).
    pub public_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("public/embeddings"),
            public_path: "/embeddings".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub enabled: bool,
    pub max_tokens: usize,
    pub overlap_tokens: usize,
    pub min_chunk_size: usize,
    /// Optional `tokenizer.json`; without it tokens are approximated from characters.
    pub tokenizer: Option<PathBuf>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_tokens: 512,
            overlap_tokens: 128,
            min_chunk_size: 100,
            tokenizer: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-compatible HTTP endpoint (vLLM, OpenAI, TEI, ...).
    #[default]
    Remote,
    /// Model loaded in-process from a local directory.
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: ProviderKind,
    pub model: String,
    pub base_url: String,
    /// Local model directory (`config.json`, `tokenizer.json`, `model.safetensors`).
    pub model_dir: Option<PathBuf>,
    /// Named prefix profile; detected from the model id when unset.
    pub profile: Option<String>,
    pub batch_size: usize,
    pub concurrency: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Remote,
            model: "intfloat/multilingual-e5-large".to_string(),
            base_url: "http://127.0.0.1:8000/v1".to_string(),
            model_dir: None,
            profile: None,
            batch_size: 64,
            concurrency: 8,
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorConfig {
    pub dims: usize,
    pub dtype: ElementType,
    pub shard_size_rows: usize,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            dims: 1024,
            dtype: ElementType::Fp32,
            shard_size_rows: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HnswConfig {
    pub m: usize,
    pub ef_construction: usize,
    pub seed: u64,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    /// Also write logs to this file (non-blocking appender).
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

impl AppConfig {
    /// Parse a TOML document; missing sections and keys take their defaults.
    pub fn from_toml_str(raw: &str) -> BuildResult<Self> {
        toml::from_str(raw)
            .map_err(|e| BuildError::InvalidConfiguration(format!("config parse error: {e}")))
    }

    /// Reject parameter combinations the pipeline cannot run with.
    pub fn validate(&self) -> BuildResult<()> {
        let invalid = |msg: &str| Err(BuildError::InvalidConfiguration(msg.to_string()));

        if self.vectors.dims == 0 {
            return invalid("vectors.dims must be greater than zero");
        }
        if self.vectors.shard_size_rows == 0 {
            return invalid("vectors.shard_size_rows must be greater than zero");
        }
        if self.embedding.batch_size == 0 {
            return invalid("embedding.batch_size must be greater than zero");
        }
        if self.embedding.concurrency == 0 {
            return invalid("embedding.concurrency must be greater than zero");
        }
        if self.embedding.model.trim().is_empty() {
            return invalid("embedding.model must be non-empty");
        }
        if self.embedding.provider == ProviderKind::Remote && self.embedding.base_url.trim().is_empty()
        {
            return invalid("embedding.base_url must be non-empty for the remote provider");
        }
        if self.hnsw.m == 0 {
            return invalid("hnsw.m must be greater than zero");
        }
        if self.hnsw.ef_construction == 0 {
            return invalid("hnsw.ef_construction must be greater than zero");
        }
        if self.chunking.enabled {
            if self.chunking.max_tokens == 0 {
                return invalid("chunking.max_tokens must be greater than zero");
            }
            if self.chunking.overlap_tokens >= self.chunking.max_tokens {
                return invalid("chunking.overlap_tokens must be smaller than chunking.max_tokens");
            }
        }
        Ok(())
    }
}

/// Load configuration from `path`, or from [`DEFAULT_CONFIG_FILE`] in the
/// working directory when present, otherwise defaults.
pub fn load_config(path: Option<&Path>) -> BuildResult<AppConfig> {
    let candidate = match path {
        Some(p) => {
            if !p.exists() {
                return Err(BuildError::InvalidConfiguration(format!(
                    "config file {} does not exist",
                    p.display()
                )));
            }
            Some(p.to_path_buf())
        }
        None => {
            let local = PathBuf::from(DEFAULT_CONFIG_FILE);
            local.exists().then_some(local)
        }
    };

    match candidate {
        Some(file) => {
            let raw = std::fs::read_to_string(&file)?;
            AppConfig::from_toml_str(&raw)
        }
        None => Ok(AppConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_validate() {
        let cfg = AppConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.vectors.dims, 1024);
        assert_eq!(cfg.hnsw.ef_construction, 200);
        assert_eq!(cfg.embedding.concurrency, 8);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = AppConfig::from_toml_str(
            r#"
            [vectors]
            dims = 384
            dtype = "fp16"

            [embedding]
            provider = "local"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.vectors.dims, 384);
        assert_eq!(cfg.vectors.dtype, ElementType::Fp16);
        assert_eq!(cfg.vectors.shard_size_rows, 1024);
        assert_eq!(cfg.embedding.provider, ProviderKind::Local);
        assert_eq!(cfg.chunking.max_tokens, 512);
    }

    #[test]
    fn unsupported_dtype_is_invalid_configuration() {
        let err = AppConfig::from_toml_str("[vectors]\ndtype = \"int8\"\n").unwrap_err();
        assert!(matches!(err, BuildError::InvalidConfiguration(_)));
    }

    #[test]
    fn validate_rejects_empty_base_url() {
        let mut cfg = AppConfig::default();
        cfg.embedding.base_url = "  ".into();
        assert!(matches!(
            cfg.validate(),
            Err(BuildError::InvalidConfiguration(_))
        ));

        cfg.embedding.provider = ProviderKind::Local;
        cfg.validate().unwrap();
    }

    #[test]
    fn validate_rejects_overlap_not_below_chunk_size() {
        let mut cfg = AppConfig::default();
        cfg.chunking.overlap_tokens = cfg.chunking.max_tokens;
        assert!(cfg.validate().is_err());

        cfg.chunking.enabled = false;
        cfg.validate().unwrap();
    }

    #[test]
    fn load_config_reads_explicit_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("build.toml");
        std::fs::write(&path, "[hnsw]\nm = 8\nseed = 7\n").unwrap();

        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.hnsw.m, 8);
        assert_eq!(cfg.hnsw.seed, 7);

        let missing = dir.path().join("nope.toml");
        assert!(load_config(Some(&missing)).is_err());
    }
}
