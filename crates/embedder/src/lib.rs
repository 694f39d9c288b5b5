//! Embedding backends and the ordered batch pool that drives them.
//!
//! Every backend implements [`EmbeddingProvider`]; the pipeline only sees the
//! trait. The remote backend speaks the OpenAI-compatible `/models` and
//! `/embeddings` API. The local backend (feature `local-model`) runs a BERT
//! checkpoint in-process with candle.

#[cfg(feature = "local-model")]
pub mod local;
pub mod pool;
pub mod profile;
pub mod remote;

pub use pool::{BatchEmbedder, BatchProgress};
pub use profile::EmbeddingProfile;
pub use remote::{RemoteProvider, api_key_from_env, resolve_base_url};

use core_types::config::{EmbeddingConfig, ProviderKind};
use core_types::{BuildError, BuildResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// A source of dense vectors for text.
pub trait EmbeddingProvider: Send + Sync {
    /// Human-readable location used in logs and errors.
    fn endpoint(&self) -> &str;

    /// Model identifiers the provider can serve.
    fn list_models(&self) -> BuildResult<Vec<String>>;

    /// One vector per input, in input order.
    fn embed(&self, model: &str, batch: &[String]) -> BuildResult<Vec<Vec<f32>>>;
}

/// Construct the provider selected by `cfg.provider`.
pub fn provider_from_config(cfg: &EmbeddingConfig) -> BuildResult<Arc<dyn EmbeddingProvider>> {
    match cfg.provider {
        ProviderKind::Remote => {
            let base_url = resolve_base_url(&cfg.base_url)?;
            info!(%base_url, model = %cfg.model, "using remote embedding provider");
            let provider = RemoteProvider::new(
                &base_url,
                api_key_from_env(),
                Duration::from_secs(cfg.timeout_secs),
            )?;
            Ok(Arc::new(provider))
        }
        ProviderKind::Local => local_provider(cfg),
    }
}

#[cfg(feature = "local-model")]
fn local_provider(cfg: &EmbeddingConfig) -> BuildResult<Arc<dyn EmbeddingProvider>> {
    let dir = cfg.model_dir.as_deref().ok_or_else(|| {
        BuildError::InvalidConfiguration(
            "embedding.model_dir is required for the local provider".to_string(),
        )
    })?;
    info!(model_dir = %dir.display(), model = %cfg.model, "using local embedding provider");
    Ok(Arc::new(local::LocalProvider::load(dir, &cfg.model)?))
}

#[cfg(not(feature = "local-model"))]
fn local_provider(_cfg: &EmbeddingConfig) -> BuildResult<Arc<dyn EmbeddingProvider>> {
    Err(BuildError::InvalidConfiguration(
        "local provider requires building with the `local-model` feature".to_string(),
    ))
}
