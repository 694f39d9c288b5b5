//! In-process BERT encoder via candle.
//!
//! The model directory must hold `config.json`, `tokenizer.json` and
//! `model.safetensors`. Sentence vectors are the attention-masked mean of
//! the last hidden state, L2-normalized.

use crate::EmbeddingProvider;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config};
use core_types::{BuildError, BuildResult};
use std::path::Path;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tracing::{debug, info};

const MAX_SEQUENCE_TOKENS: usize = 512;

pub struct LocalProvider {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    model_id: String,
    location: String,
}

impl LocalProvider {
    pub fn load(dir: &Path, model_id: &str) -> BuildResult<Self> {
        let location = dir.display().to_string();
        let unavailable = |reason: String| BuildError::ProviderUnavailable {
            endpoint: location.clone(),
            reason,
        };

        let config_raw = std::fs::read_to_string(dir.join("config.json"))
            .map_err(|e| unavailable(format!("cannot read config.json: {e}")))?;
        let config: Config = serde_json::from_str(&config_raw)
            .map_err(|e| unavailable(format!("unsupported config.json: {e}")))?;

        let mut tokenizer = Tokenizer::from_file(dir.join("tokenizer.json"))
            .map_err(|e| unavailable(format!("cannot load tokenizer.json: {e}")))?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..PaddingParams::default()
        }));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQUENCE_TOKENS,
                ..TruncationParams::default()
            }))
            .map_err(|e| unavailable(format!("cannot configure truncation: {e}")))?;

        let weights = std::fs::read(dir.join("model.safetensors"))
            .map_err(|e| unavailable(format!("cannot read model.safetensors: {e}")))?;
        let device = Device::Cpu;
        let vb = VarBuilder::from_buffered_safetensors(weights, DType::F32, &device)
            .map_err(|e| unavailable(format!("invalid safetensors: {e}")))?;
        let model = BertModel::load(vb, &config)
            .map_err(|e| unavailable(format!("cannot build BERT model: {e}")))?;

        info!(model_dir = %location, "loaded local embedding model");
        Ok(Self {
            model,
            tokenizer,
            device,
            model_id: model_id.to_string(),
            location,
        })
    }

    fn encode(&self, batch: &[String]) -> candle_core::Result<Vec<Vec<f32>>> {
        let encodings = self
            .tokenizer
            .encode_batch(batch.to_vec(), true)
            .map_err(|e| candle_core::Error::Msg(e.to_string()))?;

        let mut ids = Vec::with_capacity(encodings.len());
        let mut masks = Vec::with_capacity(encodings.len());
        for enc in &encodings {
            ids.push(Tensor::new(enc.get_ids(), &self.device)?);
            masks.push(Tensor::new(enc.get_attention_mask(), &self.device)?);
        }
        let input_ids = Tensor::stack(&ids, 0)?;
        let attention_mask = Tensor::stack(&masks, 0)?;
        let token_type_ids = input_ids.zeros_like()?;

        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        let mask = attention_mask.to_dtype(DType::F32)?.unsqueeze(2)?;
        let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
        let counts = mask.sum(1)?.clamp(1e-9f32, f32::MAX)?;
        let pooled = summed.broadcast_div(&counts)?;
        let norms = pooled.sqr()?.sum_keepdim(1)?.sqrt()?.clamp(1e-12f32, f32::MAX)?;
        pooled.broadcast_div(&norms)?.to_vec2::<f32>()
    }
}

impl EmbeddingProvider for LocalProvider {
    fn endpoint(&self) -> &str {
        &self.location
    }

    fn list_models(&self) -> BuildResult<Vec<String>> {
        Ok(vec![self.model_id.clone()])
    }

    fn embed(&self, _model: &str, batch: &[String]) -> BuildResult<Vec<Vec<f32>>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        debug!(len = batch.len(), "encoding batch locally");
        self.encode(batch)
            .map_err(|e| BuildError::ProviderUnavailable {
                endpoint: self.location.clone(),
                reason: e.to_string(),
            })
    }
}
