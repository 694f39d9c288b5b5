//! Token counting collaborators. Constructed once by the caller and passed
//! into the [`crate::Chunker`]; nothing here is cached globally.

use core_types::{BuildError, BuildResult};
use std::path::Path;
use tokenizers::Tokenizer;
use tracing::warn;

/// Characters per token assumed before tokenization.
pub const CHARS_PER_TOKEN: usize = 4;

pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;

    fn name(&self) -> &str;
}

/// `ceil(chars / 4)`; used when no tokenizer file is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct ApproxTokenCounter;

impl TokenCounter for ApproxTokenCounter {
    fn count(&self, text: &str) -> usize {
        text.chars().count().div_ceil(CHARS_PER_TOKEN)
    }

    fn name(&self) -> &str {
        "approx-chars/4"
    }
}

/// Hugging Face tokenizer loaded from a `tokenizer.json`.
pub struct HfTokenCounter {
    tokenizer: Tokenizer,
    label: String,
}

impl HfTokenCounter {
    pub fn from_file(path: &Path) -> BuildResult<Self> {
        let mut tokenizer = Tokenizer::from_file(path).map_err(|e| {
            BuildError::InvalidConfiguration(format!(
                "failed to load tokenizer {}: {e}",
                path.display()
            ))
        })?;
        // Counting must see the whole text, not the model's max length.
        tokenizer.with_truncation(None).map_err(|e| {
            BuildError::InvalidConfiguration(format!("failed to disable truncation: {e}"))
        })?;
        tokenizer.with_padding(None);
        Ok(Self {
            tokenizer,
            label: path.display().to_string(),
        })
    }
}

impl TokenCounter for HfTokenCounter {
    fn count(&self, text: &str) -> usize {
        match self.tokenizer.encode(text, false) {
            Ok(encoding) => encoding.len(),
            Err(err) => {
                warn!(error = %err, "tokenizer failed; approximating token count");
                ApproxTokenCounter.count(text)
            }
        }
    }

    fn name(&self) -> &str {
        &self.label
    }
}
