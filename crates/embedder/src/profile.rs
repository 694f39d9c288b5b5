use core_types::{BuildError, BuildResult};
use std::fmt;
use std::str::FromStr;

/// Document-side prefixing convention of an embedding model family.
///
/// Retrieval models trained with asymmetric prompts expect documents to be
/// tagged differently from queries; the runtime client applies the matching
/// query-side prefix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum EmbeddingProfile {
    /// `intfloat/*e5*`: `passage: ` prefix.
    E5,
    /// Qwen3-Embedding: documents are embedded as plain text.
    Qwen3Embedding,
    /// `google/embeddinggemma-*`: `title: none | text: ` prefix.
    EmbeddingGemma,
    #[default]
    Plain,
}

impl EmbeddingProfile {
    pub const ALL: [Self; 4] = [
        Self::E5,
        Self::Qwen3Embedding,
        Self::EmbeddingGemma,
        Self::Plain,
    ];

    /// Infer the profile from a model identifier; unknown families get `Plain`.
    pub fn detect(model_id: &str) -> Self {
        let id = model_id.to_ascii_lowercase();
        if id.contains("e5") {
            Self::E5
        } else if id.contains("qwen") && id.contains("embedding") {
            Self::Qwen3Embedding
        } else if id.contains("embeddinggemma") {
            Self::EmbeddingGemma
        } else {
            Self::Plain
        }
    }

    /// Explicit configuration wins; otherwise detect from the model id.
    pub fn resolve(configured: Option<&str>, model_id: &str) -> BuildResult<Self> {
        configured.map_or_else(|| Ok(Self::detect(model_id)), str::parse)
    }

    pub const fn document_prefix(self) -> &'static str {
        match self {
            Self::E5 => "passage: ",
            Self::EmbeddingGemma => "title: none | text: ",
            Self::Qwen3Embedding | Self::Plain => "",
        }
    }

    pub fn prefix(self, text: &str) -> String {
        let prefix = self.document_prefix();
        let mut out = String::with_capacity(prefix.len() + text.len());
        out.push_str(prefix);
        out.push_str(text);
        out
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::E5 => "e5",
            Self::Qwen3Embedding => "qwen3-embedding",
            Self::EmbeddingGemma => "embeddinggemma",
            Self::Plain => "plain",
        }
    }
}

impl fmt::Display for EmbeddingProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EmbeddingProfile {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "e5" => Ok(Self::E5),
            "qwen3-embedding" | "qwen3" | "qwen" => Ok(Self::Qwen3Embedding),
            "embeddinggemma" | "gemma" => Ok(Self::EmbeddingGemma),
            "plain" | "none" => Ok(Self::Plain),
            other => Err(BuildError::InvalidConfiguration(format!(
                "unknown embedding profile `{other}` (expected one of: {})",
                Self::ALL.map(Self::name).join(", ")
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_known_families() {
        assert_eq!(
            EmbeddingProfile::detect("intfloat/multilingual-e5-large"),
            EmbeddingProfile::E5
        );
        assert_eq!(
            EmbeddingProfile::detect("Qwen/Qwen3-Embedding-0.6B"),
            EmbeddingProfile::Qwen3Embedding
        );
        assert_eq!(
            EmbeddingProfile::detect("google/embeddinggemma-300m"),
            EmbeddingProfile::EmbeddingGemma
        );
        assert_eq!(
            EmbeddingProfile::detect("sentence-transformers/all-MiniLM-L6-v2"),
            EmbeddingProfile::Plain
        );
        // Qwen chat models are not embedding models.
        assert_eq!(
            EmbeddingProfile::detect("Qwen/Qwen2-7B-Instruct"),
            EmbeddingProfile::Plain
        );
    }

    #[test]
    fn prefixes_documents() {
        assert_eq!(EmbeddingProfile::E5.prefix("hello"), "passage: hello");
        assert_eq!(
            EmbeddingProfile::EmbeddingGemma.prefix("hello"),
            "title: none | text: hello"
        );
        assert_eq!(EmbeddingProfile::Qwen3Embedding.prefix("hello"), "hello");
        assert_eq!(EmbeddingProfile::Plain.prefix(""), "");
    }

    #[test]
    fn configured_profile_overrides_detection() {
        let p = EmbeddingProfile::resolve(Some("plain"), "intfloat/e5-base-v2").unwrap();
        assert_eq!(p, EmbeddingProfile::Plain);
        let p = EmbeddingProfile::resolve(None, "intfloat/e5-base-v2").unwrap();
        assert_eq!(p, EmbeddingProfile::E5);
        assert!(EmbeddingProfile::resolve(Some("bge"), "x").is_err());
    }

    #[test]
    fn names_round_trip() {
        for p in EmbeddingProfile::ALL {
            assert_eq!(p.name().parse::<EmbeddingProfile>().unwrap(), p);
        }
    }
}
