//! Core identifiers and shared lightweight types for the semantic index builder.
//!
//! These types intentionally avoid heavy dependencies; every pipeline crate
//! (chunker, embedder, semantic-index, cli) agrees on them. Row order is the
//! identity key: chunk `i`, vector row `i` and graph node `i` are the same
//! logical entry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod config;
pub mod error;

pub use error::{BuildError, BuildResult};

/// Row index shared by chunks, vector rows and graph nodes.
pub type RowId = u32;

/// Input document as emitted by the site build (one JSONL record).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub slug: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: String,
}

impl Document {
    pub fn new(slug: impl Into<String>, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            title: Some(title.into()),
            text: text.into(),
        }
    }

    /// Display title, falling back to the slug when the record has none.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.slug)
    }
}

/// A token-bounded slice of a document; one row of every downstream array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub id: String,
    pub title: String,
    pub text: String,
    pub chunk_index: u32,
    pub parent_slug: String,
    pub is_chunked: bool,
}

impl Chunk {
    /// The whole document as a single unchunked row.
    pub fn whole(doc: &Document) -> Self {
        Self {
            id: doc.slug.clone(),
            title: doc.display_title().to_string(),
            text: doc.text.clone(),
            chunk_index: 0,
            parent_slug: doc.slug.clone(),
            is_chunked: false,
        }
    }

    /// Piece `index` of a split document.
    pub fn piece(doc: &Document, index: u32, text: String) -> Self {
        Self {
            id: chunk_id(&doc.slug, index),
            title: doc.display_title().to_string(),
            text,
            chunk_index: index,
            parent_slug: doc.slug.clone(),
            is_chunked: true,
        }
    }
}

/// `parent#chunkN`, the row id of a split document piece.
pub fn chunk_id(parent_slug: &str, index: u32) -> String {
    format!("{parent_slug}#chunk{index}")
}

/// On-disk element width of vector shards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Fp16,
    #[default]
    Fp32,
}

impl ElementType {
    /// Bytes per stored element.
    pub const fn size(self) -> usize {
        match self {
            Self::Fp16 => 2,
            Self::Fp32 => 4,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fp16 => "fp16",
            Self::Fp32 => "fp32",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementType {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fp16" | "f16" | "float16" => Ok(Self::Fp16),
            "fp32" | "f32" | "float32" => Ok(Self::Fp32),
            other => Err(BuildError::InvalidConfiguration(format!(
                "unsupported dtype `{other}` (expected fp16 or fp32)"
            ))),
        }
    }
}
