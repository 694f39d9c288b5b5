//! `manifest.json`: the descriptor a search client loads to locate and
//! validate every index file. Field names are part of the on-disk format.

use crate::ann::{GraphLayout, HnswIndex};
use core_types::{Chunk, ElementType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const MANIFEST_FILE_NAME: &str = "manifest.json";
pub const MANIFEST_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardMeta {
    pub path: String,
    pub rows: usize,
    pub row_offset: usize,
    pub byte_length: u64,
    pub sha256: String,
    pub byte_stride: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArraySpan {
    pub offset: u64,
    pub elements: usize,
    pub byte_length: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelLayout {
    pub level: usize,
    pub indptr: ArraySpan,
    pub indices: ArraySpan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorsSection {
    pub dtype: ElementType,
    pub rows: usize,
    pub dims: usize,
    pub shards: Vec<ShardMeta>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMeta {
    pub parent_slug: String,
    pub chunk_index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSection {
    pub path: String,
    pub sha256: String,
    pub levels: Vec<LevelLayout>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HnswSection {
    #[serde(rename = "M")]
    pub m: usize,
    pub ef_construction: usize,
    pub entry_point: u32,
    pub max_level: usize,
    pub graph: GraphSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub version: u32,
    pub dims: usize,
    pub dtype: ElementType,
    pub normalized: bool,
    pub rows: usize,
    pub shard_size_rows: usize,
    pub vectors: VectorsSection,
    pub ids: Vec<String>,
    pub titles: Vec<String>,
    pub chunk_metadata: IndexMap<String, ChunkMeta>,
    pub hnsw: HnswSection,
}

impl Manifest {
    /// Assemble the descriptor. `chunks` fixes row order for `ids`, `titles`
    /// and the chunk metadata, which lists split pieces only.
    pub fn assemble(
        chunks: &[Chunk],
        dims: usize,
        dtype: ElementType,
        shard_size_rows: usize,
        shards: Vec<ShardMeta>,
        index: &HnswIndex,
        graph_path: String,
        graph: GraphLayout,
    ) -> Self {
        let chunk_metadata = chunks
            .iter()
            .filter(|c| c.is_chunked)
            .map(|c| {
                (
                    c.id.clone(),
                    ChunkMeta {
                        parent_slug: c.parent_slug.clone(),
                        chunk_index: c.chunk_index,
                    },
                )
            })
            .collect();

        Self {
            version: MANIFEST_VERSION,
            dims,
            dtype,
            normalized: true,
            rows: chunks.len(),
            shard_size_rows,
            vectors: VectorsSection {
                dtype,
                rows: chunks.len(),
                dims,
                shards,
            },
            ids: chunks.iter().map(|c| c.id.clone()).collect(),
            titles: chunks.iter().map(|c| c.title.clone()).collect(),
            chunk_metadata,
            hnsw: HnswSection {
                m: index.params.m,
                ef_construction: index.params.ef_construction,
                entry_point: index.entry_point,
                max_level: index.max_level,
                graph: GraphSection {
                    path: graph_path,
                    sha256: graph.sha256,
                    levels: graph.levels,
                },
            },
        }
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
