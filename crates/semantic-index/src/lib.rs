//! Index assembly: normalized vector matrix → shards, HNSW graph, manifest.
//!
//! [`write_index`] stages every file in the output directory and renames
//! them into place only after all of them were written, manifest last. A
//! failure at any point leaves the directory's previous index untouched.

pub mod ann;
pub mod manifest;
pub mod matrix;
pub mod shards;
pub mod verify;

pub use ann::{HnswIndex, HnswParams};
pub use manifest::{MANIFEST_FILE_NAME, Manifest, ShardMeta};
pub use matrix::VectorMatrix;
pub use verify::{VerifyReport, verify_index};

use core_serialization::StagedDir;
use core_types::{BuildError, BuildResult, Chunk, ElementType};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub dtype: ElementType,
    pub shard_size_rows: usize,
    /// URL prefix recorded in manifest paths.
    pub public_path: String,
    pub hnsw: HnswParams,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            dtype: ElementType::Fp32,
            shard_size_rows: 1024,
            public_path: "/embeddings".to_string(),
            hnsw: HnswParams::default(),
        }
    }
}

#[derive(Debug)]
pub struct WrittenIndex {
    pub manifest: Manifest,
    pub files: Vec<PathBuf>,
}

/// Write shards, graph and manifest for `chunks` (row-aligned with
/// `vectors`, already normalized) into `dir`.
pub fn write_index(
    dir: &Path,
    chunks: &[Chunk],
    vectors: &VectorMatrix,
    options: &IndexOptions,
) -> BuildResult<WrittenIndex> {
    if chunks.len() != vectors.rows() {
        return Err(BuildError::Integrity(format!(
            "{} chunks but {} vector rows",
            chunks.len(),
            vectors.rows()
        )));
    }

    let mut stage = StagedDir::create(dir)?;
    let shards = shards::write_shards(
        &mut stage,
        vectors,
        options.dtype,
        options.shard_size_rows,
        &options.public_path,
    )?;

    let index = ann::build(vectors, options.hnsw);
    let file = stage.begin(ann::GRAPH_FILE_NAME)?;
    let (file, layout) = ann::write_graph(&index.graph, file)?;
    stage.add(file)?;
    info!(
        bytes = layout.byte_length,
        levels = layout.levels.len(),
        "wrote hnsw graph"
    );

    let manifest = Manifest::assemble(
        chunks,
        vectors.dims(),
        options.dtype,
        options.shard_size_rows,
        shards,
        &index,
        shards::public_path(&options.public_path, ann::GRAPH_FILE_NAME),
        layout,
    );
    stage.write(MANIFEST_FILE_NAME, &manifest.to_json()?)?;

    let files = stage.commit()?;
    info!(dir = %dir.display(), files = files.len(), rows = manifest.rows, "index committed");
    Ok(WrittenIndex { manifest, files })
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::Document;
    use std::fs;

    fn fixture(n: usize, dims: usize) -> (Vec<Chunk>, VectorMatrix) {
        let chunks: Vec<Chunk> = (0..n)
            .map(|i| Chunk::whole(&Document::new(format!("doc-{i}"), format!("Doc {i}"), "t")))
            .collect();
        let rows: Vec<Vec<f32>> = (0..n)
            .map(|i| (0..dims).map(|d| ((i * 7 + d * 3) % 11) as f32 - 5.0).collect())
            .collect();
        let mut m = VectorMatrix::from_rows(&rows, dims);
        m.normalize_rows();
        (chunks, m)
    }

    #[test]
    fn writes_verifiable_index() {
        let dir = tempfile::tempdir().unwrap();
        let (chunks, vectors) = fixture(10, 8);
        let options = IndexOptions {
            shard_size_rows: 4,
            ..IndexOptions::default()
        };
        let written = write_index(dir.path(), &chunks, &vectors, &options).unwrap();
        assert_eq!(written.files.len(), 5);
        assert!(written.files.last().unwrap().ends_with(MANIFEST_FILE_NAME));

        let report = verify_index(dir.path()).unwrap();
        assert_eq!(report.rows, 10);
        assert_eq!(report.shards, 3);
        assert!(report.max_degree <= 16);

        let manifest: Manifest =
            serde_json::from_slice(&fs::read(dir.path().join(MANIFEST_FILE_NAME)).unwrap()).unwrap();
        assert_eq!(manifest, written.manifest);
        assert_eq!(manifest.ids[3], "doc-3");
        assert!(manifest.chunk_metadata.is_empty());
    }

    #[test]
    fn verify_detects_corrupted_shard() {
        let dir = tempfile::tempdir().unwrap();
        let (chunks, vectors) = fixture(6, 4);
        write_index(dir.path(), &chunks, &vectors, &IndexOptions::default()).unwrap();

        let shard = dir.path().join("vectors-000.bin");
        let mut bytes = fs::read(&shard).unwrap();
        bytes[0] ^= 0xff;
        fs::write(&shard, bytes).unwrap();

        assert!(matches!(
            verify_index(dir.path()),
            Err(BuildError::Integrity(_))
        ));
    }

    #[test]
    fn verify_detects_truncated_graph() {
        let dir = tempfile::tempdir().unwrap();
        let (chunks, vectors) = fixture(6, 4);
        write_index(dir.path(), &chunks, &vectors, &IndexOptions::default()).unwrap();

        let graph = dir.path().join(ann::GRAPH_FILE_NAME);
        let bytes = fs::read(&graph).unwrap();
        fs::write(&graph, &bytes[..bytes.len() - 4]).unwrap();

        assert!(matches!(
            verify_index(dir.path()),
            Err(BuildError::Integrity(_))
        ));
    }

    #[test]
    fn row_count_mismatch_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (chunks, _) = fixture(3, 4);
        let (_, vectors) = fixture(2, 4);
        let err = write_index(dir.path(), &chunks, &vectors, &IndexOptions::default()).unwrap_err();
        assert!(matches!(err, BuildError::Integrity(_)));
        assert!(!dir.path().join(MANIFEST_FILE_NAME).exists());
    }
}
