//! Re-read a written index directory and check it against its manifest.

use crate::manifest::{ArraySpan, MANIFEST_FILE_NAME, Manifest};
use core_serialization::{decode_u32_le, sha256_hex};
use core_types::{BuildError, BuildResult};
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    pub rows: usize,
    pub dims: usize,
    pub shards: usize,
    pub levels: usize,
    pub edges: usize,
    pub max_degree: usize,
}

fn fail(msg: impl Into<String>) -> BuildError {
    BuildError::Integrity(msg.into())
}

/// Files are stored flat; manifest paths carry a public URL prefix.
fn file_name(public_path: &str) -> &str {
    public_path.rsplit('/').next().unwrap_or(public_path)
}

fn slice<'a>(bytes: &'a [u8], span: &ArraySpan, what: &str) -> BuildResult<&'a [u8]> {
    let start = usize::try_from(span.offset).map_err(|_| fail(format!("{what} offset overflows")))?;
    let len = usize::try_from(span.byte_length).map_err(|_| fail(format!("{what} length overflows")))?;
    if (span.elements as u64).checked_mul(4) != Some(span.byte_length) {
        return Err(fail(format!("{what} byteLength disagrees with element count")));
    }
    let end = start
        .checked_add(len)
        .ok_or_else(|| fail(format!("{what} span overflows")))?;
    bytes
        .get(start..end)
        .ok_or_else(|| fail(format!("{what} lies outside the graph file")))
}

pub fn verify_index(dir: &Path) -> BuildResult<VerifyReport> {
    let raw = fs::read(dir.join(MANIFEST_FILE_NAME))?;
    let manifest: Manifest = serde_json::from_slice(&raw)?;
    let rows = manifest.rows;
    let dims = manifest.dims;

    if manifest.vectors.rows != rows || manifest.vectors.dims != dims {
        return Err(fail("vectors section disagrees with top-level rows/dims"));
    }
    if manifest.ids.len() != rows || manifest.titles.len() != rows {
        return Err(fail(format!(
            "{} ids and {} titles for {rows} rows",
            manifest.ids.len(),
            manifest.titles.len()
        )));
    }

    let stride = dims * manifest.dtype.size();
    let mut next_row = 0usize;
    for shard in &manifest.vectors.shards {
        let name = file_name(&shard.path);
        if shard.row_offset != next_row {
            return Err(fail(format!(
                "{name} starts at row {} but row {next_row} was expected",
                shard.row_offset
            )));
        }
        if shard.byte_stride != stride {
            return Err(fail(format!("{name} has stride {}, expected {stride}", shard.byte_stride)));
        }
        let bytes = fs::read(dir.join(name))?;
        if bytes.len() as u64 != shard.byte_length || bytes.len() != shard.rows * stride {
            return Err(fail(format!(
                "{name} is {} bytes; manifest records {} for {} rows",
                bytes.len(),
                shard.byte_length,
                shard.rows
            )));
        }
        if sha256_hex(&bytes) != shard.sha256 {
            return Err(fail(format!("{name} digest mismatch")));
        }
        next_row += shard.rows;
    }
    if next_row != rows {
        return Err(fail(format!("shards cover {next_row} of {rows} rows")));
    }

    let hnsw = &manifest.hnsw;
    let graph_name = file_name(&hnsw.graph.path);
    let graph = fs::read(dir.join(graph_name))?;
    if sha256_hex(&graph) != hnsw.graph.sha256 {
        return Err(fail(format!("{graph_name} digest mismatch")));
    }
    if rows > 0 {
        if hnsw.entry_point as usize >= rows {
            return Err(fail(format!("entry point {} out of range", hnsw.entry_point)));
        }
        if hnsw.graph.levels.len() != hnsw.max_level + 1 {
            return Err(fail(format!(
                "{} graph levels for maxLevel {}",
                hnsw.graph.levels.len(),
                hnsw.max_level
            )));
        }
    }

    let mut edges = 0usize;
    let mut max_degree = 0usize;
    for layout in &hnsw.graph.levels {
        let what = format!("level {} indptr", layout.level);
        if layout.indptr.elements != rows + 1 {
            return Err(fail(format!("{what} has {} entries", layout.indptr.elements)));
        }
        let indptr = decode_u32_le(slice(&graph, &layout.indptr, &what)?);
        let what = format!("level {} indices", layout.level);
        let indices = decode_u32_le(slice(&graph, &layout.indices, &what)?);

        if indptr.first() != Some(&0) || indptr.last().map(|&v| v as usize) != Some(indices.len()) {
            return Err(fail(format!("level {} indptr does not span its indices", layout.level)));
        }
        for pair in indptr.windows(2) {
            if pair[1] < pair[0] {
                return Err(fail(format!("level {} indptr decreases", layout.level)));
            }
            let degree = (pair[1] - pair[0]) as usize;
            if degree > hnsw.m {
                return Err(fail(format!(
                    "level {} has a node with {degree} neighbors (M = {})",
                    layout.level, hnsw.m
                )));
            }
            max_degree = max_degree.max(degree);
        }
        if let Some(bad) = indices.iter().find(|&&n| n as usize >= rows) {
            return Err(fail(format!("level {} references node {bad}", layout.level)));
        }
        edges += indices.len();
    }

    let report = VerifyReport {
        rows,
        dims,
        shards: manifest.vectors.shards.len(),
        levels: hnsw.graph.levels.len(),
        edges,
        max_degree,
    };
    info!(
        dir = %dir.display(),
        rows,
        shards = report.shards,
        levels = report.levels,
        edges,
        "index verified"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_within_file_is_sliced() {
        let bytes = [0u8; 16];
        let span = ArraySpan {
            offset: 4,
            elements: 2,
            byte_length: 8,
        };
        assert_eq!(slice(&bytes, &span, "indices").unwrap().len(), 8);
    }

    #[test]
    fn span_end_past_address_space_is_integrity_error() {
        let span = ArraySpan {
            offset: usize::MAX as u64 - 3,
            elements: 2,
            byte_length: 8,
        };
        assert!(matches!(
            slice(&[0u8; 16], &span, "indptr"),
            Err(BuildError::Integrity(_))
        ));
    }

    #[test]
    fn element_count_overflow_is_integrity_error() {
        let span = ArraySpan {
            offset: 0,
            elements: usize::MAX,
            byte_length: 8,
        };
        assert!(matches!(
            slice(&[0u8; 16], &span, "indices"),
            Err(BuildError::Integrity(_))
        ));
    }
}
