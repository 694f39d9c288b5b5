//! Fixed-row-count vector shards (`vectors-NNN.bin`).

use crate::matrix::VectorMatrix;
use crate::manifest::ShardMeta;
use core_serialization::{DigestWriter, StagedDir, encode_f32_le};
use core_types::ElementType;
use std::io::{self, Write};
use tracing::{debug, info};

pub fn shard_file_name(index: usize) -> String {
    format!("vectors-{index:03}.bin")
}

/// Join the public URL prefix and a file name (`/embeddings` + `x.bin`).
pub fn public_path(prefix: &str, file_name: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    format!("{prefix}/{file_name}")
}

/// Row ranges `[start, end)` covering `0..rows` in steps of `shard_rows`.
pub fn shard_ranges(rows: usize, shard_rows: usize) -> Vec<(usize, usize)> {
    let step = shard_rows.max(1);
    (0..rows)
        .step_by(step)
        .map(|start| (start, (start + step).min(rows)))
        .collect()
}

/// Write rows `start..end` to `writer`; returns the writer, digest and length.
pub fn write_shard<W: Write>(
    matrix: &VectorMatrix,
    start: usize,
    end: usize,
    dtype: ElementType,
    writer: W,
) -> io::Result<(W, String, u64)> {
    let mut out = DigestWriter::new(writer);
    let mut buf = Vec::with_capacity(matrix.dims() * dtype.size());
    for row in start..end {
        buf.clear();
        encode_f32_le(matrix.row(row), dtype, &mut buf);
        out.write_all(&buf)?;
    }
    out.finish()
}

/// Stage every shard of `matrix` under `stage` and describe them.
pub fn write_shards(
    stage: &mut StagedDir,
    matrix: &VectorMatrix,
    dtype: ElementType,
    shard_rows: usize,
    public_prefix: &str,
) -> io::Result<Vec<ShardMeta>> {
    let byte_stride = matrix.dims() * dtype.size();
    let mut shards = Vec::new();
    for (index, (start, end)) in shard_ranges(matrix.rows(), shard_rows).into_iter().enumerate() {
        let name = shard_file_name(index);
        let file = stage.begin(&name)?;
        let (file, sha256, byte_length) = write_shard(matrix, start, end, dtype, file)?;
        stage.add(file)?;
        debug!(shard = %name, rows = end - start, byte_length, "staged vector shard");
        shards.push(ShardMeta {
            path: public_path(public_prefix, &name),
            rows: end - start,
            row_offset: start,
            byte_length,
            sha256,
            byte_stride,
        });
    }
    info!(
        shards = shards.len(),
        rows = matrix.rows(),
        dims = matrix.dims(),
        dtype = %dtype,
        "wrote vector shards"
    );
    Ok(shards)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_serialization::{decode_f32_le, sha256_hex};
    use proptest::prelude::*;
    use std::fs;

    fn matrix(rows: usize, dims: usize) -> VectorMatrix {
        let data: Vec<Vec<f32>> = (0..rows)
            .map(|r| (0..dims).map(|d| (r * dims + d) as f32).collect())
            .collect();
        VectorMatrix::from_rows(&data, dims)
    }

    #[test]
    fn ten_rows_in_shards_of_four() {
        let dir = tempfile::tempdir().unwrap();
        let m = matrix(10, 8);
        let mut stage = StagedDir::create(dir.path()).unwrap();
        let shards = write_shards(&mut stage, &m, ElementType::Fp32, 4, "/embeddings").unwrap();
        stage.commit().unwrap();

        assert_eq!(shards.len(), 3);
        assert_eq!(shards.iter().map(|s| s.rows).collect::<Vec<_>>(), vec![4, 4, 2]);
        assert_eq!(
            shards.iter().map(|s| s.row_offset).collect::<Vec<_>>(),
            vec![0, 4, 8]
        );
        assert_eq!(shards[2].path, "/embeddings/vectors-002.bin");
        assert!(shards.iter().all(|s| s.byte_stride == 32));

        for (i, shard) in shards.iter().enumerate() {
            let bytes = fs::read(dir.path().join(shard_file_name(i))).unwrap();
            assert_eq!(bytes.len() as u64, shard.byte_length);
            assert_eq!(sha256_hex(&bytes), shard.sha256);
        }

        let last = fs::read(dir.path().join("vectors-002.bin")).unwrap();
        assert_eq!(
            decode_f32_le(&last, ElementType::Fp32),
            m.row_range(8, 10).to_vec()
        );
    }

    #[test]
    fn fp16_stride_is_two_bytes_per_dim() {
        let dir = tempfile::tempdir().unwrap();
        let m = matrix(3, 5);
        let mut stage = StagedDir::create(dir.path()).unwrap();
        let shards = write_shards(&mut stage, &m, ElementType::Fp16, 1024, "/x/").unwrap();
        assert_eq!(shards.len(), 1);
        assert_eq!(shards[0].byte_stride, 10);
        assert_eq!(shards[0].byte_length, 30);
        assert_eq!(shards[0].path, "/x/vectors-000.bin");
    }

    #[test]
    fn no_rows_means_no_shards() {
        assert!(shard_ranges(0, 4).is_empty());
    }

    proptest! {
        #[test]
        fn ranges_partition_rows(rows in 0usize..5000, shard_rows in 1usize..700) {
            let ranges = shard_ranges(rows, shard_rows);
            prop_assert_eq!(ranges.len(), rows.div_ceil(shard_rows));
            let mut expected_start = 0;
            for (start, end) in &ranges {
                prop_assert_eq!(*start, expected_start);
                prop_assert!(end > start);
                prop_assert!(end - start <= shard_rows);
                expected_start = *end;
            }
            prop_assert_eq!(expected_start, rows);
        }
    }
}
