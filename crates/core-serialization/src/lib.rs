//! Serialization helpers shared across the workspace: little-endian element
//! encoders, a SHA-256 digesting writer, and staged (commit-or-discard)
//! output directories.
//!
//! Every index file is headerless raw little-endian data; layouts are fully
//! described by the manifest, so these helpers never emit framing.

pub mod staged;

pub use staged::{StagedDir, StagedFile};

use core_types::ElementType;
use half::f16;
use sha2::{Digest, Sha256};
use std::io::{self, Write};

/// Append `values` to `out` in the requested element width, little-endian.
pub fn encode_f32_le(values: &[f32], dtype: ElementType, out: &mut Vec<u8>) {
    out.reserve(values.len() * dtype.size());
    match dtype {
        ElementType::Fp32 => {
            for v in values {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        ElementType::Fp16 => {
            for v in values {
                out.extend_from_slice(&f16::from_f32(*v).to_le_bytes());
            }
        }
    }
}

/// Decode a little-endian buffer written by [`encode_f32_le`].
pub fn decode_f32_le(bytes: &[u8], dtype: ElementType) -> Vec<f32> {
    match dtype {
        ElementType::Fp32 => bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
        ElementType::Fp16 => bytes
            .chunks_exact(2)
            .map(|b| f16::from_le_bytes([b[0], b[1]]).to_f32())
            .collect(),
    }
}

pub fn encode_u32_le(values: &[u32], out: &mut Vec<u8>) {
    out.reserve(values.len() * 4);
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

pub fn decode_u32_le(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Writer that hashes and counts every byte it forwards, in write order.
pub struct DigestWriter<W> {
    inner: W,
    hasher: Sha256,
    written: u64,
}

impl<W: Write> DigestWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            written: 0,
        }
    }

    /// Byte offset of the next write, i.e. total bytes written so far.
    pub const fn position(&self) -> u64 {
        self.written
    }

    /// Flush and return the inner writer with the hex digest and byte count.
    pub fn finish(mut self) -> io::Result<(W, String, u64)> {
        self.inner.flush()?;
        let digest = hex::encode(self.hasher.finalize());
        Ok((self.inner, digest, self.written))
    }
}

impl<W: Write> Write for DigestWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn digest_writer_matches_one_shot_hash() {
        let mut w = DigestWriter::new(Vec::new());
        w.write_all(b"indptr").unwrap();
        assert_eq!(w.position(), 6);
        w.write_all(b"indices").unwrap();
        let (bytes, digest, len) = w.finish().unwrap();
        assert_eq!(bytes, b"indptrindices");
        assert_eq!(len, 13);
        assert_eq!(digest, sha256_hex(b"indptrindices"));
    }

    #[test]
    fn sha256_of_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn fp16_halves_the_byte_count() {
        let values = [1.0f32, -0.5, 0.25, 0.0];
        let mut wide = Vec::new();
        let mut narrow = Vec::new();
        encode_f32_le(&values, ElementType::Fp32, &mut wide);
        encode_f32_le(&values, ElementType::Fp16, &mut narrow);
        assert_eq!(wide.len(), 16);
        assert_eq!(narrow.len(), 8);
        // Exactly representable in fp16.
        assert_eq!(decode_f32_le(&narrow, ElementType::Fp16), values);
        assert_eq!(&wide[..4], &1.0f32.to_le_bytes());
    }

    proptest! {
        #[test]
        fn fp16_encoding_stays_close(values in prop::collection::vec(-1.0f32..1.0, 0..64)) {
            let mut buf = Vec::new();
            encode_f32_le(&values, ElementType::Fp16, &mut buf);
            prop_assert_eq!(buf.len(), values.len() * 2);
            let back = decode_f32_le(&buf, ElementType::Fp16);
            for (a, b) in values.iter().zip(back.iter()) {
                prop_assert!((a - b).abs() < 1e-3);
            }
        }

        #[test]
        fn u32_codec_preserves_values(values in prop::collection::vec(any::<u32>(), 0..64)) {
            let mut buf = Vec::new();
            encode_u32_le(&values, &mut buf);
            prop_assert_eq!(decode_u32_le(&buf), values);
        }
    }
}
