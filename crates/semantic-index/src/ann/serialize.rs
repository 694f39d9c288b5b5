//! CSR graph file: for each level, `indptr` (u32 × N+1) then `indices`
//! (u32 × edges), concatenated with no header.

use super::graph::LayeredGraph;
use crate::manifest::{ArraySpan, LevelLayout};
use core_serialization::{DigestWriter, encode_u32_le};
use std::io::{self, Write};

pub const GRAPH_FILE_NAME: &str = "hnsw.bin";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphLayout {
    pub levels: Vec<LevelLayout>,
    pub sha256: String,
    pub byte_length: u64,
}

fn span(offset: u64, elements: usize) -> ArraySpan {
    ArraySpan {
        offset,
        elements,
        byte_length: elements as u64 * 4,
    }
}

/// Write every level of `graph` and return the writer with the layout.
pub fn write_graph<W: Write>(graph: &LayeredGraph, writer: W) -> io::Result<(W, GraphLayout)> {
    let mut out = DigestWriter::new(writer);
    let mut levels = Vec::with_capacity(graph.num_levels());
    let mut buf = Vec::new();

    for level in 0..graph.num_levels() {
        let lists = graph.level(level);

        let mut indptr = Vec::with_capacity(lists.len() + 1);
        let mut total = 0u32;
        indptr.push(total);
        for list in lists {
            total += list.len() as u32;
            indptr.push(total);
        }
        let indptr_span = span(out.position(), indptr.len());
        buf.clear();
        encode_u32_le(&indptr, &mut buf);
        out.write_all(&buf)?;

        let indices_span = span(out.position(), total as usize);
        buf.clear();
        for list in lists {
            encode_u32_le(list, &mut buf);
        }
        out.write_all(&buf)?;

        levels.push(LevelLayout {
            level,
            indptr: indptr_span,
            indices: indices_span,
        });
    }

    let (writer, sha256, byte_length) = out.finish()?;
    Ok((
        writer,
        GraphLayout {
            levels,
            sha256,
            byte_length,
        },
    ))
}
