pub mod graph;
pub mod hnsw;
pub mod serialize;
mod visited;

pub use graph::LayeredGraph;
pub use hnsw::{HnswIndex, HnswParams, assign_levels, build};
pub use serialize::{GRAPH_FILE_NAME, GraphLayout, write_graph};
