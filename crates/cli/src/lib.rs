//! Library half of the `embed-build` binary, exposed so integration tests can
//! drive the pipeline with an in-process provider.

pub mod args;
pub mod input;
pub mod logging;
pub mod pipeline;

pub use pipeline::{BuildSummary, run_build};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
