use thiserror::Error;

pub type BuildResult<T> = Result<T, BuildError>;

/// Errors that can surface while building an index.
///
/// `ModelNotFound` and `DimensionMismatch` are recoverable: callers construct
/// them, log them at `warn` and continue with the fallback.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("no input documents found")]
    NoInputData,
    #[error("embedding provider unavailable at {endpoint}: {reason}")]
    ProviderUnavailable { endpoint: String, reason: String },
    #[error("model `{requested}` is not served; available: {available}")]
    ModelNotFound { requested: String, available: String },
    #[error("embedding batch starting at row {start} failed: {reason}")]
    EmbeddingBatchFailed { start: usize, reason: String },
    #[error("provider returned {actual}-dim vectors, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("invalid input at line {line}: {reason}")]
    InvalidInput { line: usize, reason: String },
    #[error("integrity check failed: {0}")]
    Integrity(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BuildError {
    /// Whether the pipeline can continue after logging this error.
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ModelNotFound { .. } | Self::DimensionMismatch { .. }
        )
    }
}
