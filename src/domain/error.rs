use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("signature: {0}")]
    Signature(String),

    #[error("version conflict on {id}: expected {expected}, found {actual}")]
    Conflict {
        id: String,
        expected: u64,
        actual: u64,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("gateway: {0}")]
    Gateway(String),

    #[error("store: {0}")]
    Store(String),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    /// Whether a retry can plausibly succeed. Infrastructure failures are
    /// transient; domain invariant violations never are.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Gateway(_) | Self::Store(_))
    }
}
