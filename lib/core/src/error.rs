use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by every layer of the engine.
///
/// Variants are `Clone` so that a single fetch outcome can be fanned out to
/// every waiter of a collapsed in-flight request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Incomplete input: missing required attribute '{field}'")]
    IncompleteInput { field: &'static str },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Similarity index not built or loaded")]
    IndexUnavailable,

    #[error("Normalization scheme mismatch: index built under v{expected}, vector is v{actual}")]
    SchemeMismatch { expected: u32, actual: u32 },

    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Insufficient comparables: found {found}, need at least {required}")]
    Insufficient { found: usize, required: usize },

    #[error("Provider '{provider}' timed out")]
    ProviderTimeout { provider: String },

    #[error("Provider '{provider}' failed: {message}")]
    ProviderError { provider: String, message: String },

    #[error("All providers exhausted for capability '{capability}'")]
    AllProvidersExhausted { capability: String },
}
