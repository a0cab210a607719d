//! Error types for the apisign core.

/// Core error type for apisign infrastructure.
#[derive(Debug, thiserror::Error)]
pub enum ApiSignError {
    /// An environment variable held a value that could not be parsed.
    #[error("invalid value for {name}: {value}")]
    InvalidEnv {
        /// Variable name.
        name: String,
        /// Offending value.
        value: String,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Convenience result type for apisign operations.
pub type ApiSignResult<T> = Result<T, ApiSignError>;
