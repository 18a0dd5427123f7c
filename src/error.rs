//! Error types for the client transport.

use thiserror::Error;

/// Result alias for codec and connection operations.
pub type Result<T> = std::result::Result<T, ThorwireError>;

/// Errors that can occur while encoding, decoding or exchanging requests.
///
/// Variants carrying a `String` reason are the ones a failed connection hands
/// to every waiting caller, so they stay cheap to clone.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ThorwireError {
    #[error("Decoding error: {0}")]
    Decoding(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Correlation id mismatch: expected {expected}, received {actual}")]
    CorrelationIdMismatch { expected: i32, actual: i32 },

    #[error("Received response without a matching request")]
    ProtocolDesync,

    #[error("API not supported by broker: {api_key}")]
    UnsupportedApi { api_key: i16 },

    #[error("No common version for API {api_key} in {min}..={max}")]
    UnsupportedVersion { api_key: i16, min: i16, max: i16 },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Broker returned error code {error_code} for API {api_key}")]
    Api { api_key: i16, error_code: i16 },
}

impl ThorwireError {
    pub(crate) fn truncated(what: &str, needed: usize, remaining: usize) -> Self {
        Self::Decoding(format!("{} needs {} bytes, {} remaining", what, needed, remaining))
    }
}
