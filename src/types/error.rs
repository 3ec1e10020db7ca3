//! Error types for Hatchway
//!
//! One closed error enum for the whole crate. Callers match on variants;
//! transport failures keep their original cause attached as a source.

use std::sync::Arc;

use cid::Cid;

/// Main error type for Hatchway operations
#[derive(Debug, thiserror::Error)]
pub enum HatchwayError {
    // Validation
    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid encoding: {0}")]
    InvalidEncoding(#[source] base64::DecodeError),

    #[error("configuration error: {0}")]
    Config(String),

    // Ingestion policy
    #[error("scheme not allowed: {0}")]
    SchemeNotAllowed(String),

    #[error("domain not allowed: {0}")]
    DomainNotAllowed(String),

    #[error("declared content length {declared} exceeds the {limit} byte limit")]
    SizeExceededPredeclared { declared: u64, limit: u64 },

    #[error("download exceeded the {limit} byte limit")]
    SizeExceededStreaming { limit: u64 },

    // Ingestion transport
    #[error("metadata request failed: {message}")]
    MetadataRequest {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("body request failed: {message}")]
    BodyRequest {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("response body was empty")]
    EmptyBody,

    #[error("operation timed out or was cancelled")]
    TimedOut,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    // Retrieval
    #[error("gateway returned status {0}")]
    Gateway(reqwest::StatusCode),

    #[error("malformed archive: {0}")]
    MalformedArchive(String),

    #[error("block {0} not found in archive")]
    BlockNotFound(Cid),

    #[error("path segment not found: {0}")]
    PathNotFound(String),

    #[error("cannot export content: {0}")]
    NotExportable(String),

    // Storage facade
    #[error("storage client not initialized")]
    NotInitialized,

    #[error("missing signing key or delegation")]
    MissingCredential,

    /// Shared outcome of a failed initialization. Every caller of a failed
    /// facade observes the same underlying error.
    #[error("initialization failed: {0}")]
    Initialization(Arc<HatchwayError>),

    #[error("storage backend failure: {message}")]
    Backend {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl HatchwayError {
    /// Whether this error is a policy rejection (as opposed to a transport
    /// or validation failure).
    pub fn is_policy_rejection(&self) -> bool {
        matches!(
            self,
            Self::SchemeNotAllowed(_)
                | Self::DomainNotAllowed(_)
                | Self::SizeExceededPredeclared { .. }
                | Self::SizeExceededStreaming { .. }
        )
    }
}

/// Result type alias for Hatchway operations
pub type Result<T> = std::result::Result<T, HatchwayError>;
