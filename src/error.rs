//! Error types.
//!
//! None of these reach a page render or request handler: the resolver turns
//! [`ProfileError`] into the default profile and the collector hands
//! [`StorageError`] to its observer.

use thiserror::Error;

/// Errors raised while extracting or classifying profile signals.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// A request header was not valid UTF-8.
    #[error("Header {name} is not valid UTF-8")]
    InvalidHeader {
        /// Header name.
        name: &'static str,
    },

    /// A classifier rule failed to compile.
    #[error("Invalid classifier pattern: {0}")]
    InvalidPattern(#[from] regex_lite::Error),

    /// Resolution panicked.
    #[error("Resolution panicked: {0}")]
    Panicked(String),

    /// Configuration value could not be used.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors raised by a [`SessionStorage`](crate::storage::SessionStorage) backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Storage is disabled (privacy mode, blocked by the browser).
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// The write exceeded the storage quota.
    #[error("Storage quota exceeded ({attempted} bytes, {limit} allowed)")]
    QuotaExceeded {
        /// Size of the rejected write.
        attempted: usize,
        /// Configured quota.
        limit: usize,
    },

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The session record could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised when describing a page to the collector.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The page URL could not be parsed.
    #[error("Invalid page URL {url}: {source}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
        /// Parse failure.
        #[source]
        source: url::ParseError,
    },
}
