//! Error types for the triage pipeline.
//!
//! The LLM error taxonomy carries the retry/circuit-breaker semantics:
//! transient errors are retried, permanent and configuration errors are not,
//! and everything except an already-open circuit counts as one breaker
//! failure per wrapped call.

use thiserror::Error;

/// Top-level error type for triage operations.
#[derive(Error, Debug)]
pub enum TriageError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// LLM backend invocation errors
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Epic store errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Mail ingestion / acknowledgment errors
    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Errors raised by LLM backends and the layers wrapped around them.
///
/// The variants map one-to-one onto the failure classes the retry policy and
/// circuit breaker distinguish between.
#[derive(Error, Debug)]
pub enum LlmError {
    /// Required credentials or endpoint are absent. Never retried.
    #[error("{backend} backend is not configured: {message}")]
    Configuration { backend: String, message: String },

    /// Expected to self-resolve: 5xx responses, timeouts, connectivity
    /// failures, empty session responses. Retried with backoff.
    #[error("transient backend failure: {message}")]
    Transient {
        message: String,
        status_code: Option<u16>,
    },

    /// Retrying cannot fix this: 4xx responses such as bad auth or a
    /// malformed request.
    #[error("permanent backend failure: {message}")]
    Permanent {
        message: String,
        status_code: Option<u16>,
    },

    /// The backend's circuit is open; the call was rejected before any
    /// network or process activity.
    #[error("circuit breaker for '{backend}' is open")]
    CircuitOpen { backend: String },

    /// Primary failed or was unconfigured and the fallback also failed or
    /// was unconfigured.
    #[error("all LLM backends are unavailable: {message}")]
    AllBackendsUnavailable { message: String },

    /// Neither backend has credentials configured.
    #[error("no LLM backend is configured")]
    NotConfigured,
}

/// Epic store errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Underlying filesystem/object I/O failed
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Stored object exists but is not valid UTF-8 text
    #[error("stored object {key} is not valid UTF-8")]
    InvalidObject { key: String },
}

/// Mail source / acknowledgment errors.
#[derive(Error, Debug)]
pub enum MailError {
    /// Underlying I/O failed
    #[error("mail I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// An inbound message could not be decoded
    #[error("failed to decode message {uid}: {message}")]
    Decode { uid: String, message: String },
}

/// Convenience type alias for triage results.
pub type Result<T> = std::result::Result<T, TriageError>;
