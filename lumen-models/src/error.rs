//! Error types for the connectivity core.
//!
//! The variants below form the error taxonomy consumed by the UI layer:
//! each kind maps to a distinct remediation hint (start the runtime,
//! re-enter the key, pull the model, and so on), so classification must
//! stay stable.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during provider operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Provider id is not in the registry. Rejected before any I/O.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// Operation invoked against the wrong provider class, e.g. a local
    /// scan of a cloud provider. Rejected before any I/O.
    #[error("operation not supported for provider class: {0}")]
    UnsupportedProviderClass(String),

    /// Chat invoked without a model id. Never silently picks a default.
    #[error("no model selected")]
    NoModelSelected,

    /// Cloud operation attempted with no stored API key.
    #[error("no API key stored for provider: {0}")]
    MissingCredential(String),

    /// The provider rejected the API key (HTTP 401/403).
    #[error("provider rejected the API key: {0}")]
    InvalidCredential(String),

    /// Transport-level timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Transport-level connection failure.
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    /// The provider reports the model is not installed or available.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// A generation parameter is outside its documented range.
    #[error("invalid value for parameter `{field}`: {reason}")]
    InvalidParameter {
        field: &'static str,
        reason: String,
    },

    /// Failed to access the system keyring.
    #[error("keyring error: {0}")]
    Keyring(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all for unclassified transport errors. Always carries the
    /// raw underlying message for diagnostics.
    #[error("provider error: {0}")]
    Unknown(String),
}

/// Classify a transport error from `reqwest` into the stable taxonomy.
pub(crate) fn classify_request_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout(err.to_string())
    } else if err.is_connect() {
        Error::ConnectionRefused(err.to_string())
    } else {
        Error::Unknown(err.to_string())
    }
}

/// Classify a non-success HTTP status into the stable taxonomy.
///
/// 401/403 surface as [`Error::InvalidCredential`] so the UI can prompt
/// for key re-entry; everything else is [`Error::Unknown`] carrying the
/// status and raw body. Transports that know which model they asked for
/// handle 404 themselves before calling this.
pub(crate) fn classify_status(provider: &str, status: reqwest::StatusCode, body: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::InvalidCredential(provider.to_string()),
        _ => Error::Unknown(format!("HTTP {status}: {body}")),
    }
}
