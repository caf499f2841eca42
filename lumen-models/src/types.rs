//! Core types shared across the connectivity layer.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for a model in format `provider:model_name`.
///
/// Used as the storage key for per-model configuration. The model portion
/// may itself contain colons (Ollama tags like `llama3:latest`), so only
/// the first separator is significant.
///
/// # Examples
///
/// ```
/// use lumen_models::ModelId;
///
/// let id = ModelId::new("ollama", "llama3:latest");
/// assert_eq!(id.provider(), "ollama");
/// assert_eq!(id.model(), "llama3:latest");
/// assert_eq!(id.to_string(), "ollama:llama3:latest");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(String);

impl ModelId {
    /// Create a new model ID from provider and model name.
    pub fn new(provider: &str, model: &str) -> Self {
        Self(format!("{provider}:{model}"))
    }

    /// Parse a model ID from a string in `provider:model` format.
    pub fn parse(s: &str) -> Option<Self> {
        if s.contains(':') {
            Some(Self(s.to_string()))
        } else {
            None
        }
    }

    /// Get the provider portion of the ID.
    pub fn provider(&self) -> &str {
        self.0.split_once(':').map(|(p, _)| p).unwrap_or("")
    }

    /// Get the model name portion of the ID.
    pub fn model(&self) -> &str {
        self.0.split_once(':').map(|(_, m)| m).unwrap_or("")
    }

    /// Get the full ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Normalized metadata for one model exposed by a provider.
///
/// Ephemeral: recomputed on each discovery or listing call, never
/// persisted. Uniquely identified by `(provider_id, id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Model identifier as reported by the provider (e.g. `llama3:latest`).
    pub id: String,
    /// Registry id of the provider exposing this model.
    pub provider_id: String,
    /// Human-readable model name.
    pub display_name: String,
    /// On-disk size in bytes, when the runtime reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    /// Last-modified timestamp (RFC 3339), when the runtime reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
}

impl ModelDescriptor {
    /// Create a descriptor carrying only an id.
    pub fn new(provider_id: &str, id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            provider_id: provider_id.to_string(),
            size_bytes: None,
            modified_at: None,
        }
    }

    /// Set the reported size in bytes.
    pub fn size_bytes(mut self, bytes: u64) -> Self {
        self.size_bytes = Some(bytes);
        self
    }

    /// Set the reported last-modified timestamp.
    pub fn modified_at(mut self, ts: impl Into<String>) -> Self {
        self.modified_at = Some(ts.into());
        self
    }

    /// Human-readable size, e.g. `"4.34 GB"`.
    pub fn display_size(&self) -> Option<String> {
        self.size_bytes.map(format_bytes)
    }

    /// Last-modified date as `YYYY-MM-DD`, falling back to the raw string
    /// when it is not valid RFC 3339.
    pub fn display_modified(&self) -> Option<String> {
        let raw = self.modified_at.as_deref()?;
        match chrono::DateTime::parse_from_rfc3339(raw) {
            Ok(ts) => Some(ts.format("%Y-%m-%d").to_string()),
            Err(_) => Some(raw.to_string()),
        }
    }
}

/// Convert bytes to a human readable size.
fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    const SIZES: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

    if bytes < UNIT {
        return format!("{bytes} Bytes");
    }

    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    // Sizes past the largest unit stay expressed in that unit.
    while n >= UNIT && exp < SIZES.len() - 2 {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    format!("{:.2} {}", bytes as f64 / div as f64, SIZES[exp + 1])
}

/// Result of scanning a local runtime for installed models.
///
/// An unreachable runtime is a normal outcome, not an error: the caller
/// gets `success: false` and a human-readable remediation message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Discovered models, empty on failure.
    pub models: Vec<ModelDescriptor>,
    /// Whether the scan reached the runtime and parsed its response.
    pub success: bool,
    /// Remediation message when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScanResult {
    /// A successful scan.
    pub fn ok(models: Vec<ModelDescriptor>) -> Self {
        Self {
            models,
            success: true,
            error: None,
        }
    }

    /// A failed scan with a remediation message.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            models: Vec::new(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// A file attached to a chat message.
///
/// Attachments with extractable text are inlined into the prompt; others
/// are referenced by name and MIME type only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// File name as presented to the user.
    pub name: String,
    /// MIME type, e.g. `text/plain` or `image/png`.
    pub mime_type: String,
    /// Extracted text content, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
}

impl Attachment {
    /// Create a text attachment.
    pub fn text(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mime_type: "text/plain".to_string(),
            text_content: Some(content.into()),
        }
    }

    /// Create an attachment without extractable text.
    pub fn binary(name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            text_content: None,
        }
    }
}
