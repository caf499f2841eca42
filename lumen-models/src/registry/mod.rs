//! Static catalog of known model providers.
//!
//! The registry is compiled in and has no side effects. Every other
//! component validates provider ids through it before doing any I/O, so
//! an unknown id is always rejected at the boundary.

use serde::Serialize;

use crate::{Error, Result};

/// Whether a provider is a local runtime or a hosted API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderClass {
    /// Model runtime reachable over a local network endpoint.
    Local,
    /// Hosted API service requiring an API key.
    Cloud,
}

/// A known model provider.
///
/// Immutable, defined at startup; never persisted per-user.
#[derive(Debug, Clone, Serialize)]
pub struct Provider {
    /// Unique registry id, e.g. `ollama`.
    pub id: &'static str,
    /// Human-readable name.
    pub display_name: &'static str,
    /// Local runtime or cloud API.
    pub class: ProviderClass,
    /// Base endpoint URL.
    pub default_endpoint: &'static str,
    /// Path of the model-listing endpoint, when the provider has one.
    ///
    /// `None` means the catalog is compiled in (Anthropic had no public
    /// listing API when this table was written).
    pub list_path: Option<&'static str>,
}

impl Provider {
    /// Whether this provider is a local runtime.
    pub fn is_local(&self) -> bool {
        self.class == ProviderClass::Local
    }

    /// Whether this provider is a hosted API.
    pub fn is_cloud(&self) -> bool {
        self.class == ProviderClass::Cloud
    }
}

static PROVIDERS: &[Provider] = &[
    Provider {
        id: "ollama",
        display_name: "Ollama",
        class: ProviderClass::Local,
        default_endpoint: "http://localhost:11434",
        list_path: Some("/api/tags"),
    },
    Provider {
        id: "lmstudio",
        display_name: "LM Studio",
        class: ProviderClass::Local,
        default_endpoint: "http://localhost:1234",
        list_path: Some("/v1/models"),
    },
    Provider {
        id: "openai",
        display_name: "OpenAI",
        class: ProviderClass::Cloud,
        default_endpoint: "https://api.openai.com",
        list_path: Some("/v1/models"),
    },
    Provider {
        id: "anthropic",
        display_name: "Anthropic",
        class: ProviderClass::Cloud,
        default_endpoint: "https://api.anthropic.com",
        list_path: None,
    },
    Provider {
        id: "google",
        display_name: "Google",
        class: ProviderClass::Cloud,
        default_endpoint: "https://generativelanguage.googleapis.com",
        list_path: Some("/v1beta/models"),
    },
];

/// All known providers.
pub fn providers() -> &'static [Provider] {
    PROVIDERS
}

/// Look up a provider by id.
///
/// # Errors
///
/// Returns [`Error::UnknownProvider`] when the id is not in the catalog.
pub fn get(id: &str) -> Result<&'static Provider> {
    PROVIDERS
        .iter()
        .find(|p| p.id == id)
        .ok_or_else(|| Error::UnknownProvider(id.to_string()))
}
