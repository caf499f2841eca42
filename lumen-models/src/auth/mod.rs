//! Credential management for cloud provider API keys.
//!
//! Keys are stored in the system keyring with environment variable
//! fallback for CI/deployment scenarios. A missing key and an empty key
//! are the same thing ("no key"): reads never fail for absence, callers
//! poll for presence via emptiness. Writes are last-write-wins and safe
//! to call at arbitrarily high frequency, so UI-side debouncing needs no
//! support here.
//!
//! # Example
//!
//! ```ignore
//! use lumen_models::auth::CredentialStore;
//!
//! let store = CredentialStore::new("lumen").with_env_fallback();
//!
//! store.save("anthropic", "sk-ant-...")?;
//! let key = store.load("anthropic");
//! ```

use std::collections::HashMap;
use std::env;
use std::sync::RwLock;

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::{Error, Result};

/// A secure API key that prevents accidental logging.
///
/// The key is wrapped in `SecretString` which:
/// - Implements `Debug` as `"[REDACTED]"`
/// - Zeroizes memory on drop
/// - Requires explicit `.expose_secret()` to access the value
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// Create a new API key from a string.
    pub fn new(key: impl Into<String>) -> Self {
        Self(SecretString::from(key.into()))
    }

    /// Expose the secret key value.
    ///
    /// Use sparingly - only when actually sending to an API.
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKey([REDACTED])")
    }
}

impl From<String> for ApiKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for ApiKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Environment variable names for each cloud provider.
const ENV_VARS: &[(&str, &str)] = &[
    ("openai", "OPENAI_API_KEY"),
    ("anthropic", "ANTHROPIC_API_KEY"),
    ("google", "GOOGLE_API_KEY"),
];

/// Get the environment variable name for a provider.
fn env_var_for_provider(provider: &str) -> Option<&'static str> {
    ENV_VARS
        .iter()
        .find(|(p, _)| *p == provider)
        .map(|(_, v)| *v)
}

/// Storage backend for credentials.
///
/// At most one value per provider id, last write wins. Implementations
/// must treat deleting an absent entry as a no-op.
pub trait CredentialBackend: Send + Sync {
    /// Read the stored secret, `None` when absent.
    fn get(&self, provider: &str) -> Option<String>;

    /// Store a secret, replacing any previous value.
    fn set(&self, provider: &str, secret: &str) -> Result<()>;

    /// Remove a stored secret. Absence is not an error.
    fn delete(&self, provider: &str) -> Result<()>;
}

/// System keyring backend, the default.
pub struct KeyringBackend {
    service_name: String,
}

impl KeyringBackend {
    /// Create a keyring backend under the given service name.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    fn entry(&self, provider: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service_name, provider).map_err(|e| Error::Keyring(e.to_string()))
    }
}

impl CredentialBackend for KeyringBackend {
    fn get(&self, provider: &str) -> Option<String> {
        let entry = self.entry(provider).ok()?;
        entry.get_password().ok()
    }

    fn set(&self, provider: &str, secret: &str) -> Result<()> {
        let entry = self.entry(provider)?;
        entry
            .set_password(secret)
            .map_err(|e| Error::Keyring(e.to_string()))
    }

    fn delete(&self, provider: &str) -> Result<()> {
        let entry = self.entry(provider)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(Error::Keyring(e.to_string())),
        }
    }
}

/// In-memory backend for tests and embedding scenarios without a keyring.
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryBackend {
    /// Create an empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialBackend for MemoryBackend {
    fn get(&self, provider: &str) -> Option<String> {
        self.entries
            .read()
            .ok()
            .and_then(|map| map.get(provider).cloned())
    }

    fn set(&self, provider: &str, secret: &str) -> Result<()> {
        if let Ok(mut map) = self.entries.write() {
            map.insert(provider.to_string(), secret.to_string());
        }
        Ok(())
    }

    fn delete(&self, provider: &str) -> Result<()> {
        if let Ok(mut map) = self.entries.write() {
            map.remove(provider);
        }
        Ok(())
    }
}

/// Secure credential storage with environment fallback.
///
/// # Storage Priority
///
/// When retrieving credentials:
/// 1. Configured backend (system keyring by default)
/// 2. Environment variables (if `env_fallback` is enabled)
///
/// When storing credentials, always uses the backend; environment
/// variables are read-only.
pub struct CredentialStore {
    backend: Box<dyn CredentialBackend>,
    env_fallback: bool,
}

impl CredentialStore {
    /// Create a credential store backed by the system keyring.
    ///
    /// # Arguments
    ///
    /// * `service_name` - Service identifier for keyring (e.g., "lumen")
    pub fn new(service_name: impl Into<String>) -> Self {
        Self::with_backend(KeyringBackend::new(service_name))
    }

    /// Create a credential store over a custom backend.
    pub fn with_backend(backend: impl CredentialBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            env_fallback: false,
        }
    }

    /// Enable environment variable fallback for reads.
    pub fn with_env_fallback(mut self) -> Self {
        self.env_fallback = true;
        self
    }

    /// Store an API key for a provider.
    ///
    /// Saving an empty string is equivalent to [`clear`](Self::clear):
    /// empty and missing are the same state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Keyring`] if the backend operation fails.
    pub fn save(&self, provider: &str, secret: &str) -> Result<()> {
        if secret.is_empty() {
            return self.clear(provider);
        }
        self.backend.set(provider, secret)?;
        debug!(provider, "stored API key");
        Ok(())
    }

    /// Load the API key for a provider.
    ///
    /// Checks the backend first, then environment variables if fallback
    /// is enabled. A missing or empty key yields `None`; this never
    /// fails and never mutates stored state.
    pub fn load(&self, provider: &str) -> Option<ApiKey> {
        if let Some(secret) = self.backend.get(provider)
            && !secret.is_empty()
        {
            debug!(provider, "retrieved API key from backend");
            return Some(ApiKey::new(secret));
        }

        if self.env_fallback
            && let Some(env_var) = env_var_for_provider(provider)
            && let Ok(secret) = env::var(env_var)
            && !secret.is_empty()
        {
            debug!(provider, "retrieved API key from environment");
            return Some(ApiKey::new(secret));
        }

        None
    }

    /// Delete the stored API key for a provider. Absence is not an error.
    pub fn clear(&self, provider: &str) -> Result<()> {
        self.backend.delete(provider)?;
        debug!(provider, "cleared API key");
        Ok(())
    }

    /// Check if a key is present for a provider.
    pub fn has(&self, provider: &str) -> bool {
        self.load(provider).is_some()
    }
}
