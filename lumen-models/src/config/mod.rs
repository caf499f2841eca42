//! Per-model generation parameter storage.
//!
//! Each `(provider, model)` pair can carry an override of the provider's
//! default [`GenerationConfig`]. Overrides are validated on save (rejected,
//! never clamped), persisted to one JSON file under the lumen config
//! directory, and deleted on reset, reverting the pair to its defaults.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::ModelId;
use crate::{registry, Error, Result};

/// Generation parameters for one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Sampling temperature, `0.0..=2.0`.
    pub temperature: f64,
    /// Nucleus sampling cutoff, `0.0..=1.0`.
    pub top_p: f64,
    /// Top-k sampling limit, at least 1.
    pub top_k: u32,
    /// Repetition penalty, strictly positive.
    pub repeat_penalty: f64,
    /// Context window size in tokens, strictly positive.
    pub num_ctx: u32,
    /// Stop sequences, in order. May be empty.
    #[serde(default)]
    pub stop: Vec<String>,
}

impl GenerationConfig {
    /// The default configuration for a provider.
    ///
    /// Sampling defaults are shared; the context window follows the
    /// provider's typical size (cloud providers get larger windows).
    pub fn default_for(provider_id: &str) -> Self {
        let num_ctx = match provider_id {
            "openai" => 4096,
            "anthropic" => 8192,
            _ => 2048,
        };
        Self {
            temperature: 0.7,
            top_p: 0.9,
            top_k: 40,
            repeat_penalty: 1.1,
            num_ctx,
            stop: Vec::new(),
        }
    }

    /// Validate every field against its documented range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] naming the first offending
    /// field. Out-of-range values are never clamped.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::InvalidParameter {
                field: "temperature",
                reason: format!("must be between 0 and 2, got {}", self.temperature),
            });
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(Error::InvalidParameter {
                field: "top_p",
                reason: format!("must be between 0 and 1, got {}", self.top_p),
            });
        }
        if self.top_k < 1 {
            return Err(Error::InvalidParameter {
                field: "top_k",
                reason: format!("must be at least 1, got {}", self.top_k),
            });
        }
        if self.repeat_penalty <= 0.0 {
            return Err(Error::InvalidParameter {
                field: "repeat_penalty",
                reason: format!("must be positive, got {}", self.repeat_penalty),
            });
        }
        if self.num_ctx < 1 {
            return Err(Error::InvalidParameter {
                field: "num_ctx",
                reason: format!("must be positive, got {}", self.num_ctx),
            });
        }
        Ok(())
    }
}

/// File-backed store of per-model configuration overrides.
///
/// Keys are `provider:model` strings. Reads of pairs with no override
/// return the provider default; writes are last-write-wins and atomic at
/// the file level (validation failures leave the file untouched).
pub struct ModelConfigStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, GenerationConfig>>,
}

impl ModelConfigStore {
    /// Open the store at its default location under the lumen config dir.
    pub fn open() -> Result<Self> {
        Self::with_path(lumen_paths::config_dir().join("model-config.json"))
    }

    /// Open a store at an explicit path, loading existing overrides.
    pub fn with_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Get the configuration for a `(provider, model)` pair.
    ///
    /// Returns the stored override when present, otherwise the provider's
    /// default. Repeated reads without intervening writes return equal
    /// values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownProvider`] for ids not in the registry.
    pub fn get(&self, provider_id: &str, model_id: &str) -> Result<GenerationConfig> {
        registry::get(provider_id)?;
        let key = ModelId::new(provider_id, model_id);
        let stored = self
            .entries
            .read()
            .ok()
            .and_then(|map| map.get(key.as_str()).cloned());
        Ok(stored.unwrap_or_else(|| GenerationConfig::default_for(provider_id)))
    }

    /// Save an override for a `(provider, model)` pair.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] when any field is out of
    /// range; the previously stored value is unchanged in that case.
    pub fn save(
        &self,
        provider_id: &str,
        model_id: &str,
        config: GenerationConfig,
    ) -> Result<()> {
        registry::get(provider_id)?;
        config.validate()?;

        let key = ModelId::new(provider_id, model_id);
        if let Ok(mut map) = self.entries.write() {
            map.insert(key.to_string(), config);
        }
        self.persist()?;
        debug!(provider = provider_id, model = model_id, "saved model config");
        Ok(())
    }

    /// Delete the override for a `(provider, model)` pair, reverting it
    /// to the provider default. Absence is not an error.
    pub fn reset(&self, provider_id: &str, model_id: &str) -> Result<()> {
        registry::get(provider_id)?;
        let key = ModelId::new(provider_id, model_id);
        if let Ok(mut map) = self.entries.write() {
            map.remove(key.as_str());
        }
        self.persist()?;
        debug!(provider = provider_id, model = model_id, "reset model config");
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let snapshot = self
            .entries
            .read()
            .map(|map| map.clone())
            .unwrap_or_default();
        let raw = serde_json::to_vec_pretty(&snapshot)?;
        fs::write(&self.path, raw)?;
        Ok(())
    }
}
