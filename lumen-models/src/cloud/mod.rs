//! Cloud catalog resolution and API key validation.
//!
//! For each cloud provider, resolves the available model identifiers with
//! one lightweight authenticated call, keeping three outcome classes
//! distinguishable for the caller: success, rejected key
//! ([`Error::InvalidCredential`]) and transport failure
//! ([`Error::Timeout`] / [`Error::ConnectionRefused`]).
//!
//! Providers without a listing API get a compiled-in catalog instead:
//! Anthropic's model list is static here by policy (no public listing
//! endpoint existed when this was written), not as an error fallback.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{classify_request_error, classify_status};
use crate::registry::Provider;
use crate::types::ModelDescriptor;
use crate::{registry, Error, Result};

/// Bounded timeout for catalog and key-validation calls.
const LIST_TIMEOUT: Duration = Duration::from_secs(10);

/// Compiled-in Anthropic catalog. Updated by hand when new generations
/// ship.
const ANTHROPIC_MODELS: &[&str] = &[
    "claude-3-opus-20240229",
    "claude-3-sonnet-20240229",
    "claude-3-haiku-20240307",
];

/// Result of validating a cloud API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionCheck {
    /// Number of models visible to the validated key.
    pub model_count: usize,
}

/// Resolver for cloud provider model catalogs.
pub struct CloudCatalog {
    client: reqwest::Client,
    endpoints: HashMap<String, String>,
}

impl CloudCatalog {
    /// Create a catalog resolver using each provider's default endpoint.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoints: HashMap::new(),
        }
    }

    /// Override the endpoint for one provider (tests, proxies).
    pub fn with_endpoint(mut self, provider_id: &str, endpoint: impl Into<String>) -> Self {
        self.endpoints.insert(provider_id.to_string(), endpoint.into());
        self
    }

    fn endpoint_for(&self, provider: &Provider) -> &str {
        self.endpoints
            .get(provider.id)
            .map(String::as_str)
            .unwrap_or(provider.default_endpoint)
    }

    /// List the models a cloud provider exposes to the given key.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownProvider`] / [`Error::UnsupportedProviderClass`]
    /// before any I/O; [`Error::MissingCredential`] for an empty key;
    /// [`Error::InvalidCredential`] when the provider rejects the key;
    /// transport failures as [`Error::Timeout`],
    /// [`Error::ConnectionRefused`] or [`Error::Unknown`].
    pub async fn list_models(
        &self,
        provider_id: &str,
        api_key: &str,
    ) -> Result<Vec<ModelDescriptor>> {
        let provider = registry::get(provider_id)?;
        if !provider.is_cloud() {
            return Err(Error::UnsupportedProviderClass(provider_id.to_string()));
        }
        if api_key.is_empty() {
            return Err(Error::MissingCredential(provider_id.to_string()));
        }

        debug!(provider = provider.id, "listing cloud models");
        match provider.id {
            "openai" => self.list_openai(provider, api_key).await,
            "anthropic" => Ok(ANTHROPIC_MODELS
                .iter()
                .map(|name| ModelDescriptor::new("anthropic", *name))
                .collect()),
            "google" => self.list_google(provider, api_key).await,
            other => Err(Error::Unknown(format!(
                "no catalog adapter for provider {other}"
            ))),
        }
    }

    /// Validate an API key with one lightweight call.
    ///
    /// For providers with a static catalog the key cannot be checked
    /// without a generation call; validation happens at first chat
    /// instead and this reports the catalog size.
    pub async fn test_connection(
        &self,
        provider_id: &str,
        api_key: &str,
    ) -> Result<ConnectionCheck> {
        let models = self.list_models(provider_id, api_key).await?;
        Ok(ConnectionCheck {
            model_count: models.len(),
        })
    }

    async fn list_openai(
        &self,
        provider: &Provider,
        api_key: &str,
    ) -> Result<Vec<ModelDescriptor>> {
        let url = format!("{}/v1/models", self.endpoint_for(provider));
        let response = self
            .client
            .get(&url)
            .bearer_auth(api_key)
            .timeout(LIST_TIMEOUT)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(provider.id, status, &body));
        }

        #[derive(Deserialize)]
        struct Listing {
            #[serde(default)]
            data: Vec<Entry>,
        }
        #[derive(Deserialize)]
        struct Entry {
            id: String,
        }

        let listing: Listing = response.json().await.map_err(classify_request_error)?;
        Ok(listing
            .data
            .into_iter()
            .map(|entry| ModelDescriptor::new(provider.id, entry.id))
            .collect())
    }

    async fn list_google(
        &self,
        provider: &Provider,
        api_key: &str,
    ) -> Result<Vec<ModelDescriptor>> {
        let url = format!("{}/v1beta/models", self.endpoint_for(provider));
        let response = self
            .client
            .get(&url)
            .query(&[("key", api_key)])
            .timeout(LIST_TIMEOUT)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(provider.id, status, &body));
        }

        #[derive(Deserialize)]
        struct Listing {
            #[serde(default)]
            models: Vec<Entry>,
        }
        #[derive(Deserialize)]
        struct Entry {
            name: String,
        }

        let listing: Listing = response.json().await.map_err(classify_request_error)?;
        Ok(listing
            .models
            .into_iter()
            .map(|entry| {
                // The API reports names as "models/gemini-pro".
                let id = entry
                    .name
                    .strip_prefix("models/")
                    .unwrap_or(&entry.name)
                    .to_string();
                ModelDescriptor::new(provider.id, id)
            })
            .collect())
    }
}

impl Default for CloudCatalog {
    fn default() -> Self {
        Self::new()
    }
}
