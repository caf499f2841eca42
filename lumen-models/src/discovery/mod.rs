//! Local runtime discovery.
//!
//! Probes each local provider's listing endpoint and normalizes the
//! heterogeneous response shapes into uniform [`ModelDescriptor`] lists.
//! A runtime that is not running is a normal outcome: the scan returns
//! `success: false` with a remediation message instead of an error.
//!
//! Each runtime gets one small adapter that maps its native JSON shape
//! (`{models:[{name,size,modified_at}]}` for Ollama, `{data:[{id}]}` for
//! the OpenAI-compatible LM Studio API). New local providers are added by
//! adding an adapter, never by branching in shared logic.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::registry::Provider;
use crate::types::{ModelDescriptor, ScanResult};
use crate::{registry, Error, Result};

/// Bounded per-scan timeout. Short, so an offline runtime is detected
/// quickly.
const SCAN_TIMEOUT: Duration = Duration::from_secs(3);

/// Scanner for local model runtimes.
///
/// Stateless per call: no caching happens here (the gateway layer owns
/// the don't-re-scan-too-often policy), and scans of different providers
/// never block each other.
pub struct LocalScanner {
    client: reqwest::Client,
    endpoints: HashMap<String, String>,
}

impl LocalScanner {
    /// Create a scanner using each provider's default endpoint.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoints: HashMap::new(),
        }
    }

    /// Override the endpoint for one provider (remote hosts, tests).
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

    /// Scan a local provider for installed models.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownProvider`] for ids not in the registry and
    /// [`Error::UnsupportedProviderClass`] for cloud providers; both are
    /// rejected before any network I/O. Transport and parse failures are
    /// reported inside the [`ScanResult`], not as errors.
    pub async fn scan(&self, provider_id: &str) -> Result<ScanResult> {
        let provider = registry::get(provider_id)?;
        if !provider.is_local() {
            return Err(Error::UnsupportedProviderClass(provider_id.to_string()));
        }

        let endpoint = self.endpoint_for(provider);
        // Local registry entries always carry a list path.
        let Some(list_path) = provider.list_path else {
            return Ok(ScanResult::failed(format!(
                "{} has no model listing endpoint",
                provider.display_name
            )));
        };
        let url = format!("{endpoint}{list_path}");
        debug!(provider = provider.id, %url, "scanning local runtime");

        let response = match self
            .client
            .get(&url)
            .timeout(SCAN_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => return Ok(ScanResult::failed(connect_hint(provider, endpoint, &err))),
        };

        if !response.status().is_success() {
            return Ok(ScanResult::failed(status_hint(
                provider,
                response.status(),
            )));
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(_) => {
                return Ok(ScanResult::failed(format!(
                    "Failed to read response from {}",
                    provider.display_name
                )));
            }
        };

        Ok(match provider.id {
            "ollama" => parse_ollama_tags(&body),
            "lmstudio" => parse_openai_compatible(provider, &body),
            _ => ScanResult::failed(format!(
                "No discovery adapter for provider {}",
                provider.id
            )),
        })
    }
}

impl Default for LocalScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Remediation message for a failed connection attempt.
fn connect_hint(provider: &Provider, endpoint: &str, err: &reqwest::Error) -> String {
    let mut msg = format!(
        "Cannot connect to {} at {endpoint}. ",
        provider.display_name
    );
    if err.is_timeout() {
        msg.push_str("Connection timed out - the service may be starting up or not responding.");
    } else if err.is_connect() {
        msg.push_str(&format!(
            "Connection refused - {} is not running. Please start it first.",
            provider.display_name
        ));
    } else {
        msg.push_str(&format!("Error: {err}"));
    }
    msg
}

/// Remediation message for a non-success HTTP status.
fn status_hint(provider: &Provider, status: reqwest::StatusCode) -> String {
    let mut msg = format!("HTTP {status}");
    match status.as_u16() {
        404 => msg.push_str(&format!(
            " - {} API endpoint not found. Check the installed version.",
            provider.display_name
        )),
        code if code >= 500 => msg.push_str(&format!(
            " - {} server error. Try restarting the service.",
            provider.display_name
        )),
        _ if provider.id == "lmstudio" => {
            msg.push_str(" - make sure a model is loaded in LM Studio.");
        }
        _ => {}
    }
    msg
}

// ────────────────────────────────────────────────────────────────────────────
// Per-runtime adapters
// ────────────────────────────────────────────────────────────────────────────

/// Response from Ollama's `/api/tags` endpoint.
#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    #[serde(default)]
    models: Vec<OllamaTag>,
}

/// One model entry from Ollama's API.
#[derive(Debug, Deserialize)]
struct OllamaTag {
    name: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    modified_at: String,
}

fn parse_ollama_tags(body: &str) -> ScanResult {
    let tags: OllamaTagsResponse = match serde_json::from_str(body) {
        Ok(tags) => tags,
        Err(err) => return ScanResult::failed(format!("Failed to parse Ollama response: {err}")),
    };

    if tags.models.is_empty() {
        return ScanResult::failed(
            "No models found in Ollama. Pull one with `ollama pull <model-name>`.",
        );
    }

    let models = tags
        .models
        .into_iter()
        .map(|tag| {
            let mut descriptor = ModelDescriptor::new("ollama", tag.name).size_bytes(tag.size);
            if !tag.modified_at.is_empty() {
                descriptor = descriptor.modified_at(tag.modified_at);
            }
            descriptor
        })
        .collect();
    ScanResult::ok(models)
}

/// Response from an OpenAI-compatible `/v1/models` endpoint (LM Studio).
#[derive(Debug, Deserialize)]
struct OpenAiCompatModelsResponse {
    #[serde(default)]
    data: Vec<OpenAiCompatModel>,
}

#[derive(Debug, Deserialize)]
struct OpenAiCompatModel {
    id: String,
}

fn parse_openai_compatible(provider: &Provider, body: &str) -> ScanResult {
    let listing: OpenAiCompatModelsResponse = match serde_json::from_str(body) {
        Ok(listing) => listing,
        Err(err) => {
            return ScanResult::failed(format!(
                "Failed to parse {} response: {err}",
                provider.display_name
            ));
        }
    };

    if listing.data.is_empty() {
        return ScanResult::failed(format!(
            "No models loaded in {}. Please load a model first.",
            provider.display_name
        ));
    }

    let models = listing
        .data
        .into_iter()
        .map(|m| ModelDescriptor::new(provider.id, m.id))
        .collect();
    ScanResult::ok(models)
}
