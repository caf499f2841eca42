//! High-level facade over the provider subsystems.
//!
//! [`ModelGateway`] wires the registry, stores, scanner, catalog and
//! router together behind one API surface suitable for embedding in an
//! application shell. It also owns the only piece of caching policy in
//! this crate: successful local scans are reused for a short window so a
//! UI polling for models does not hammer the runtimes. Embedders that
//! want a different policy, or none, can hold a [`LocalScanner`]
//! directly; the scanner itself never caches.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::auth::{ApiKey, CredentialStore};
use crate::cloud::{CloudCatalog, ConnectionCheck};
use crate::config::{GenerationConfig, ModelConfigStore};
use crate::discovery::LocalScanner;
use crate::router::DispatchRouter;
use crate::types::{Attachment, ModelDescriptor, ScanResult};
use crate::{Error, Result};

/// Keyring service name for stored API keys.
const SERVICE_NAME: &str = "lumen";

/// How long a successful local scan stays fresh.
const SCAN_CACHE_TTL: Duration = Duration::from_secs(30);

/// Entry point for provider connectivity.
///
/// All methods take explicit provider and model identifiers. The gateway
/// is cheap to share behind an `Arc` and all of its state is internally
/// synchronized.
pub struct ModelGateway {
    credentials: Arc<CredentialStore>,
    configs: Arc<ModelConfigStore>,
    scanner: LocalScanner,
    catalog: CloudCatalog,
    router: DispatchRouter,
    scan_cache: Mutex<HashMap<String, (Instant, ScanResult)>>,
}

impl ModelGateway {
    /// Create a gateway with production defaults: system keyring with
    /// environment fallback, config store under the lumen config dir.
    ///
    /// # Errors
    ///
    /// Fails when the persisted model configuration cannot be read or
    /// parsed.
    pub fn new() -> Result<Self> {
        let credentials = CredentialStore::new(SERVICE_NAME).with_env_fallback();
        let configs = ModelConfigStore::open()?;
        Ok(Self::with_stores(credentials, configs))
    }

    /// Create a gateway over explicit stores (tests, embedding).
    pub fn with_stores(credentials: CredentialStore, configs: ModelConfigStore) -> Self {
        let credentials = Arc::new(credentials);
        let configs = Arc::new(configs);
        Self {
            scanner: LocalScanner::new(),
            catalog: CloudCatalog::new(),
            router: DispatchRouter::new(Arc::clone(&credentials), Arc::clone(&configs)),
            credentials,
            configs,
            scan_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Override the endpoint for one provider across all subsystems.
    pub fn with_endpoint(mut self, provider_id: &str, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        self.scanner = self.scanner.with_endpoint(provider_id, endpoint.clone());
        self.catalog = self.catalog.with_endpoint(provider_id, endpoint.clone());
        self.router = self.router.with_endpoint(provider_id, endpoint);
        self
    }

    // ────────────────────────────────────────────────────────────────────
    // Discovery
    // ────────────────────────────────────────────────────────────────────

    /// Scan a local provider for installed models.
    ///
    /// Successful scans are cached for a short window; pass
    /// `force_refresh` to bypass the cache. Failed scans are never
    /// cached, so a runtime that comes online is noticed on the next
    /// call.
    pub async fn scan_local_models(
        &self,
        provider_id: &str,
        force_refresh: bool,
    ) -> Result<ScanResult> {
        if !force_refresh
            && let Ok(cache) = self.scan_cache.lock()
            && let Some((at, result)) = cache.get(provider_id)
            && at.elapsed() < SCAN_CACHE_TTL
        {
            debug!(provider = provider_id, "serving scan from cache");
            return Ok(result.clone());
        }

        let result = self.scanner.scan(provider_id).await?;
        if result.success
            && let Ok(mut cache) = self.scan_cache.lock()
        {
            cache.insert(provider_id.to_string(), (Instant::now(), result.clone()));
        }
        Ok(result)
    }

    // ────────────────────────────────────────────────────────────────────
    // Cloud catalogs
    // ────────────────────────────────────────────────────────────────────

    /// List the models a cloud provider exposes to the stored key.
    pub async fn list_cloud_models(&self, provider_id: &str) -> Result<Vec<ModelDescriptor>> {
        let api_key = self.require_key(provider_id)?;
        self.catalog
            .list_models(provider_id, api_key.expose_secret())
            .await
    }

    /// Validate the stored key for a cloud provider with one lightweight
    /// call.
    pub async fn test_cloud_connection(&self, provider_id: &str) -> Result<ConnectionCheck> {
        let api_key = self.require_key(provider_id)?;
        self.catalog
            .test_connection(provider_id, api_key.expose_secret())
            .await
    }

    fn require_key(&self, provider_id: &str) -> Result<ApiKey> {
        self.credentials
            .load(provider_id)
            .ok_or_else(|| Error::MissingCredential(provider_id.to_string()))
    }

    // ────────────────────────────────────────────────────────────────────
    // Credentials
    // ────────────────────────────────────────────────────────────────────

    /// Store an API key for a provider. An empty key clears the entry.
    pub fn save_api_key(&self, provider_id: &str, key: &str) -> Result<()> {
        self.credentials.save(provider_id, key)
    }

    /// Load the stored API key for a provider, `None` when absent.
    pub fn load_api_key(&self, provider_id: &str) -> Option<ApiKey> {
        self.credentials.load(provider_id)
    }

    /// Check whether a key is stored for a provider.
    pub fn has_api_key(&self, provider_id: &str) -> bool {
        self.credentials.has(provider_id)
    }

    /// Remove the stored API key for a provider. Absence is not an error.
    pub fn clear_api_key(&self, provider_id: &str) -> Result<()> {
        self.credentials.clear(provider_id)
    }

    // ────────────────────────────────────────────────────────────────────
    // Generation config
    // ────────────────────────────────────────────────────────────────────

    /// Get the effective generation config for a `(provider, model)` pair.
    pub fn model_config(&self, provider_id: &str, model_id: &str) -> Result<GenerationConfig> {
        self.configs.get(provider_id, model_id)
    }

    /// Save a generation config override for a `(provider, model)` pair.
    pub fn save_model_config(
        &self,
        provider_id: &str,
        model_id: &str,
        config: GenerationConfig,
    ) -> Result<()> {
        self.configs.save(provider_id, model_id, config)
    }

    /// Revert a `(provider, model)` pair to the provider defaults.
    pub fn reset_model_config(&self, provider_id: &str, model_id: &str) -> Result<()> {
        self.configs.reset(provider_id, model_id)
    }

    // ────────────────────────────────────────────────────────────────────
    // Chat
    // ────────────────────────────────────────────────────────────────────

    /// Send a chat message to a model and return the completion text.
    pub async fn chat_with_model(
        &self,
        provider_id: &str,
        model_id: &str,
        message: &str,
    ) -> Result<String> {
        self.router.chat(provider_id, model_id, message, &[]).await
    }

    /// Send a chat message with file attachments folded into the prompt.
    pub async fn chat_with_attachments(
        &self,
        provider_id: &str,
        model_id: &str,
        message: &str,
        attachments: &[Attachment],
    ) -> Result<String> {
        self.router
            .chat(provider_id, model_id, message, attachments)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryBackend;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway() -> (TempDir, ModelGateway) {
        let dir = TempDir::new().unwrap();
        let credentials = CredentialStore::with_backend(MemoryBackend::new());
        let configs =
            ModelConfigStore::with_path(dir.path().join("model-config.json")).unwrap();
        (dir, ModelGateway::with_stores(credentials, configs))
    }

    #[tokio::test]
    async fn successful_scans_are_served_from_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"models": [{"name": "llama3:latest", "size": 1000}]}"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let (_dir, gateway) = gateway();
        let gateway = gateway.with_endpoint("ollama", server.uri());

        let first = gateway.scan_local_models("ollama", false).await.unwrap();
        let second = gateway.scan_local_models("ollama", false).await.unwrap();

        assert!(first.success);
        assert_eq!(first.models, second.models);
        // expect(1) on the mock verifies the second call never hit the
        // server.
    }

    #[tokio::test]
    async fn force_refresh_bypasses_the_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"models": [{"name": "llama3:latest", "size": 1000}]}"#,
                "application/json",
            ))
            .expect(2)
            .mount(&server)
            .await;

        let (_dir, gateway) = gateway();
        let gateway = gateway.with_endpoint("ollama", server.uri());

        gateway.scan_local_models("ollama", false).await.unwrap();
        gateway.scan_local_models("ollama", true).await.unwrap();
    }

    #[tokio::test]
    async fn failed_scans_are_not_cached() {
        let (_dir, gateway) = gateway();
        let gateway = gateway.with_endpoint("ollama", "http://127.0.0.1:1");

        let first = gateway.scan_local_models("ollama", false).await.unwrap();
        assert!(!first.success);

        let cache = gateway.scan_cache.lock().unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn cloud_listing_uses_stored_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"data": [{"id": "gpt-4o"}]}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let (_dir, gateway) = gateway();
        let gateway = gateway.with_endpoint("openai", server.uri());
        gateway.save_api_key("openai", "sk-test").unwrap();

        let models = gateway.list_cloud_models("openai").await.unwrap();
        assert_eq!(models[0].id, "gpt-4o");

        let check = gateway.test_cloud_connection("openai").await.unwrap();
        assert_eq!(check.model_count, 1);
    }

    #[tokio::test]
    async fn cloud_listing_without_key_fails_before_transport() {
        let (_dir, gateway) = gateway();
        let gateway = gateway.with_endpoint("openai", "http://127.0.0.1:1");
        let err = gateway.list_cloud_models("openai").await.unwrap_err();
        assert!(matches!(err, Error::MissingCredential(id) if id == "openai"));
    }

    #[tokio::test]
    async fn key_lifecycle_round_trips() {
        let (_dir, gateway) = gateway();
        assert!(!gateway.has_api_key("anthropic"));

        gateway.save_api_key("anthropic", "sk-ant-1").unwrap();
        assert!(gateway.has_api_key("anthropic"));
        assert_eq!(
            gateway.load_api_key("anthropic").unwrap().expose_secret(),
            "sk-ant-1"
        );

        gateway.clear_api_key("anthropic").unwrap();
        assert!(!gateway.has_api_key("anthropic"));
    }

    #[tokio::test]
    async fn config_round_trips_through_the_gateway() {
        let (_dir, gateway) = gateway();
        let mut config = gateway.model_config("ollama", "llama3").unwrap();
        assert_eq!(config, GenerationConfig::default_for("ollama"));

        config.temperature = 0.1;
        gateway
            .save_model_config("ollama", "llama3", config.clone())
            .unwrap();
        assert_eq!(gateway.model_config("ollama", "llama3").unwrap(), config);

        gateway.reset_model_config("ollama", "llama3").unwrap();
        assert_eq!(
            gateway.model_config("ollama", "llama3").unwrap(),
            GenerationConfig::default_for("ollama")
        );
    }
}
