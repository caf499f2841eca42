//! Chat dispatch.
//!
//! The router is the single entry point for generation requests: it
//! validates the target, consults the stores (config always, credentials
//! for cloud providers), selects the transport for the provider and
//! returns the completion text or a classified error.
//!
//! The router never retries: each call maps to exactly one transport
//! call, and retry/backoff policy belongs to the caller. Dropping the
//! returned future cancels the underlying request; the stores are only
//! read before the request goes out, so cancellation cannot leave them
//! inconsistent.

mod clean;
mod cloud;
mod local;

pub use clean::clean_model_response;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::CredentialStore;
use crate::config::ModelConfigStore;
use crate::error::classify_status;
use crate::registry::{Provider, ProviderClass};
use crate::types::Attachment;
use crate::{registry, Error, Result};

/// Generation is slow; the per-call bound is generous but finite.
pub(crate) const CHAT_TIMEOUT: Duration = Duration::from_secs(120);

/// Routes chat requests to the correct provider transport.
pub struct DispatchRouter {
    client: reqwest::Client,
    credentials: Arc<CredentialStore>,
    configs: Arc<ModelConfigStore>,
    endpoints: HashMap<String, String>,
}

impl DispatchRouter {
    /// Create a router over the given stores.
    pub fn new(credentials: Arc<CredentialStore>, configs: Arc<ModelConfigStore>) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials,
            configs,
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

    /// Send a chat request and return the completion text verbatim.
    ///
    /// Attachments are folded into the prompt in order with the
    /// deterministic format described on [`compose_prompt`].
    ///
    /// # Errors
    ///
    /// [`Error::NoModelSelected`] for an empty model id and
    /// [`Error::UnknownProvider`] for unregistered providers, both before
    /// any I/O. [`Error::MissingCredential`] when a cloud provider has no
    /// stored key. Transport failures are classified into
    /// [`Error::Timeout`], [`Error::ConnectionRefused`],
    /// [`Error::ModelNotFound`], [`Error::InvalidCredential`] or
    /// [`Error::Unknown`] carrying the raw message.
    pub async fn chat(
        &self,
        provider_id: &str,
        model_id: &str,
        prompt: &str,
        attachments: &[Attachment],
    ) -> Result<String> {
        if model_id.trim().is_empty() {
            return Err(Error::NoModelSelected);
        }
        let provider = registry::get(provider_id)?;
        let config = self.configs.get(provider_id, model_id)?;
        let prompt = compose_prompt(prompt, attachments);
        let endpoint = self.endpoint_for(provider);

        match provider.class {
            ProviderClass::Local => match provider.id {
                "ollama" => {
                    local::ollama_chat(&self.client, endpoint, model_id, &prompt, &config).await
                }
                "lmstudio" => {
                    local::lmstudio_chat(&self.client, endpoint, model_id, &prompt, &config).await
                }
                other => Err(Error::Unknown(format!(
                    "no chat transport for provider {other}"
                ))),
            },
            ProviderClass::Cloud => {
                let Some(api_key) = self.credentials.load(provider.id) else {
                    return Err(Error::MissingCredential(provider.id.to_string()));
                };
                match provider.id {
                    "openai" => {
                        cloud::openai_chat(&self.client, endpoint, &api_key, model_id, &prompt, &config)
                            .await
                    }
                    "anthropic" => {
                        cloud::anthropic_chat(
                            &self.client,
                            endpoint,
                            &api_key,
                            model_id,
                            &prompt,
                            &config,
                        )
                        .await
                    }
                    "google" => {
                        cloud::google_chat(&self.client, endpoint, &api_key, model_id, &prompt, &config)
                            .await
                    }
                    other => Err(Error::Unknown(format!(
                        "no chat transport for provider {other}"
                    ))),
                }
            }
        }
    }
}

/// Fold attachments into the prompt.
///
/// For each attachment with extractable text, appends
/// `"\n\nFile: {name}\nContent:\n{content}"`; for attachments without
/// text, appends `"\n\nFile: {name} ({mime_type})"`. Order is preserved.
/// This format is part of the contract and must not drift.
pub fn compose_prompt(prompt: &str, attachments: &[Attachment]) -> String {
    let mut out = prompt.to_string();
    for attachment in attachments {
        match attachment.text_content.as_deref() {
            Some(content) if !content.is_empty() => {
                out.push_str(&format!(
                    "\n\nFile: {}\nContent:\n{content}",
                    attachment.name
                ));
            }
            _ => {
                out.push_str(&format!(
                    "\n\nFile: {} ({})",
                    attachment.name, attachment.mime_type
                ));
            }
        }
    }
    out
}

/// Check a transport response status before parsing the body.
///
/// 404 means the model is not installed/available on that provider.
pub(crate) async fn ensure_success(
    provider: &str,
    model: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status.as_u16() == 404 {
        return Err(Error::ModelNotFound(model.to_string()));
    }
    let body = response.text().await.unwrap_or_default();
    let lowered = body.to_lowercase();
    if lowered.contains("model") && lowered.contains("not found") {
        return Err(Error::ModelNotFound(model.to_string()));
    }
    Err(classify_status(provider, status, &body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryBackend;
    use tempfile::TempDir;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn router_with_key(provider: &str, key: &str) -> (TempDir, DispatchRouter) {
        let dir = TempDir::new().unwrap();
        let credentials = CredentialStore::with_backend(MemoryBackend::new());
        if !key.is_empty() {
            credentials.save(provider, key).unwrap();
        }
        let configs =
            ModelConfigStore::with_path(dir.path().join("model-config.json")).unwrap();
        let router = DispatchRouter::new(Arc::new(credentials), Arc::new(configs));
        (dir, router)
    }

    fn router() -> (TempDir, DispatchRouter) {
        router_with_key("openai", "")
    }

    // ────────────────────────────────────────────────────────────────────
    // Prompt composition
    // ────────────────────────────────────────────────────────────────────

    #[test]
    fn text_attachment_is_inlined_exactly() {
        let attachments = vec![Attachment::text("a.txt", "hello")];
        assert_eq!(
            compose_prompt("Summarize", &attachments),
            "Summarize\n\nFile: a.txt\nContent:\nhello"
        );
    }

    #[test]
    fn binary_attachment_is_referenced_by_name_and_type() {
        let attachments = vec![Attachment::binary("pic.png", "image/png")];
        assert_eq!(
            compose_prompt("Describe", &attachments),
            "Describe\n\nFile: pic.png (image/png)"
        );
    }

    #[test]
    fn attachments_keep_their_order() {
        let attachments = vec![
            Attachment::text("one.txt", "1"),
            Attachment::binary("two.bin", "application/octet-stream"),
            Attachment::text("three.txt", "3"),
        ];
        assert_eq!(
            compose_prompt("p", &attachments),
            "p\n\nFile: one.txt\nContent:\n1\
             \n\nFile: two.bin (application/octet-stream)\
             \n\nFile: three.txt\nContent:\n3"
        );
    }

    #[test]
    fn attachment_with_empty_text_is_treated_as_binary() {
        let attachments = vec![Attachment::text("empty.txt", "")];
        assert_eq!(
            compose_prompt("p", &attachments),
            "p\n\nFile: empty.txt (text/plain)"
        );
    }

    #[test]
    fn no_attachments_leaves_prompt_untouched() {
        assert_eq!(compose_prompt("Just a prompt", &[]), "Just a prompt");
    }

    // ────────────────────────────────────────────────────────────────────
    // Fail-fast validation
    // ────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn empty_model_fails_before_any_transport_for_local() {
        let (_dir, router) = router();
        let err = router.chat("ollama", "", "hi", &[]).await.unwrap_err();
        assert!(matches!(err, Error::NoModelSelected));
    }

    #[tokio::test]
    async fn empty_model_fails_before_any_transport_for_cloud() {
        let (_dir, router) = router_with_key("openai", "sk-test");
        let err = router.chat("openai", "  ", "hi", &[]).await.unwrap_err();
        assert!(matches!(err, Error::NoModelSelected));
    }

    #[tokio::test]
    async fn unknown_provider_is_rejected() {
        let (_dir, router) = router();
        let err = router.chat("replicate", "m", "hi", &[]).await.unwrap_err();
        assert!(matches!(err, Error::UnknownProvider(_)));
    }

    #[tokio::test]
    async fn cloud_chat_without_key_fails_with_missing_credential() {
        let (_dir, router) = router();
        let err = router
            .chat("openai", "gpt-4o", "hi", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingCredential(id) if id == "openai"));
    }

    // ────────────────────────────────────────────────────────────────────
    // Transport behavior (mocked)
    // ────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn ollama_chat_applies_stored_config_and_returns_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama3:latest",
                "stream": false,
                "options": {"temperature": 0.2, "num_ctx": 4096, "stop": ["###"]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"response": "Hello from llama", "done": true}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let (_dir, router) = router();
        let router = router.with_endpoint("ollama", server.uri());

        let mut config = crate::config::GenerationConfig::default_for("ollama");
        config.temperature = 0.2;
        config.num_ctx = 4096;
        config.stop = vec!["###".to_string()];
        router
            .configs
            .save("ollama", "llama3:latest", config)
            .unwrap();

        let text = router
            .chat("ollama", "llama3:latest", "hi", &[])
            .await
            .unwrap();
        assert_eq!(text, "Hello from llama");
    }

    #[tokio::test]
    async fn ollama_404_classifies_as_model_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let (_dir, router) = router();
        let router = router.with_endpoint("ollama", server.uri());
        let err = router
            .chat("ollama", "missing-model", "hi", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ModelNotFound(m) if m == "missing-model"));
    }

    #[tokio::test]
    async fn unreachable_runtime_classifies_as_connection_refused() {
        let (_dir, router) = router();
        let router = router.with_endpoint("ollama", "http://127.0.0.1:1");
        let err = router.chat("ollama", "llama3", "hi", &[]).await.unwrap_err();
        assert!(matches!(err, Error::ConnectionRefused(_)), "{err:?}");
    }

    #[tokio::test]
    async fn lmstudio_responses_are_cleaned_of_reasoning_tags() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"choices": [{"message": {"role": "assistant",
                    "content": "<think>short answer is fine</think>Four."},
                    "finish_reason": "stop"}]}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let (_dir, router) = router();
        let router = router.with_endpoint("lmstudio", server.uri());
        let text = router
            .chat("lmstudio", "qwen2.5-7b", "2+2?", &[])
            .await
            .unwrap();
        assert_eq!(text, "Four.");
    }

    #[tokio::test]
    async fn openai_chat_sends_bearer_and_returns_verbatim_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"choices": [{"message": {"role": "assistant", "content": "  spaced  "}}]}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let (_dir, router) = router_with_key("openai", "sk-test");
        let router = router.with_endpoint("openai", server.uri());
        let text = router.chat("openai", "gpt-4o", "hi", &[]).await.unwrap();
        // Cloud responses are returned verbatim, no trimming or cleaning.
        assert_eq!(text, "  spaced  ");
    }

    #[tokio::test]
    async fn rejected_cloud_key_classifies_as_invalid_credential() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_raw(
                r#"{"error": {"message": "Incorrect API key"}}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let (_dir, router) = router_with_key("openai", "sk-expired");
        let router = router.with_endpoint("openai", server.uri());
        let err = router
            .chat("openai", "gpt-4o", "hi", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCredential(_)), "{err:?}");
    }

    #[tokio::test]
    async fn anthropic_chat_sends_version_header_and_parses_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "sk-ant-test"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(body_partial_json(serde_json::json!({"max_tokens": 4096})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"content": [{"type": "text", "text": "Claude says hi"}]}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let (_dir, router) = router_with_key("anthropic", "sk-ant-test");
        let router = router.with_endpoint("anthropic", server.uri());
        let text = router
            .chat("anthropic", "claude-3-haiku-20240307", "hi", &[])
            .await
            .unwrap();
        assert_eq!(text, "Claude says hi");
    }

    #[tokio::test]
    async fn google_chat_posts_generate_content_for_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-pro:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"candidates": [{"content": {"parts": [{"text": "Gemini here"}]},
                    "finishReason": "STOP"}]}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let (_dir, router) = router_with_key("google", "g-key");
        let router = router.with_endpoint("google", server.uri());
        let text = router
            .chat("google", "gemini-pro", "hi", &[])
            .await
            .unwrap();
        assert_eq!(text, "Gemini here");
    }

    #[tokio::test]
    async fn attachments_reach_the_transport_in_contract_format() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(serde_json::json!({
                "prompt": "Summarize\n\nFile: a.txt\nContent:\nhello"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"response": "done", "done": true}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let (_dir, router) = router();
        let router = router.with_endpoint("ollama", server.uri());
        let text = router
            .chat(
                "ollama",
                "llama3",
                "Summarize",
                &[Attachment::text("a.txt", "hello")],
            )
            .await
            .unwrap();
        assert_eq!(text, "done");
    }
}
