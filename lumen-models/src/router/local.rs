//! Chat transports for local runtimes.
//!
//! Ollama speaks its own `/api/generate` protocol and honors the full
//! sampling parameter set through `options`. LM Studio exposes an
//! OpenAI-compatible `/v1/chat/completions` endpoint that accepts only
//! `temperature`, `top_p` and `stop`; `top_k`, `repeat_penalty` and
//! `num_ctx` are not part of that API and are silently ignored for it.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GenerationConfig;
use crate::{Error, Result};

use super::{clean::clean_model_response, ensure_success, CHAT_TIMEOUT};

/// Request body for Ollama's `/api/generate` endpoint.
#[derive(Debug, Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions<'a>,
}

/// Sampling options for Ollama, mapped 1:1 from [`GenerationConfig`].
#[derive(Debug, Serialize)]
struct OllamaOptions<'a> {
    temperature: f64,
    top_p: f64,
    top_k: u32,
    repeat_penalty: f64,
    num_ctx: u32,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    stop: &'a [String],
}

impl<'a> OllamaOptions<'a> {
    fn from_config(config: &'a GenerationConfig) -> Self {
        Self {
            temperature: config.temperature,
            top_p: config.top_p,
            top_k: config.top_k,
            repeat_penalty: config.repeat_penalty,
            num_ctx: config.num_ctx,
            stop: &config.stop,
        }
    }
}

/// Response from Ollama's `/api/generate` endpoint.
#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    error: Option<String>,
}

pub(super) async fn ollama_chat(
    client: &reqwest::Client,
    endpoint: &str,
    model: &str,
    prompt: &str,
    config: &GenerationConfig,
) -> Result<String> {
    let url = format!("{endpoint}/api/generate");
    let request = OllamaGenerateRequest {
        model,
        prompt,
        stream: false,
        options: OllamaOptions::from_config(config),
    };
    debug!(model, %url, "dispatching chat to Ollama");

    let response = client
        .post(&url)
        .json(&request)
        .timeout(CHAT_TIMEOUT)
        .send()
        .await
        .map_err(crate::error::classify_request_error)?;
    let response = ensure_success("ollama", model, response).await?;

    let body: OllamaGenerateResponse = response
        .json()
        .await
        .map_err(crate::error::classify_request_error)?;

    if let Some(error) = body.error {
        let lowered = error.to_lowercase();
        if lowered.contains("not found") {
            return Err(Error::ModelNotFound(model.to_string()));
        }
        return Err(Error::Unknown(format!("Ollama error: {error}")));
    }
    if body.response.is_empty() {
        return Err(Error::Unknown(
            "received empty response from Ollama".to_string(),
        ));
    }
    Ok(body.response)
}

/// A chat message in the OpenAI-compatible shape LM Studio uses.
#[derive(Debug, Serialize, Deserialize)]
pub(super) struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Request body for LM Studio's `/v1/chat/completions` endpoint.
#[derive(Debug, Serialize)]
struct LmStudioChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    temperature: f64,
    top_p: f64,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    stop: &'a [String],
}

/// Response body shared by OpenAI-compatible chat endpoints.
#[derive(Debug, Deserialize)]
pub(super) struct OpenAiCompatChatResponse {
    #[serde(default)]
    pub choices: Vec<OpenAiCompatChoice>,
    #[serde(default)]
    pub error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
pub(super) struct OpenAiCompatChoice {
    pub message: ChatMessage,
}

#[derive(Debug, Deserialize)]
pub(super) struct ApiErrorBody {
    pub message: String,
}

pub(super) async fn lmstudio_chat(
    client: &reqwest::Client,
    endpoint: &str,
    model: &str,
    prompt: &str,
    config: &GenerationConfig,
) -> Result<String> {
    let url = format!("{endpoint}/v1/chat/completions");
    let request = LmStudioChatRequest {
        model,
        messages: vec![ChatMessage::user(prompt)],
        stream: false,
        temperature: config.temperature,
        top_p: config.top_p,
        stop: &config.stop,
    };
    debug!(model, %url, "dispatching chat to LM Studio");

    let response = client
        .post(&url)
        .json(&request)
        .timeout(CHAT_TIMEOUT)
        .send()
        .await
        .map_err(crate::error::classify_request_error)?;
    let response = ensure_success("lmstudio", model, response).await?;

    let body: OpenAiCompatChatResponse = response
        .json()
        .await
        .map_err(crate::error::classify_request_error)?;

    if let Some(error) = body.error {
        return Err(Error::Unknown(format!("LM Studio error: {}", error.message)));
    }
    let Some(choice) = body.choices.into_iter().next() else {
        return Err(Error::Unknown("no response from LM Studio".to_string()));
    };

    // Local models often leak reasoning tags through this runtime.
    Ok(clean_model_response(&choice.message.content))
}
