//! Chat transports for cloud providers.
//!
//! All three providers receive the same normalized parameter set, mapped
//! to their native field names. Fields a provider's API does not accept
//! are silently ignored for it:
//!
//! - OpenAI: `temperature`, `top_p`, `stop`; no `top_k`, `repeat_penalty`
//!   or `num_ctx`.
//! - Anthropic: `temperature`, `top_p`, `top_k`, `stop_sequences`;
//!   `max_tokens` is required by the API and fixed at a 4096 default.
//! - Google: full generation config (`temperature`, `topP`, `topK`,
//!   `stopSequences`).

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::ApiKey;
use crate::config::GenerationConfig;
use crate::{Error, Result};

use super::local::{ChatMessage, OpenAiCompatChatResponse};
use super::{ensure_success, CHAT_TIMEOUT};

/// Anthropic requires an explicit output budget on every request.
const ANTHROPIC_MAX_TOKENS: u32 = 4096;

/// API version header Anthropic requires.
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct OpenAiChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    temperature: f64,
    top_p: f64,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    stop: &'a [String],
}

pub(super) async fn openai_chat(
    client: &reqwest::Client,
    endpoint: &str,
    api_key: &ApiKey,
    model: &str,
    prompt: &str,
    config: &GenerationConfig,
) -> Result<String> {
    let url = format!("{endpoint}/v1/chat/completions");
    let request = OpenAiChatRequest {
        model,
        messages: vec![ChatMessage::user(prompt)],
        stream: false,
        temperature: config.temperature,
        top_p: config.top_p,
        stop: &config.stop,
    };
    debug!(model, "dispatching chat to OpenAI");

    let response = client
        .post(&url)
        .bearer_auth(api_key.expose_secret())
        .json(&request)
        .timeout(CHAT_TIMEOUT)
        .send()
        .await
        .map_err(crate::error::classify_request_error)?;
    let response = ensure_success("openai", model, response).await?;

    let body: OpenAiCompatChatResponse = response
        .json()
        .await
        .map_err(crate::error::classify_request_error)?;

    if let Some(error) = body.error {
        return Err(Error::Unknown(format!("OpenAI error: {}", error.message)));
    }
    body.choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| Error::Unknown("no response choices from OpenAI".to_string()))
}

#[derive(Debug, Serialize)]
struct AnthropicChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f64,
    top_p: f64,
    top_k: u32,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    stop_sequences: &'a [String],
}

#[derive(Debug, Deserialize)]
struct AnthropicChatResponse {
    #[serde(default)]
    content: Vec<AnthropicContentBlock>,
    #[serde(default)]
    error: Option<AnthropicErrorBody>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

pub(super) async fn anthropic_chat(
    client: &reqwest::Client,
    endpoint: &str,
    api_key: &ApiKey,
    model: &str,
    prompt: &str,
    config: &GenerationConfig,
) -> Result<String> {
    let url = format!("{endpoint}/v1/messages");
    let request = AnthropicChatRequest {
        model,
        messages: vec![ChatMessage::user(prompt)],
        max_tokens: ANTHROPIC_MAX_TOKENS,
        temperature: config.temperature,
        top_p: config.top_p,
        top_k: config.top_k,
        stop_sequences: &config.stop,
    };
    debug!(model, "dispatching chat to Anthropic");

    let response = client
        .post(&url)
        .header("x-api-key", api_key.expose_secret())
        .header("anthropic-version", ANTHROPIC_VERSION)
        .json(&request)
        .timeout(CHAT_TIMEOUT)
        .send()
        .await
        .map_err(crate::error::classify_request_error)?;
    let response = ensure_success("anthropic", model, response).await?;

    let body: AnthropicChatResponse = response
        .json()
        .await
        .map_err(crate::error::classify_request_error)?;

    if let Some(error) = body.error {
        return Err(Error::Unknown(format!(
            "Anthropic error: {}",
            error.message
        )));
    }
    body.content
        .into_iter()
        .next()
        .map(|block| block.text)
        .ok_or_else(|| Error::Unknown("no response content from Anthropic".to_string()))
}

#[derive(Debug, Serialize)]
struct GoogleChatRequest<'a> {
    contents: Vec<GoogleContent<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GoogleGenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
struct GoogleContent<'a> {
    parts: Vec<GooglePart<'a>>,
}

#[derive(Debug, Serialize)]
struct GooglePart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GoogleGenerationConfig<'a> {
    temperature: f64,
    #[serde(rename = "topP")]
    top_p: f64,
    #[serde(rename = "topK")]
    top_k: u32,
    #[serde(rename = "stopSequences", skip_serializing_if = "<[_]>::is_empty")]
    stop_sequences: &'a [String],
}

#[derive(Debug, Deserialize)]
struct GoogleChatResponse {
    #[serde(default)]
    candidates: Vec<GoogleCandidate>,
    #[serde(default)]
    error: Option<GoogleErrorBody>,
}

#[derive(Debug, Deserialize)]
struct GoogleCandidate {
    #[serde(default)]
    content: GoogleCandidateContent,
    #[serde(default, rename = "finishReason")]
    finish_reason: String,
}

#[derive(Debug, Default, Deserialize)]
struct GoogleCandidateContent {
    #[serde(default)]
    parts: Vec<GoogleResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GoogleResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    message: String,
}

pub(super) async fn google_chat(
    client: &reqwest::Client,
    endpoint: &str,
    api_key: &ApiKey,
    model: &str,
    prompt: &str,
    config: &GenerationConfig,
) -> Result<String> {
    let url = format!("{endpoint}/v1beta/models/{model}:generateContent");
    let request = GoogleChatRequest {
        contents: vec![GoogleContent {
            parts: vec![GooglePart { text: prompt }],
        }],
        generation_config: GoogleGenerationConfig {
            temperature: config.temperature,
            top_p: config.top_p,
            top_k: config.top_k,
            stop_sequences: &config.stop,
        },
    };
    debug!(model, "dispatching chat to Google");

    let response = client
        .post(&url)
        .query(&[("key", api_key.expose_secret())])
        .json(&request)
        .timeout(CHAT_TIMEOUT)
        .send()
        .await
        .map_err(crate::error::classify_request_error)?;
    let response = ensure_success("google", model, response).await?;

    let body: GoogleChatResponse = response
        .json()
        .await
        .map_err(crate::error::classify_request_error)?;

    if let Some(error) = body.error {
        return Err(Error::Unknown(format!("Google error: {}", error.message)));
    }

    let Some(candidate) = body.candidates.into_iter().next() else {
        return Err(Error::Unknown(
            "no response content from Google".to_string(),
        ));
    };
    if let Some(part) = candidate.content.parts.into_iter().next() {
        return Ok(part.text);
    }
    if !candidate.finish_reason.is_empty() {
        return Err(Error::Unknown(format!(
            "Google model finished with reason '{}'; this can be caused by safety filters or an invalid request",
            candidate.finish_reason
        )));
    }
    Err(Error::Unknown(
        "no response content from Google".to_string(),
    ))
}
