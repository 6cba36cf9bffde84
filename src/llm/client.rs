use super::error::LlmError;
use super::models::{is_text_generation_model, AnalysisResult, Usage};
use super::{ChatBackend, ChatRequest};
use crate::config::Config;
use crate::util::{round_tenths, truncate_str};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Groq's OpenAI-compatible API root
pub const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";

const TEMPERATURE: f32 = 0.3;
const MAX_COMPLETION_TOKENS: u32 = 8192;
const MODELS_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum length for error content in error messages
const MAX_ERROR_CONTENT_LEN: usize = 200;

/// Sanitize API response content for error messages to prevent credential leakage.
fn sanitize_api_response(content: &str) -> String {
    const SECRET_PATTERNS: &[&str] = &[
        "api_key",
        "apikey",
        "secret",
        "password",
        "credential",
        "bearer",
        "gsk_", // Groq key prefix
    ];

    let truncated = truncate_str(content, MAX_ERROR_CONTENT_LEN);

    let lower = truncated.to_lowercase();
    for pattern in SECRET_PATTERNS {
        if lower.contains(pattern) {
            return "(response details redacted - may contain sensitive data)".to_string();
        }
    }

    truncated.to_string()
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
    model: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

struct ParsedReply {
    content: String,
    usage: Usage,
    model: Option<String>,
}

fn parse_chat_response(body: &str) -> Result<ParsedReply, LlmError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| LlmError::Decode(format!("{} ({})", e, sanitize_api_response(body))))?;

    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default();

    Ok(ParsedReply {
        content,
        usage: parsed.usage.unwrap_or_default(),
        model: parsed.model,
    })
}

fn parse_model_list(body: &str) -> Result<Vec<String>, LlmError> {
    let list: ModelList = serde_json::from_str(body)
        .map_err(|e| LlmError::Decode(format!("{} ({})", e, sanitize_api_response(body))))?;

    let total = list.data.len();
    let mut models: Vec<String> = list
        .data
        .into_iter()
        .map(|m| m.id)
        .filter(|id| is_text_generation_model(id))
        .collect();
    models.sort();

    info!(
        "Fetched {} models total, {} text-generation models retained",
        total,
        models.len()
    );
    Ok(models)
}

/// HTTP client for Groq's chat completion API
#[derive(Clone)]
pub struct GroqClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for GroqClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroqClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GroqClient {
    /// Build a client whose requests each give up after `timeout`.
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: GROQ_API_BASE.to_string(),
        })
    }

    /// Build a client from the stored/env API key and configured timeout.
    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        let key = config.get_api_key().ok_or(LlmError::MissingApiKey)?;
        Self::new(key, config.request_timeout())
    }

    /// Send one system + user message pair and wait for the reply.
    pub async fn chat(
        &self,
        model: &str,
        system: &str,
        user: &str,
    ) -> Result<AnalysisResult, LlmError> {
        info!("Calling Groq with model={}", model);
        debug!(
            "System prompt length: {} chars | User content length: {} chars",
            system.len(),
            user.len()
        );

        let request = ChatCompletionRequest {
            model,
            messages: [
                Message {
                    role: "system",
                    content: system,
                },
                Message {
                    role: "user",
                    content: user,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_COMPLETION_TOKENS,
            stream: false,
        };

        let start = Instant::now();
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .inspect_err(|e| error!("Groq request failed: {}", e))?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let err = LlmError::from_status(status.as_u16(), sanitize_api_response(&body));
            error!("Groq call failed: {}", err);
            return Err(err);
        }

        let reply = parse_chat_response(&body)?;
        let elapsed_seconds = round_tenths(start.elapsed().as_secs_f64());
        info!(
            "Groq response received ({} chars, {:.1}s)",
            reply.content.len(),
            elapsed_seconds
        );

        Ok(AnalysisResult {
            content: reply.content,
            model: reply.model.unwrap_or_else(|| model.to_string()),
            usage: reply.usage,
            elapsed_seconds,
        })
    }

    /// List the chat-capable model ids available to this key, sorted.
    pub async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        info!("Fetching available Groq models");
        let response = self
            .http
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(MODELS_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LlmError::from_status(
                status.as_u16(),
                sanitize_api_response(&body),
            ));
        }

        parse_model_list(&body)
    }
}

impl ChatBackend for GroqClient {
    fn complete<'a>(
        &'a self,
        request: ChatRequest<'a>,
    ) -> BoxFuture<'a, Result<AnalysisResult, LlmError>> {
        Box::pin(self.chat(request.model, request.system, request.user))
    }
}
