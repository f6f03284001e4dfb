//! Hosted LLM client.
//!
//! Thin reqwest wrapper over an Anthropic-style messages endpoint. The
//! client is constructed once per process and injected into whatever needs
//! a completion; tests point `base_url` at a local mock server.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::classify::ClassifyError;

const LLM_TIMEOUT: Duration = Duration::from_secs(30);
const ANTHROPIC_VERSION: &str = "2023-06-01";

const DEFAULT_API_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_CLASSIFY_MODEL: &str = "claude-3-5-haiku-latest";
const DEFAULT_DRAFT_MODEL: &str = "claude-sonnet-4-5";

/// Classification wants near-deterministic output.
const CLASSIFY_TEMPERATURE: f32 = 0.1;
const CLASSIFY_MAX_TOKENS: u32 = 256;

/// How much of an error body to keep in the error message.
const ERROR_BODY_LIMIT: usize = 500;

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub classify_model: String,
    pub draft_model: String,
}

impl LlmConfig {
    pub fn from_env() -> Result<Self, ClassifyError> {
        let api_key = env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or(ClassifyError::MissingEnv {
                key: "ANTHROPIC_API_KEY",
            })?;
        Ok(Self {
            api_key,
            base_url: env_or("LLM_API_BASE_URL", DEFAULT_API_BASE_URL),
            classify_model: env_or("ZENO_CLASSIFY_MODEL", DEFAULT_CLASSIFY_MODEL),
            draft_model: env_or("ZENO_DRAFT_MODEL", DEFAULT_DRAFT_MODEL),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// What came back from the model, from the caller's point of view.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmReply {
    Text(String),
    /// The first content block was not text (tool use, refusal stub, ...).
    /// Classification degrades to its fallback on this; drafting errors.
    NonText,
}

pub struct LlmClient {
    config: LlmConfig,
    client: reqwest::Client,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self, ClassifyError> {
        let client = reqwest::Client::builder().timeout(LLM_TIMEOUT).build()?;
        Ok(Self { config, client })
    }

    /// Completion tuned for classification: low temperature, small budget,
    /// the fast model.
    pub async fn classify_completion(&self, prompt: &str) -> Result<LlmReply, ClassifyError> {
        self.complete(
            &self.config.classify_model,
            prompt,
            CLASSIFY_MAX_TOKENS,
            CLASSIFY_TEMPERATURE,
        )
        .await
    }

    /// Completion for reply drafting; temperature and budget come from the
    /// caller's style bucket.
    pub async fn draft_completion(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<LlmReply, ClassifyError> {
        self.complete(&self.config.draft_model, prompt, max_tokens, temperature)
            .await
    }

    async fn complete(
        &self,
        model: &str,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<LlmReply, ClassifyError> {
        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));
        let request = MessagesRequest {
            model,
            max_tokens,
            temperature,
            messages: vec![WireMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ClassifyError::Status {
                status: status.as_u16(),
                body: snippet(&body),
            });
        }

        let parsed: MessagesResponse = serde_json::from_str(&body)?;
        match parsed.content.into_iter().next() {
            Some(block) if block.kind == "text" => {
                Ok(LlmReply::Text(block.text.unwrap_or_default()))
            }
            _ => Ok(LlmReply::NonText),
        }
    }
}

fn snippet(body: &str) -> String {
    match body.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((index, _)) => body[..index].to_string(),
        None => body.to_string(),
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}
