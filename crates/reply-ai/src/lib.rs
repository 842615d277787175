mod chat;
mod persona;

pub use persona::DEFAULT_SYSTEM_PROMPT;

use core::{fmt, time::Duration};
use std::time::Instant;

use anyhow::{Context as _, Result, anyhow, bail};
use async_trait::async_trait;
use forum_core::{ReplyGenerator, sanitize_line};
use tracing::{debug, info};

use crate::chat::{ChatBody, ChatMessage, ChatResponse, Role};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f32 = 0.4;
pub const DEFAULT_API_BASE: &str = "https://api.openai.com";
const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub temperature: f32,
    pub system_prompt: String,
    /// `None` keeps reqwest's default (no timeout).
    pub request_timeout: Option<Duration>,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.to_owned(),
            model: DEFAULT_MODEL.to_owned(),
            temperature: DEFAULT_TEMPERATURE,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_owned(),
            request_timeout: None,
        }
    }
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"[SET]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("system_prompt_chars", &self.system_prompt.chars().count())
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Chat-completions client answering with a fixed persona.
#[derive(Debug)]
pub struct OpenAiReplier {
    http: reqwest::Client,
    url: String,
    config: OpenAiConfig,
}

impl OpenAiReplier {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("building HTTP client")?;
        let url = format!(
            "{}{CHAT_COMPLETIONS_PATH}",
            config.api_base.trim_end_matches('/')
        );
        info!(model = %config.model, temperature = config.temperature, url = %url, "AI client ready");
        Ok(Self { http, url, config })
    }
}

#[async_trait]
impl ReplyGenerator for OpenAiReplier {
    async fn generate_reply(&self, question: &str) -> Result<String> {
        let body = ChatBody {
            model: &self.config.model,
            temperature: self.config.temperature,
            messages: vec![
                ChatMessage {
                    role: Role::System,
                    content: &self.config.system_prompt,
                },
                ChatMessage {
                    role: Role::User,
                    content: question,
                },
            ],
        };

        let started = Instant::now();
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .context("sending chat completion request")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("chat completion failed: {status} - {}", sanitize_line(&text, 500));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("decoding chat completion response")?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("chat completion returned no choices"))?
            .message
            .content
            .ok_or_else(|| anyhow!("chat completion returned no text"))?;

        debug!(
            model = %self.config.model,
            elapsed_ms = started.elapsed().as_millis(),
            chars = content.chars().count(),
            "Chat completion received"
        );
        Ok(content)
    }
}
