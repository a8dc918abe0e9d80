use derive_more::Display;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::{Value, json};
use strum::{AsRefStr, EnumString};
use tracing::{debug, warn};

use crate::config::AiConfig;

const SYSTEM_PROMPT: &str = "You are a helpful assistant for TaskFlow, providing concise and \
relevant information about task management, productivity, and workplace organization.";
const MAX_TOKENS: u32 = 500;
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum AiProvider {
    /// Answers locally; no network, no key.
    Mock,
    OpenAi,
    Groq,
    Anthropic,
}

impl AiProvider {
    fn default_endpoint(&self) -> &'static str {
        match self {
            AiProvider::Mock => "",
            AiProvider::OpenAi => "https://api.openai.com/v1/chat/completions",
            AiProvider::Groq => "https://api.groq.com/openai/v1/chat/completions",
            AiProvider::Anthropic => "https://api.anthropic.com/v1/messages",
        }
    }
}

#[derive(Debug, Display)]
pub enum AiError {
    #[display(fmt = "request failed: {}", _0)]
    Http(reqwest::Error),
    #[display(fmt = "{}", _0)]
    Provider(String),
    #[display(fmt = "unexpected response shape")]
    MalformedResponse,
}

impl From<reqwest::Error> for AiError {
    fn from(e: reqwest::Error) -> Self {
        AiError::Http(e)
    }
}

#[derive(Clone)]
pub struct AiClient {
    http: reqwest::Client,
    config: AiConfig,
}

impl AiClient {
    /// A remote provider without an API key degrades to the mock provider.
    pub fn new(mut config: AiConfig) -> Self {
        if config.provider != AiProvider::Mock && config.api_key.trim().is_empty() {
            warn!(
                provider = config.provider.as_ref(),
                "No AI_API_KEY configured, falling back to the mock provider"
            );
            config.provider = AiProvider::Mock;
        }

        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn provider(&self) -> AiProvider {
        self.config.provider
    }

    pub async fn complete(&self, prompt: &str) -> Result<String, AiError> {
        let provider = self.config.provider;
        if provider == AiProvider::Mock {
            return Ok(mock_reply(prompt));
        }

        let endpoint = self
            .config
            .endpoint
            .as_deref()
            .unwrap_or_else(|| provider.default_endpoint());

        debug!(provider = provider.as_ref(), model = %self.config.model, "Calling AI provider");

        let request = match provider {
            AiProvider::Anthropic => self
                .http
                .post(endpoint)
                .header("x-api-key", &self.config.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&json!({
                    "model": self.config.model,
                    "system": SYSTEM_PROMPT,
                    "messages": [{ "role": "user", "content": prompt }],
                    "max_tokens": MAX_TOKENS,
                })),
            _ => self
                .http
                .post(endpoint)
                .header(AUTHORIZATION, format!("Bearer {}", self.config.api_key))
                .json(&json!({
                    "model": self.config.model,
                    "messages": [
                        { "role": "system", "content": SYSTEM_PROMPT },
                        { "role": "user", "content": prompt },
                    ],
                    "max_tokens": MAX_TOKENS,
                })),
        };

        let response = request.header(CONTENT_TYPE, "application/json").send().await?;
        let status = response.status();
        let body: Value = response.json().await?;

        if !status.is_success() {
            let reason = body
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error")
                .to_string();
            warn!(provider = provider.as_ref(), %status, %reason, "AI provider returned an error");
            return Err(AiError::Provider(reason));
        }

        extract_reply(provider, &body)
    }
}

fn extract_reply(provider: AiProvider, body: &Value) -> Result<String, AiError> {
    let pointer = match provider {
        AiProvider::Anthropic => "/content/0/text",
        _ => "/choices/0/message/content",
    };

    body.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(AiError::MalformedResponse)
}

fn mock_reply(prompt: &str) -> String {
    format!(
        "Here is a suggestion for \"{}\": break the work into small tasks, give each a due \
         date and a priority, and review progress at the end of every day.",
        prompt.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn provider_names_parse() {
        assert_eq!(AiProvider::from_str("openai").unwrap(), AiProvider::OpenAi);
        assert_eq!(AiProvider::from_str("anthropic").unwrap(), AiProvider::Anthropic);
        assert!(AiProvider::from_str("cohere").is_err());
    }

    #[test]
    fn replies_are_read_from_the_provider_specific_path() {
        let openai = json!({ "choices": [{ "message": { "content": "hi" } }] });
        let anthropic = json!({ "content": [{ "type": "text", "text": "hello" }] });

        assert_eq!(extract_reply(AiProvider::Groq, &openai).unwrap(), "hi");
        assert_eq!(extract_reply(AiProvider::Anthropic, &anthropic).unwrap(), "hello");
        assert!(matches!(
            extract_reply(AiProvider::OpenAi, &anthropic),
            Err(AiError::MalformedResponse)
        ));
    }

    #[actix_web::test]
    async fn mock_provider_answers_without_network() {
        let client = AiClient::new(AiConfig {
            provider: AiProvider::Mock,
            api_key: String::new(),
            model: "none".into(),
            endpoint: None,
        });
        let reply = client.complete("  plan my week ").await.unwrap();
        assert!(reply.contains("\"plan my week\""));
    }

    #[test]
    fn remote_provider_without_key_degrades_to_mock() {
        let client = AiClient::new(AiConfig {
            provider: AiProvider::OpenAi,
            api_key: "  ".into(),
            model: "gpt-4o-mini".into(),
            endpoint: None,
        });
        assert_eq!(client.provider(), AiProvider::Mock);
    }
}
