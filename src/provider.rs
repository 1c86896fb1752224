//! Hosted chat providers.
//!
//! Five providers are built in. Four of them speak the OpenAI
//! `chat/completions` format; Anthropic has its own `messages` format.
//! Config can override any field of a built-in entry or disable it, but
//! cannot add new providers.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors and timeouts → retry
//! - Backoff: `retry_backoff_ms` × 1, 2, 4, 8, 16, 32 (capped at 2^5)

use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

use crate::config::{ChatConfig, Config};
use crate::models::{ChatMessage, Role};

/// Version header required by the Anthropic messages API.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Longest slice of a raw error body echoed back to the caller.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Request/response shape spoken by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    OpenAi,
    Anthropic,
}

/// Static description of a built-in provider.
#[derive(Debug)]
pub struct ProviderSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub base_url: &'static str,
    pub api_key_env: &'static str,
    pub wire: WireFormat,
    /// Offered models; the first one is the default.
    pub models: &'static [&'static str],
}

pub const BUILTIN_PROVIDERS: &[ProviderSpec] = &[
    ProviderSpec {
        name: "openai",
        label: "OpenAI",
        base_url: "https://api.openai.com/v1",
        api_key_env: "OPENAI_API_KEY",
        wire: WireFormat::OpenAi,
        models: &["gpt-4o-mini", "gpt-4o", "gpt-4.1", "gpt-4.1-mini"],
    },
    ProviderSpec {
        name: "groq",
        label: "Groq",
        base_url: "https://api.groq.com/openai/v1",
        api_key_env: "GROQ_API_KEY",
        wire: WireFormat::OpenAi,
        models: &[
            "llama-3.3-70b-versatile",
            "llama-3.1-8b-instant",
            "mixtral-8x7b-32768",
        ],
    },
    ProviderSpec {
        name: "anthropic",
        label: "Anthropic",
        base_url: "https://api.anthropic.com/v1",
        api_key_env: "ANTHROPIC_API_KEY",
        wire: WireFormat::Anthropic,
        models: &[
            "claude-3-5-sonnet-latest",
            "claude-3-5-haiku-latest",
            "claude-3-opus-latest",
        ],
    },
    ProviderSpec {
        name: "mistral",
        label: "Mistral",
        base_url: "https://api.mistral.ai/v1",
        api_key_env: "MISTRAL_API_KEY",
        wire: WireFormat::OpenAi,
        models: &[
            "mistral-large-latest",
            "mistral-small-latest",
            "open-mistral-nemo",
        ],
    },
    ProviderSpec {
        name: "xai",
        label: "xAI",
        base_url: "https://api.x.ai/v1",
        api_key_env: "XAI_API_KEY",
        wire: WireFormat::OpenAi,
        models: &["grok-2-latest", "grok-beta"],
    },
];

/// Failure talking to a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no API key for provider '{provider}' (set {env} or providers.{provider}.api_key)")]
    MissingApiKey { provider: String, env: String },

    #[error("{provider} API error {status}: {message}")]
    Upstream {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("{provider} request timed out after {secs}s")]
    Timeout { provider: String, secs: u64 },

    #[error("{provider} connection error: {message}")]
    Transport { provider: String, message: String },

    #[error("invalid {provider} response: {message}")]
    InvalidResponse { provider: String, message: String },

    #[error("{provider} returned an empty reply")]
    EmptyReply { provider: String },
}

/// A provider after config overrides have been applied.
#[derive(Debug, Clone)]
pub struct Provider {
    pub name: String,
    pub label: String,
    pub base_url: String,
    pub api_key_env: String,
    pub wire: WireFormat,
    pub models: Vec<String>,
    pub default_model: String,
    api_key: Option<String>,
}

/// Listing entry for `GET /api/providers`.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub name: String,
    pub label: String,
    pub models: Vec<String>,
    pub default_model: String,
    /// Whether an API key is available.
    pub configured: bool,
}

impl Provider {
    fn from_spec(spec: &ProviderSpec) -> Self {
        let models: Vec<String> = spec.models.iter().map(|m| m.to_string()).collect();
        Self {
            name: spec.name.to_string(),
            label: spec.label.to_string(),
            base_url: spec.base_url.to_string(),
            api_key_env: spec.api_key_env.to_string(),
            wire: spec.wire,
            default_model: models.first().cloned().unwrap_or_default(),
            models,
            api_key: None,
        }
    }

    /// The API key: the inline config value if set, else the environment
    /// variable. Blank values count as missing.
    pub fn api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn is_configured(&self) -> bool {
        self.api_key().is_some()
    }

    /// Pick the model for a request. `None` or blank selects the default;
    /// anything outside the offered list is rejected.
    pub fn resolve_model(&self, requested: Option<&str>) -> Result<String, String> {
        match requested.map(str::trim).filter(|m| !m.is_empty()) {
            None => Ok(self.default_model.clone()),
            Some(model) if self.models.iter().any(|m| m == model) => Ok(model.to_string()),
            Some(model) => Err(format!(
                "model '{}' is not offered by provider '{}' (available: {})",
                model,
                self.name,
                self.models.join(", ")
            )),
        }
    }

    pub fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: self.name.clone(),
            label: self.label.clone(),
            models: self.models.clone(),
            default_model: self.default_model.clone(),
            configured: self.is_configured(),
        }
    }

    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        match self.wire {
            WireFormat::OpenAi => format!("{}/chat/completions", base),
            WireFormat::Anthropic => format!("{}/messages", base),
        }
    }
}

/// The enabled providers, in catalog order.
#[derive(Debug, Clone)]
pub struct ProviderCatalog {
    providers: Vec<Provider>,
}

impl ProviderCatalog {
    pub fn from_config(config: &Config) -> Self {
        let mut providers = Vec::with_capacity(BUILTIN_PROVIDERS.len());

        for spec in BUILTIN_PROVIDERS {
            let mut provider = Provider::from_spec(spec);

            if let Some(over) = config.providers.get(spec.name) {
                if !over.enabled {
                    continue;
                }
                if let Some(url) = &over.base_url {
                    provider.base_url = url.clone();
                }
                if let Some(env) = &over.api_key_env {
                    provider.api_key_env = env.clone();
                }
                provider.api_key = over.api_key.clone();
                if let Some(models) = &over.models {
                    provider.models = models.clone();
                    provider.default_model = models.first().cloned().unwrap_or_default();
                }
                if let Some(default) = &over.default_model {
                    provider.default_model = default.clone();
                }
            }

            providers.push(provider);
        }

        Self { providers }
    }

    pub fn get(&self, name: &str) -> Option<&Provider> {
        self.providers.iter().find(|p| p.name == name)
    }

    pub fn list(&self) -> Vec<ProviderInfo> {
        self.providers.iter().map(Provider::info).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// Build the shared HTTP client used for all provider calls.
pub fn build_client(config: &ChatConfig) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(concat!("chatdesk/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Send a conversation to a provider and return the reply text.
///
/// `messages` may contain system messages anywhere; they are mapped to the
/// provider's native system prompt slot.
pub async fn send_chat(
    client: &reqwest::Client,
    provider: &Provider,
    model: &str,
    messages: &[ChatMessage],
    config: &ChatConfig,
) -> Result<String, ProviderError> {
    let api_key = provider
        .api_key()
        .ok_or_else(|| ProviderError::MissingApiKey {
            provider: provider.name.clone(),
            env: provider.api_key_env.clone(),
        })?;

    let body = match provider.wire {
        WireFormat::OpenAi => build_openai_body(model, messages, config),
        WireFormat::Anthropic => build_anthropic_body(model, messages, config),
    };
    let url = provider.endpoint();

    let mut last_err = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = Duration::from_millis(config.retry_backoff_ms << (attempt - 1).min(5));
            tracing::debug!(
                provider = %provider.name,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "retrying chat request"
            );
            tokio::time::sleep(delay).await;
        }

        let request = client.post(&url).json(&body);
        let request = match provider.wire {
            WireFormat::OpenAi => request.bearer_auth(&api_key),
            WireFormat::Anthropic => request
                .header("x-api-key", &api_key)
                .header("anthropic-version", ANTHROPIC_VERSION),
        };

        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    let json: Value =
                        response
                            .json()
                            .await
                            .map_err(|e| ProviderError::InvalidResponse {
                                provider: provider.name.clone(),
                                message: e.to_string(),
                            })?;
                    let reply = match provider.wire {
                        WireFormat::OpenAi => parse_openai_reply(&json),
                        WireFormat::Anthropic => parse_anthropic_reply(&json),
                    }
                    .map_err(|message| ProviderError::InvalidResponse {
                        provider: provider.name.clone(),
                        message,
                    })?;

                    if reply.trim().is_empty() {
                        return Err(ProviderError::EmptyReply {
                            provider: provider.name.clone(),
                        });
                    }
                    return Ok(reply);
                }

                let body_text = response.text().await.unwrap_or_default();
                let err = ProviderError::Upstream {
                    provider: provider.name.clone(),
                    status: status.as_u16(),
                    message: extract_error_message(&body_text),
                };

                if status.as_u16() == 429 || status.is_server_error() {
                    tracing::warn!(provider = %provider.name, status = status.as_u16(), "provider request failed, will retry");
                    last_err = Some(err);
                    continue;
                }

                return Err(err);
            }
            Err(e) if e.is_timeout() => {
                tracing::warn!(provider = %provider.name, "provider request timed out");
                last_err = Some(ProviderError::Timeout {
                    provider: provider.name.clone(),
                    secs: config.timeout_secs,
                });
            }
            Err(e) => {
                tracing::warn!(provider = %provider.name, error = %e, "provider connection failed");
                last_err = Some(ProviderError::Transport {
                    provider: provider.name.clone(),
                    message: e.to_string(),
                });
            }
        }
    }

    Err(last_err.unwrap_or_else(|| ProviderError::Transport {
        provider: provider.name.clone(),
        message: "chat request failed after retries".to_string(),
    }))
}

/// Request body for the OpenAI `chat/completions` format.
pub fn build_openai_body(model: &str, messages: &[ChatMessage], config: &ChatConfig) -> Value {
    json!({
        "model": model,
        "messages": messages,
        "max_tokens": config.max_tokens,
        "temperature": config.temperature,
    })
}

/// Request body for the Anthropic `messages` format. System messages are
/// lifted into the top-level `system` field.
pub fn build_anthropic_body(model: &str, messages: &[ChatMessage], config: &ChatConfig) -> Value {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();
    let turns: Vec<&ChatMessage> = messages.iter().filter(|m| m.role != Role::System).collect();

    let mut body = json!({
        "model": model,
        "max_tokens": config.max_tokens,
        "temperature": config.temperature,
        "messages": turns,
    });
    if !system.is_empty() {
        body["system"] = Value::String(system.join("\n\n"));
    }
    body
}

/// Extract `choices[0].message.content`.
pub fn parse_openai_reply(json: &Value) -> Result<String, String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| "missing choices[0].message.content".to_string())
}

/// Concatenate the `text` blocks of an Anthropic reply.
pub fn parse_anthropic_reply(json: &Value) -> Result<String, String> {
    let blocks = json
        .get("content")
        .and_then(|c| c.as_array())
        .ok_or_else(|| "missing content array".to_string())?;

    Ok(blocks
        .iter()
        .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
        .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join(""))
}

/// Pull a human-readable message out of a provider error body.
pub fn extract_error_message(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        let message = json
            .get("error")
            .and_then(|e| e.get("message").or(Some(e)))
            .and_then(|m| m.as_str())
            .or_else(|| json.get("message").and_then(|m| m.as_str()));
        if let Some(message) = message {
            return message.to_string();
        }
    }

    let trimmed = body.trim();
    if trimmed.chars().count() > MAX_ERROR_BODY_CHARS {
        let cut: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{}…", cut)
    } else {
        trimmed.to_string()
    }
}

/// Print the provider catalog (`chatdesk providers`).
pub fn list_providers(config: &Config) {
    let catalog = ProviderCatalog::from_config(config);

    println!(
        "{:<12} {:<10} {:<28} {:<20} MODELS",
        "PROVIDER", "KEY", "DEFAULT MODEL", "KEY ENV"
    );
    for provider in catalog.providers.iter() {
        let key = if provider.is_configured() {
            "set"
        } else {
            "missing"
        };
        println!(
            "{:<12} {:<10} {:<28} {:<20} {}",
            provider.name,
            key,
            provider.default_model,
            provider.api_key_env,
            provider.models.join(", ")
        );
    }
}
