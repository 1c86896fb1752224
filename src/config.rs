//! TOML configuration.
//!
//! Every section is optional. A missing config file yields
//! [`Config::default`], which binds the server to `0.0.0.0:5000` and exposes
//! the built-in provider and persona catalogs.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::persona;
use crate::provider::BUILTIN_PROVIDERS;

/// Config file looked up when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "./config/chatdesk.toml";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub chat: ChatConfig,
    pub attachments: AttachmentsConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    /// Overrides for built-in providers, keyed by provider name.
    pub providers: BTreeMap<String, ProviderOverride>,
    /// Extra or replacement personas, keyed by persona name.
    pub personas: BTreeMap<String, PersonaConfig>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Page title shown in the browser UI.
    pub title: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".to_string(),
            title: "chatdesk".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChatConfig {
    pub default_provider: String,
    pub default_persona: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    /// Number of prior messages forwarded to the provider.
    pub max_history_messages: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_provider: "openai".to_string(),
            default_persona: "assistant".to_string(),
            max_tokens: 1024,
            temperature: 0.7,
            timeout_secs: 60,
            max_retries: 2,
            retry_backoff_ms: 1000,
            max_history_messages: 50,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AttachmentsConfig {
    pub max_files: usize,
    /// Per-file limit on the decoded upload size.
    pub max_bytes: usize,
    /// Extracted text beyond this many characters is cut off.
    pub max_chars: usize,
}

impl Default for AttachmentsConfig {
    fn default() -> Self {
        Self {
            max_files: 5,
            max_bytes: 10 * 1024 * 1024,
            max_chars: 20_000,
        }
    }
}

impl AttachmentsConfig {
    /// Upper bound on a request body carrying a full set of base64 uploads.
    pub fn body_limit(&self) -> usize {
        let encoded = self.max_bytes.saturating_mul(4) / 3 + 4;
        self.max_files
            .saturating_mul(encoded)
            .saturating_add(1024 * 1024)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub transcripts_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            transcripts_dir: PathBuf::from("./data/transcripts"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Per-provider overrides. Unset fields keep the built-in values.
#[derive(Debug, Deserialize, Clone)]
pub struct ProviderOverride {
    #[serde(default)]
    pub base_url: Option<String>,
    /// Inline API key. Takes precedence over `api_key_env`.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub models: Option<Vec<String>>,
    #[serde(default)]
    pub default_model: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct PersonaConfig {
    #[serde(default)]
    pub description: String,
    pub system_prompt: String,
}

/// Parse and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = parse_config(&content)
        .with_context(|| format!("Invalid config file: {}", path.display()))?;

    Ok(config)
}

/// Parse and validate config text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).context("Failed to parse config")?;
    validate(&config)?;
    Ok(config)
}

/// Load the config named on the command line, or fall back to
/// [`DEFAULT_CONFIG_PATH`] and then to built-in defaults.
pub fn resolve_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => load_config(path),
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                load_config(default_path)
            } else {
                Ok(Config::default())
            }
        }
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.chat.max_tokens == 0 {
        anyhow::bail!("chat.max_tokens must be > 0");
    }

    if !(0.0..=2.0).contains(&config.chat.temperature) {
        anyhow::bail!("chat.temperature must be in [0.0, 2.0]");
    }

    if config.attachments.max_files == 0 {
        anyhow::bail!("attachments.max_files must be >= 1");
    }
    if config.attachments.max_bytes == 0 {
        anyhow::bail!("attachments.max_bytes must be > 0");
    }
    if config.attachments.max_chars == 0 {
        anyhow::bail!("attachments.max_chars must be > 0");
    }

    let known = |name: &str| BUILTIN_PROVIDERS.iter().any(|p| p.name == name);

    for (name, entry) in &config.providers {
        if !known(name) {
            anyhow::bail!(
                "Unknown provider in [providers.{}]. Must be one of: {}",
                name,
                builtin_names()
            );
        }
        if let (Some(models), Some(default)) = (&entry.models, &entry.default_model) {
            if !models.contains(default) {
                anyhow::bail!(
                    "providers.{}.default_model '{}' is not listed in providers.{}.models",
                    name,
                    default,
                    name
                );
            }
        }
        if matches!(&entry.models, Some(models) if models.is_empty()) {
            anyhow::bail!("providers.{}.models must not be empty", name);
        }
        if let (None, Some(default)) = (&entry.models, &entry.default_model) {
            let builtin = BUILTIN_PROVIDERS.iter().find(|p| p.name == name);
            if !builtin.is_some_and(|p| p.models.iter().any(|m| *m == default.as_str())) {
                anyhow::bail!(
                    "providers.{}.default_model '{}' is not a built-in {} model; list it in providers.{}.models",
                    name,
                    default,
                    name,
                    name
                );
            }
        }
    }

    if !known(&config.chat.default_provider) {
        anyhow::bail!(
            "chat.default_provider '{}' is not a known provider. Must be one of: {}",
            config.chat.default_provider,
            builtin_names()
        );
    }
    if matches!(config.providers.get(&config.chat.default_provider), Some(p) if !p.enabled) {
        anyhow::bail!(
            "chat.default_provider '{}' is disabled in [providers.{}]",
            config.chat.default_provider,
            config.chat.default_provider
        );
    }

    for (name, persona) in &config.personas {
        if persona.system_prompt.trim().is_empty() {
            anyhow::bail!("personas.{}.system_prompt must not be empty", name);
        }
    }

    let default_persona = &config.chat.default_persona;
    if !persona::is_builtin(default_persona) && !config.personas.contains_key(default_persona) {
        anyhow::bail!(
            "chat.default_persona '{}' is neither a built-in persona nor defined in [personas]",
            default_persona
        );
    }

    match config.logging.format.as_str() {
        "pretty" | "json" => {}
        other => anyhow::bail!(
            "Unknown logging format: '{}'. Must be pretty or json.",
            other
        ),
    }

    Ok(())
}

fn builtin_names() -> String {
    BUILTIN_PROVIDERS
        .iter()
        .map(|p| p.name)
        .collect::<Vec<_>>()
        .join(", ")
}
