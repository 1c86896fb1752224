//! The chat round trip: validate a request, assemble the provider
//! conversation, send it, and hand back the reply.

use anyhow::Context as _;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::attachments::{self, AttachmentError, AttachmentSummary, AttachmentUpload};
use crate::config::Config;
use crate::models::{ChatMessage, Role};
use crate::persona::PersonaRegistry;
use crate::provider::{self, ProviderCatalog, ProviderError};
use crate::transcript::{NewTranscript, TranscriptStore};

/// Incoming chat request from the browser or CLI.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub persona: Option<String>,
    #[serde(default)]
    pub message: String,
    /// Prior turns, oldest first.
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    #[serde(default)]
    pub attachments: Vec<AttachmentUpload>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub reply: String,
    pub provider: String,
    pub model: String,
    pub persona: String,
    /// The user turn as it should be recorded in the conversation
    /// (message plus attachment context).
    pub user_message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AttachmentSummary>,
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("unknown provider: '{0}'")]
    UnknownProvider(String),

    #[error("{0}")]
    UnknownModel(String),

    #[error("{0}")]
    UnknownPersona(String),

    #[error(transparent)]
    Attachment(#[from] AttachmentError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Everything a chat call needs, shared between requests.
#[derive(Clone)]
pub struct ChatContext {
    pub config: Arc<Config>,
    pub providers: Arc<ProviderCatalog>,
    pub personas: Arc<PersonaRegistry>,
    pub client: reqwest::Client,
}

impl ChatContext {
    pub fn new(config: Arc<Config>) -> anyhow::Result<Self> {
        let client =
            provider::build_client(&config.chat).context("Failed to build HTTP client")?;
        Ok(Self {
            providers: Arc::new(ProviderCatalog::from_config(&config)),
            personas: Arc::new(PersonaRegistry::from_config(&config)),
            config,
            client,
        })
    }
}

/// Run one chat turn.
pub async fn complete_chat(ctx: &ChatContext, request: ChatRequest) -> Result<ChatReply, ChatError> {
    let chat_config = &ctx.config.chat;

    if request.message.trim().is_empty() && request.attachments.is_empty() {
        return Err(ChatError::InvalidRequest(
            "message must not be empty".to_string(),
        ));
    }

    let provider_name = non_blank(request.provider.as_deref())
        .unwrap_or(chat_config.default_provider.as_str())
        .to_string();
    let provider = ctx
        .providers
        .get(&provider_name)
        .ok_or_else(|| ChatError::UnknownProvider(provider_name.clone()))?;

    let persona_name = non_blank(request.persona.as_deref())
        .unwrap_or(chat_config.default_persona.as_str())
        .to_string();
    let system_prompt = ctx
        .personas
        .system_prompt(&persona_name)
        .map_err(ChatError::UnknownPersona)?
        .to_string();

    let model = provider
        .resolve_model(request.model.as_deref())
        .map_err(ChatError::UnknownModel)?;

    let attachments =
        attachments::decode_uploads_blocking(request.attachments, ctx.config.attachments.clone())
            .await?;
    let user_message = attachments::render_context(&request.message, &attachments);

    let history = trim_history(request.history, chat_config.max_history_messages);

    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system_prompt));
    messages.extend(history);
    messages.push(ChatMessage::user(user_message.clone()));

    tracing::info!(
        provider = %provider.name,
        model = %model,
        persona = %persona_name,
        turns = messages.len(),
        attachments = attachments.len(),
        "sending chat request"
    );

    let reply =
        provider::send_chat(&ctx.client, provider, &model, &messages, chat_config).await?;

    Ok(ChatReply {
        reply,
        provider: provider.name.clone(),
        model,
        persona: persona_name,
        user_message,
        attachments: attachments.iter().map(AttachmentSummary::from).collect(),
    })
}

/// Rewind a conversation so its last user turn can be sent again.
///
/// Trailing assistant (and system) messages are dropped, then the last user
/// message is popped and returned alongside the remaining history.
pub fn prepare_retry(
    mut history: Vec<ChatMessage>,
) -> Result<(Vec<ChatMessage>, String), ChatError> {
    while matches!(history.last(), Some(m) if m.role != Role::User) {
        history.pop();
    }
    match history.pop() {
        Some(last) => Ok((history, last.content)),
        None => Err(ChatError::InvalidRequest(
            "nothing to retry: history has no user message".to_string(),
        )),
    }
}

/// Client-supplied system messages are discarded (the persona owns the
/// system prompt) and only the most recent `max` turns are kept. The kept
/// window always opens on a user turn; Anthropic rejects anything else.
fn trim_history(history: Vec<ChatMessage>, max: usize) -> Vec<ChatMessage> {
    let mut turns: Vec<ChatMessage> = history
        .into_iter()
        .filter(|m| m.role != Role::System)
        .collect();
    if turns.len() > max {
        turns.drain(..turns.len() - max);
    }
    let first_user = turns
        .iter()
        .position(|m| m.role == Role::User)
        .unwrap_or(turns.len());
    turns.drain(..first_user);
    turns
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Options for the `chatdesk ask` command.
#[derive(Debug, Default)]
pub struct AskOptions {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub persona: Option<String>,
    pub attach: Vec<PathBuf>,
    pub save: bool,
}

/// One-shot chat from the command line. Prints the reply to stdout.
pub async fn run_ask(config: &Config, message: &str, options: AskOptions) -> anyhow::Result<()> {
    let ctx = ChatContext::new(Arc::new(config.clone()))?;

    let mut uploads = Vec::with_capacity(options.attach.len());
    for path in &options.attach {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read attachment: {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        uploads.push(AttachmentUpload {
            filename,
            content_type: None,
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        });
    }

    let request = ChatRequest {
        provider: options.provider,
        model: options.model,
        persona: options.persona,
        message: message.to_string(),
        history: Vec::new(),
        attachments: uploads,
    };

    let reply = complete_chat(&ctx, request).await?;
    println!("{}", reply.reply);

    if options.save {
        let store = TranscriptStore::new(&config.storage.transcripts_dir);
        let saved = store.save(NewTranscript {
            id: None,
            title: None,
            provider: reply.provider.clone(),
            model: reply.model.clone(),
            persona: reply.persona.clone(),
            messages: vec![
                ChatMessage::user(reply.user_message.clone()),
                ChatMessage::assistant(reply.reply.clone()),
            ],
        })?;
        eprintln!("Saved transcript {}", saved.id);
    }

    Ok(())
}
