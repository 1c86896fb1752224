//! Saved conversations on disk.
//!
//! Each transcript is one pretty-printed JSON file named `<uuid>.json` in
//! `storage.transcripts_dir`. Writes go to a temporary file that is then
//! renamed over the target, so readers never observe a partial file.

use chrono::Utc;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;
use crate::models::{ChatMessage, Role, Transcript, TranscriptSummary};

const UNTITLED: &str = "Untitled conversation";
const MAX_TITLE_CHARS: usize = 60;

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("transcript not found: {0}")]
    NotFound(String),

    #[error("invalid transcript id: '{0}'")]
    InvalidId(String),

    #[error("transcript has no messages")]
    Empty,

    #[error("transcript storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transcript is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Save request. `id: None` creates a new transcript; an existing id
/// updates it in place.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTranscript {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub persona: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone)]
pub struct TranscriptStore {
    dir: PathBuf,
}

impl TranscriptStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save(&self, input: NewTranscript) -> Result<Transcript, TranscriptError> {
        if input.messages.is_empty() {
            return Err(TranscriptError::Empty);
        }

        let now = Utc::now();
        let (id, created_at) = match input.id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(id) => {
                let id = canonical_id(id)?;
                let created_at = match self.load(&id) {
                    Ok(existing) => existing.created_at,
                    Err(TranscriptError::NotFound(_)) => now,
                    Err(e) => return Err(e),
                };
                (id, created_at)
            }
            None => (Uuid::new_v4().to_string(), now),
        };

        let title = input
            .title
            .as_deref()
            .map(collapse_whitespace)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| default_title(&input.messages));

        let transcript = Transcript {
            id,
            title,
            provider: input.provider,
            model: input.model,
            persona: input.persona,
            messages: input.messages,
            created_at,
            updated_at: now,
        };

        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&transcript.id);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&transcript)?)?;
        std::fs::rename(&tmp, &path)?;

        tracing::info!(id = %transcript.id, messages = transcript.messages.len(), "transcript saved");
        Ok(transcript)
    }

    pub fn load(&self, id: &str) -> Result<Transcript, TranscriptError> {
        let id = canonical_id(id)?;
        let path = self.path_for(&id);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TranscriptError::NotFound(id))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn delete(&self, id: &str) -> Result<(), TranscriptError> {
        let id = canonical_id(id)?;
        match std::fs::remove_file(self.path_for(&id)) {
            Ok(()) => {
                tracing::info!(id = %id, "transcript deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(TranscriptError::NotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    /// All saved transcripts, most recently updated first. Files that fail
    /// to parse are skipped.
    pub fn list(&self) -> Result<Vec<TranscriptSummary>, TranscriptError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut summaries = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_transcript = path.extension().is_some_and(|ext| ext == "json")
                && path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(|s| canonical_id(s).is_ok());
            if !is_transcript {
                continue;
            }

            let parsed = std::fs::read(&path)
                .map_err(TranscriptError::from)
                .and_then(|bytes| Ok(serde_json::from_slice::<Transcript>(&bytes)?));
            match parsed {
                Ok(t) => summaries.push(TranscriptSummary::from(&t)),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable transcript")
                }
            }
        }

        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

/// Only canonical hyphenated UUIDs are accepted as ids, so an id can never
/// name a path outside the store.
fn canonical_id(id: &str) -> Result<String, TranscriptError> {
    let parsed = Uuid::parse_str(id).map_err(|_| TranscriptError::InvalidId(id.to_string()))?;
    let canonical = parsed.hyphenated().to_string();
    if canonical != id.to_ascii_lowercase() {
        return Err(TranscriptError::InvalidId(id.to_string()));
    }
    Ok(canonical)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First user message, whitespace-collapsed and cut to 60 characters.
fn default_title(messages: &[ChatMessage]) -> String {
    let first = messages
        .iter()
        .find(|m| m.role == Role::User)
        .map(|m| collapse_whitespace(&m.content))
        .unwrap_or_default();

    if first.is_empty() {
        return UNTITLED.to_string();
    }
    if first.chars().count() > MAX_TITLE_CHARS {
        let cut: String = first.chars().take(MAX_TITLE_CHARS).collect();
        format!("{}…", cut.trim_end())
    } else {
        first
    }
}

/// `chatdesk transcripts list`
pub fn run_list(config: &Config) -> anyhow::Result<()> {
    let store = TranscriptStore::new(&config.storage.transcripts_dir);
    let summaries = store.list()?;

    if summaries.is_empty() {
        println!("No saved transcripts in {}", store.dir().display());
        return Ok(());
    }

    println!(
        "{:<36}  {:<16}  {:<10}  {:>4}  TITLE",
        "ID", "UPDATED", "PROVIDER", "MSGS"
    );
    for s in summaries {
        println!(
            "{:<36}  {:<16}  {:<10}  {:>4}  {}",
            s.id,
            s.updated_at.format("%Y-%m-%d %H:%M"),
            s.provider,
            s.message_count,
            s.title
        );
    }
    Ok(())
}

/// `chatdesk transcripts show <id>`
pub fn run_show(config: &Config, id: &str) -> anyhow::Result<()> {
    let store = TranscriptStore::new(&config.storage.transcripts_dir);
    let transcript = store.load(id)?;
    print!(
        "{}",
        crate::export::render(&transcript, crate::export::ExportFormat::Text)?
    );
    Ok(())
}

/// `chatdesk transcripts delete <id>`
pub fn run_delete(config: &Config, id: &str) -> anyhow::Result<()> {
    let store = TranscriptStore::new(&config.storage.transcripts_dir);
    store.delete(id)?;
    println!("Deleted transcript {}", id);
    Ok(())
}
