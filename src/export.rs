//! Export a saved transcript as Markdown, plain text, or JSON.
//!
//! Used by the `GET /api/transcripts/{id}/export` download and by
//! `chatdesk transcripts export`, which writes to a file or to stdout for
//! piping.

use anyhow::Result;
use std::fmt::Write as _;
use std::path::Path;
use std::str::FromStr;

use crate::config::Config;
use crate::models::Transcript;
use crate::transcript::TranscriptStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Markdown,
    Text,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Markdown => "md",
            ExportFormat::Text => "txt",
            ExportFormat::Json => "json",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Markdown => "text/markdown; charset=utf-8",
            ExportFormat::Text => "text/plain; charset=utf-8",
            ExportFormat::Json => "application/json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            "text" | "txt" => Ok(ExportFormat::Text),
            "json" => Ok(ExportFormat::Json),
            other => Err(format!(
                "unknown export format '{}': must be markdown, text, or json",
                other
            )),
        }
    }
}

/// Render a transcript in the requested format.
pub fn render(transcript: &Transcript, format: ExportFormat) -> Result<String> {
    let out = match format {
        ExportFormat::Markdown => render_markdown(transcript),
        ExportFormat::Text => render_text(transcript),
        ExportFormat::Json => {
            let mut json = serde_json::to_string_pretty(transcript)?;
            json.push('\n');
            json
        }
    };
    Ok(out)
}

fn render_markdown(t: &Transcript) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}", t.title);
    out.push('\n');
    let _ = writeln!(out, "- **Provider:** {}", t.provider);
    let _ = writeln!(out, "- **Model:** {}", t.model);
    let _ = writeln!(out, "- **Persona:** {}", t.persona);
    let _ = writeln!(out, "- **Created:** {}", t.created_at.to_rfc3339());
    let _ = writeln!(out, "- **Updated:** {}", t.updated_at.to_rfc3339());

    for message in &t.messages {
        out.push('\n');
        let _ = writeln!(out, "## {}", message.role.label());
        out.push('\n');
        out.push_str(message.content.trim_end());
        out.push('\n');
    }
    out
}

fn render_text(t: &Transcript) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", t.title);
    let _ = writeln!(out, "{}", "=".repeat(t.title.chars().count().max(3)));
    let _ = writeln!(out, "Provider: {} ({})", t.provider, t.model);
    let _ = writeln!(out, "Persona:  {}", t.persona);
    let _ = writeln!(out, "Saved:    {}", t.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));

    for message in &t.messages {
        out.push('\n');
        let _ = writeln!(out, "[{}]", message.role.as_str());
        out.push_str(message.content.trim_end());
        out.push('\n');
    }
    out
}

/// Download file name: slugified title, short id, extension.
pub fn export_filename(transcript: &Transcript, format: ExportFormat) -> String {
    let mut slug = String::new();
    for c in transcript.title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
        if slug.len() >= 40 {
            break;
        }
    }
    let slug = slug.trim_end_matches('-');
    let slug = if slug.is_empty() { "conversation" } else { slug };
    let short_id: String = transcript.id.chars().take(8).collect();
    format!("{}-{}.{}", slug, short_id, format.extension())
}

/// `chatdesk transcripts export`
///
/// If `output` is `Some`, writes to that file path. Otherwise writes to
/// stdout.
pub fn run_export(
    config: &Config,
    id: &str,
    format: ExportFormat,
    output: Option<&Path>,
) -> Result<()> {
    let store = TranscriptStore::new(&config.storage.transcripts_dir);
    let transcript = store.load(id)?;
    let rendered = render(&transcript, format)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &rendered)?;
            eprintln!(
                "Exported {} messages to {}",
                transcript.messages.len(),
                path.display()
            );
        }
        None => {
            print!("{}", rendered);
        }
    }

    Ok(())
}
