//! Uploaded files attached to a chat message.
//!
//! The browser sends each file as base64 inside the JSON request. Files are
//! decoded, checked against the configured limits, converted to text, and
//! appended to the user's message as fenced blocks.

use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AttachmentsConfig;
use crate::extract::{self, ExtractError, MIME_OCTET_STREAM};

/// A file as received from the client.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentUpload {
    pub filename: String,
    #[serde(default)]
    pub content_type: Option<String>,
    /// Standard base64 of the raw file bytes.
    pub data: String,
}

/// A file after text extraction.
#[derive(Debug, Clone, Serialize)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub text: String,
    /// Set when `text` was cut to `attachments.max_chars`.
    pub truncated: bool,
}

/// What the client gets back about each attachment.
#[derive(Debug, Clone, Serialize)]
pub struct AttachmentSummary {
    pub filename: String,
    pub content_type: String,
    pub chars: usize,
    pub truncated: bool,
}

impl From<&Attachment> for AttachmentSummary {
    fn from(a: &Attachment) -> Self {
        Self {
            filename: a.filename.clone(),
            content_type: a.content_type.clone(),
            chars: a.text.chars().count(),
            truncated: a.truncated,
        }
    }
}

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("too many attachments: {count} (max {max})")]
    TooMany { count: usize, max: usize },

    #[error("attachment filename must not be empty")]
    MissingFilename,

    #[error("{filename}: invalid base64 data: {message}")]
    InvalidEncoding { filename: String, message: String },

    #[error("{filename}: {size} bytes exceeds the {max} byte limit")]
    TooLarge {
        filename: String,
        size: usize,
        max: usize,
    },

    #[error("{filename}: {source}")]
    Extract {
        filename: String,
        #[source]
        source: ExtractError,
    },

    #[error("attachment extraction task failed: {0}")]
    Worker(String),
}

/// Decode and extract a batch of uploads.
pub fn decode_uploads(
    uploads: &[AttachmentUpload],
    config: &AttachmentsConfig,
) -> Result<Vec<Attachment>, AttachmentError> {
    if uploads.len() > config.max_files {
        return Err(AttachmentError::TooMany {
            count: uploads.len(),
            max: config.max_files,
        });
    }

    uploads
        .iter()
        .map(|upload| decode_upload(upload, config))
        .collect()
}

/// [`decode_uploads`] on tokio's blocking pool. PDF and OOXML extraction
/// is CPU-bound, and a panic inside `pdf-extract` surfaces as
/// [`AttachmentError::Worker`] instead of tearing down the request task.
pub async fn decode_uploads_blocking(
    uploads: Vec<AttachmentUpload>,
    config: AttachmentsConfig,
) -> Result<Vec<Attachment>, AttachmentError> {
    if uploads.is_empty() {
        return Ok(Vec::new());
    }
    tokio::task::spawn_blocking(move || decode_uploads(&uploads, &config))
        .await
        .map_err(|e| AttachmentError::Worker(e.to_string()))?
}

fn decode_upload(
    upload: &AttachmentUpload,
    config: &AttachmentsConfig,
) -> Result<Attachment, AttachmentError> {
    let filename = sanitize_filename(&upload.filename);
    if filename.is_empty() {
        return Err(AttachmentError::MissingFilename);
    }

    // Reject on encoded length first so oversized payloads are never decoded.
    let encoded = upload.data.trim();
    let decoded_upper_bound = encoded.len() / 4 * 3;
    if decoded_upper_bound > config.max_bytes + 2 {
        return Err(AttachmentError::TooLarge {
            filename,
            size: decoded_upper_bound,
            max: config.max_bytes,
        });
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| AttachmentError::InvalidEncoding {
            filename: filename.clone(),
            message: e.to_string(),
        })?;

    if bytes.len() > config.max_bytes {
        return Err(AttachmentError::TooLarge {
            filename,
            size: bytes.len(),
            max: config.max_bytes,
        });
    }

    let content_type = resolve_content_type(upload.content_type.as_deref(), &filename);

    let text = extract::extract_text(&bytes, &content_type).map_err(|source| {
        AttachmentError::Extract {
            filename: filename.clone(),
            source,
        }
    })?;

    let (text, truncated) = truncate_chars(text.trim(), config.max_chars);

    tracing::debug!(
        filename = %filename,
        content_type = %content_type,
        bytes = bytes.len(),
        truncated,
        "attachment extracted"
    );

    Ok(Attachment {
        filename,
        content_type,
        text,
        truncated,
    })
}

/// The declared type wins when it can be extracted. Otherwise the filename
/// decides, since browsers label e.g. `.ts` as `video/mp2t` and `.csv` as
/// `application/vnd.ms-excel`. If neither helps, the declared type is kept
/// so the rejection names what the client sent.
fn resolve_content_type(declared: Option<&str>, filename: &str) -> String {
    let declared = declared
        .map(str::trim)
        .filter(|ct| !ct.is_empty() && *ct != MIME_OCTET_STREAM)
        .map(str::to_ascii_lowercase);

    match declared {
        Some(ct) if extract::is_supported(&ct) => ct,
        declared => {
            let guessed = extract::guess_content_type(filename);
            match declared {
                Some(ct) if guessed == MIME_OCTET_STREAM => ct,
                _ => guessed.to_string(),
            }
        }
    }
}

/// Keep only the final path component and drop control characters.
fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    base.chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

fn truncate_chars(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => (text[..idx].to_string(), true),
        None => (text.to_string(), false),
    }
}

/// Build the user turn sent to the provider: the typed message followed by
/// one fenced block per attachment.
pub fn render_context(message: &str, attachments: &[Attachment]) -> String {
    if attachments.is_empty() {
        return message.to_string();
    }

    let mut out = String::from(message.trim_end());
    if !out.is_empty() {
        out.push_str("\n\n");
    }

    for (i, attachment) in attachments.iter().enumerate() {
        if i > 0 {
            out.push_str("\n\n");
        }
        let fence = fence_for(&attachment.text);
        out.push_str(&format!("Attached file: {}\n", attachment.filename));
        out.push_str(&fence);
        out.push('\n');
        out.push_str(&attachment.text);
        out.push('\n');
        out.push_str(&fence);
        if attachment.truncated {
            out.push_str("\n(file truncated)");
        }
    }

    out
}

/// A backtick fence longer than any run of backticks inside `text`.
fn fence_for(text: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for c in text.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    "`".repeat(longest.max(2) + 1)
}
