//! HTTP server: the chat page, its static assets, and the JSON API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Chat page with provider/persona selectors |
//! | `GET`  | `/static/app.js`, `/static/style.css` | Client assets |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/api/providers` | Providers, models, key status |
//! | `GET`  | `/api/personas` | Available personas |
//! | `POST` | `/api/attachments` | Extract text from uploads (preview) |
//! | `POST` | `/api/chat` | Send one chat turn |
//! | `POST` | `/api/chat/retry` | Re-send the last user turn |
//! | `GET`  | `/api/transcripts` | List saved transcripts |
//! | `POST` | `/api/transcripts` | Save or update a transcript |
//! | `GET`  | `/api/transcripts/{id}` | Load a transcript |
//! | `DELETE` | `/api/transcripts/{id}` | Delete a transcript |
//! | `GET`  | `/api/transcripts/{id}/export?format=` | Download as markdown/text/json |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "message must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `payload_too_large` (413),
//! `missing_api_key` (503), `upstream_error` (502), `timeout` (504), `internal` (500).

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::attachments::{self, AttachmentError, AttachmentUpload};
use crate::chat::{self, ChatContext, ChatError, ChatReply, ChatRequest};
use crate::config::Config;
use crate::export::{self, ExportFormat};
use crate::models::{Transcript, TranscriptSummary};
use crate::persona::PersonaInfo;
use crate::provider::{ProviderError, ProviderInfo};
use crate::transcript::{NewTranscript, TranscriptError, TranscriptStore};

const INDEX_TEMPLATE: &str = include_str!("../static/index.html");
const APP_JS: &str = include_str!("../static/app.js");
const STYLE_CSS: &str = include_str!("../static/style.css");

/// Characters of extracted text echoed back by `/api/attachments`.
const PREVIEW_CHARS: usize = 200;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub chat: ChatContext,
    pub transcripts: TranscriptStore,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let transcripts = TranscriptStore::new(&config.storage.transcripts_dir);
        let chat = ChatContext::new(Arc::new(config))?;
        Ok(Self { chat, transcripts })
    }

    fn config(&self) -> &Config {
        &self.chat.config
    }
}

/// Build the router with all routes and layers.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config().attachments.body_limit();

    Router::new()
        .route("/", get(handle_index))
        .route("/static/app.js", get(handle_app_js))
        .route("/static/style.css", get(handle_style_css))
        .route("/health", get(handle_health))
        .route("/api/providers", get(handle_providers))
        .route("/api/personas", get(handle_personas))
        .route("/api/attachments", post(handle_attachments))
        .route("/api/chat", post(handle_chat))
        .route("/api/chat/retry", post(handle_chat_retry))
        .route(
            "/api/transcripts",
            get(handle_list_transcripts).post(handle_save_transcript),
        )
        .route(
            "/api/transcripts/{id}",
            get(handle_get_transcript).delete(handle_delete_transcript),
        )
        .route("/api/transcripts/{id}/export", get(handle_export_transcript))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the server and run until Ctrl+C.
///
/// `bind` overrides `[server].bind` when given.
pub async fn run_server(config: &Config, bind: Option<&str>) -> anyhow::Result<()> {
    let bind_addr = bind.unwrap_or(config.server.bind.as_str()).to_string();
    let state = AppState::new(config.clone())?;

    let configured: Vec<String> = state
        .chat
        .providers
        .list()
        .into_iter()
        .filter(|p| p.configured)
        .map(|p| p.name)
        .collect();
    if configured.is_empty() {
        tracing::warn!("no provider has an API key; chat requests will fail until one is set");
    } else {
        tracing::info!(providers = ?configured, "providers with API keys");
    }

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("chatdesk listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &str {
        self.code
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = self.code, message = %self.message, "request failed");
        } else {
            tracing::debug!(code = self.code, message = %self.message, "request rejected");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        let status = rejection.status();
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            Self::new(status, "payload_too_large", rejection.body_text())
        } else {
            Self::bad_request(rejection.body_text())
        }
    }
}

impl From<AttachmentError> for AppError {
    fn from(err: AttachmentError) -> Self {
        match err {
            AttachmentError::TooLarge { .. } => {
                Self::new(StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", err.to_string())
            }
            AttachmentError::Worker(_) => Self::internal(err.to_string()),
            _ => Self::bad_request(err.to_string()),
        }
    }
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::InvalidRequest(_)
            | ChatError::UnknownProvider(_)
            | ChatError::UnknownModel(_)
            | ChatError::UnknownPersona(_) => Self::bad_request(err.to_string()),
            ChatError::Attachment(e) => e.into(),
            ChatError::Provider(e) => {
                let (status, code) = match &e {
                    ProviderError::MissingApiKey { .. } => {
                        (StatusCode::SERVICE_UNAVAILABLE, "missing_api_key")
                    }
                    ProviderError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
                    ProviderError::Upstream { .. }
                    | ProviderError::Transport { .. }
                    | ProviderError::InvalidResponse { .. }
                    | ProviderError::EmptyReply { .. } => {
                        (StatusCode::BAD_GATEWAY, "upstream_error")
                    }
                };
                Self::new(status, code, e.to_string())
            }
        }
    }
}

impl From<TranscriptError> for AppError {
    fn from(err: TranscriptError) -> Self {
        match err {
            TranscriptError::NotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, "not_found", err.to_string())
            }
            TranscriptError::InvalidId(_) | TranscriptError::Empty => {
                Self::bad_request(err.to_string())
            }
            TranscriptError::Io(_) | TranscriptError::Json(_) => Self::internal(err.to_string()),
        }
    }
}

// ============ Page and assets ============

async fn handle_index(State(state): State<AppState>) -> Html<String> {
    Html(render_page(&state))
}

async fn handle_app_js() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        APP_JS,
    )
}

async fn handle_style_css() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css; charset=utf-8")], STYLE_CSS)
}

/// Fill the page template. Every substituted value is HTML-escaped.
fn render_page(state: &AppState) -> String {
    let config = state.config();
    let default_provider = &config.chat.default_provider;
    let default_persona = &config.chat.default_persona;

    let provider_options: String = state
        .chat
        .providers
        .list()
        .iter()
        .map(|p| {
            let label = if p.configured {
                escape_html(&p.label)
            } else {
                format!("{} (no API key)", escape_html(&p.label))
            };
            format!(
                r#"<option value="{}"{}>{}</option>"#,
                escape_html(&p.name),
                if &p.name == default_provider { " selected" } else { "" },
                label
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let persona_options: String = state
        .chat
        .personas
        .list()
        .iter()
        .map(|p| {
            format!(
                r#"<option value="{}" title="{}"{}>{}</option>"#,
                escape_html(&p.name),
                escape_html(&p.description),
                if &p.name == default_persona { " selected" } else { "" },
                escape_html(&p.name)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    INDEX_TEMPLATE
        .replace("{{title}}", &escape_html(&config.server.title))
        .replace("{{version}}", env!("CARGO_PKG_VERSION"))
        .replace("{{default_provider}}", &escape_html(default_provider))
        .replace("{{max_files}}", &config.attachments.max_files.to_string())
        .replace("{{provider_options}}", &provider_options)
        .replace("{{persona_options}}", &persona_options)
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Catalogs ============

async fn handle_providers(State(state): State<AppState>) -> Json<Vec<ProviderInfo>> {
    Json(state.chat.providers.list())
}

async fn handle_personas(State(state): State<AppState>) -> Json<Vec<PersonaInfo>> {
    Json(state.chat.personas.list())
}

// ============ POST /api/attachments ============

#[derive(Deserialize)]
struct AttachmentsRequest {
    attachments: Vec<AttachmentUpload>,
}

#[derive(Serialize)]
struct AttachmentPreview {
    filename: String,
    content_type: String,
    chars: usize,
    truncated: bool,
    preview: String,
}

#[derive(Serialize)]
struct AttachmentsResponse {
    attachments: Vec<AttachmentPreview>,
}

async fn handle_attachments(
    State(state): State<AppState>,
    payload: Result<Json<AttachmentsRequest>, JsonRejection>,
) -> Result<Json<AttachmentsResponse>, AppError> {
    let Json(request) = payload?;
    let decoded = attachments::decode_uploads_blocking(
        request.attachments,
        state.config().attachments.clone(),
    )
    .await?;

    let attachments = decoded
        .into_iter()
        .map(|a| AttachmentPreview {
            chars: a.text.chars().count(),
            preview: a.text.chars().take(PREVIEW_CHARS).collect(),
            filename: a.filename,
            content_type: a.content_type,
            truncated: a.truncated,
        })
        .collect();

    Ok(Json(AttachmentsResponse { attachments }))
}

// ============ POST /api/chat ============

async fn handle_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, AppError> {
    let Json(request) = payload?;
    let reply = chat::complete_chat(&state.chat, request).await?;
    Ok(Json(reply))
}

/// The request carries the full history including the turn to retry; any
/// `message` in the body is ignored. `attachments` are applied to the
/// re-sent turn, so clients send them only when that turn failed before
/// its attachment context was recorded.
async fn handle_chat_retry(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, AppError> {
    let Json(mut request) = payload?;
    let (history, message) = chat::prepare_retry(std::mem::take(&mut request.history))?;
    request.history = history;
    request.message = message;

    let reply = chat::complete_chat(&state.chat, request).await?;
    Ok(Json(reply))
}

// ============ Transcripts ============

async fn handle_list_transcripts(
    State(state): State<AppState>,
) -> Result<Json<Vec<TranscriptSummary>>, AppError> {
    Ok(Json(state.transcripts.list()?))
}

async fn handle_save_transcript(
    State(state): State<AppState>,
    payload: Result<Json<NewTranscript>, JsonRejection>,
) -> Result<(StatusCode, Json<Transcript>), AppError> {
    let Json(input) = payload?;
    let is_update = input.id.as_deref().is_some_and(|id| !id.trim().is_empty());
    let transcript = state.transcripts.save(input)?;
    let status = if is_update {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(transcript)))
}

async fn handle_get_transcript(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Transcript>, AppError> {
    Ok(Json(state.transcripts.load(&id)?))
}

async fn handle_delete_transcript(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.transcripts.delete(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct ExportParams {
    #[serde(default)]
    format: Option<String>,
}

async fn handle_export_transcript(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ExportParams>,
) -> Result<Response, AppError> {
    let format = match params.format.as_deref() {
        Some(f) => f.parse::<ExportFormat>().map_err(AppError::bad_request)?,
        None => ExportFormat::default(),
    };

    let transcript = state.transcripts.load(&id)?;
    let body = export::render(&transcript, format).map_err(|e| AppError::internal(e.to_string()))?;
    let filename = export::export_filename(&transcript, format);

    Ok((
        [
            (header::CONTENT_TYPE, format.mime_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response())
}
