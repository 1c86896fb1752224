//! # chatdesk
//!
//! A small self-hosted web app for chatting with hosted AI providers.
//!
//! chatdesk serves a single chat page on port 5000. The page lets you pick a
//! provider (OpenAI, Groq, Anthropic, Mistral, xAI), a model, and a persona,
//! attach files whose text is extracted server-side, retry the last turn,
//! and save or export conversations. The same operations are available from
//! the `chatdesk` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐  JSON   ┌──────────┐   ┌────────────┐  HTTPS  ┌───────────┐
//! │ Browser  │───────▶│  server  │──▶│    chat    │───────▶│ providers │
//! │ (app.js) │◀───────│  (axum)  │   │ + personas │◀───────│ OpenAI... │
//! └──────────┘         └────┬─────┘   └─────┬──────┘         └───────────┘
//!                           │               │
//!                           ▼               ▼
//!                     ┌────────────┐  ┌─────────────┐
//!                     │ transcript │  │ attachments │
//!                     │ JSON files │  │  + extract  │
//!                     └────────────┘  └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export OPENAI_API_KEY=sk-...
//! chatdesk serve                      # http://localhost:5000
//! chatdesk ask "Explain borrowing" --provider groq
//! chatdesk transcripts list
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`models`] | Messages and transcripts |
//! | [`provider`] | Provider catalog and chat completion clients |
//! | [`persona`] | System prompt presets |
//! | [`extract`] | Text extraction from PDF and Office files |
//! | [`attachments`] | Upload decoding, limits, and prompt context |
//! | [`chat`] | One chat turn, retry, and `chatdesk ask` |
//! | [`transcript`] | Saved conversations on disk |
//! | [`export`] | Markdown, text, and JSON export |
//! | [`server`] | HTTP server and JSON API |

pub mod attachments;
pub mod chat;
pub mod config;
pub mod export;
pub mod extract;
pub mod logging;
pub mod models;
pub mod persona;
pub mod provider;
pub mod server;
pub mod transcript;
