//! # chatdesk CLI
//!
//! The `chatdesk` binary starts the web app and exposes the same chat,
//! catalog, and transcript operations from the terminal.
//!
//! ## Usage
//!
//! ```bash
//! chatdesk --config ./config/chatdesk.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `chatdesk serve` | Start the web app (default `0.0.0.0:5000`) |
//! | `chatdesk providers` | List providers, models, and API key status |
//! | `chatdesk personas` | List personas |
//! | `chatdesk ask "<message>"` | Send one message and print the reply |
//! | `chatdesk transcripts list` | List saved transcripts |
//! | `chatdesk transcripts show <id>` | Print a transcript |
//! | `chatdesk transcripts export <id>` | Export as markdown, text, or json |
//! | `chatdesk transcripts delete <id>` | Delete a transcript |
//!
//! ## Examples
//!
//! ```bash
//! # Serve on a different port
//! chatdesk serve --bind 127.0.0.1:8080
//!
//! # Ask Anthropic about a local file
//! chatdesk ask "Summarize this" --provider anthropic --attach report.pdf
//!
//! # Export a transcript to a file
//! chatdesk transcripts export 3f2b8c1e-... --format text --output chat.txt
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use chatdesk::chat::{self, AskOptions};
use chatdesk::export::{self, ExportFormat};
use chatdesk::{config, logging, persona, provider, server, transcript};

/// chatdesk: chat with hosted AI providers from a browser or the terminal.
///
/// Configuration is read from `--config`, or from `./config/chatdesk.toml`
/// when present. Without a config file, built-in defaults are used and API
/// keys come from the providers' environment variables.
#[derive(Parser)]
#[command(
    name = "chatdesk",
    about = "chatdesk: chat with hosted AI providers from a browser or the terminal",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web app.
    Serve {
        /// Address to listen on. Overrides `[server].bind`.
        #[arg(long)]
        bind: Option<String>,
    },

    /// List providers, their models, and whether an API key is set.
    Providers,

    /// List the available personas.
    Personas,

    /// Send a single message and print the reply.
    Ask {
        /// The message to send.
        message: String,

        /// Provider name (defaults to `chat.default_provider`).
        #[arg(long)]
        provider: Option<String>,

        /// Model name (defaults to the provider's default model).
        #[arg(long)]
        model: Option<String>,

        /// Persona name (defaults to `chat.default_persona`).
        #[arg(long)]
        persona: Option<String>,

        /// Attach a file. May be repeated.
        #[arg(long = "attach", value_name = "FILE")]
        attach: Vec<PathBuf>,

        /// Save the exchange as a transcript.
        #[arg(long)]
        save: bool,
    },

    /// Manage saved transcripts.
    Transcripts {
        #[command(subcommand)]
        action: TranscriptAction,
    },
}

#[derive(Subcommand)]
enum TranscriptAction {
    /// List saved transcripts, newest first.
    List,

    /// Print a transcript as plain text.
    Show {
        /// Transcript UUID.
        id: String,
    },

    /// Export a transcript.
    Export {
        /// Transcript UUID.
        id: String,

        /// Output format: `markdown`, `text`, or `json`.
        #[arg(long, default_value = "markdown")]
        format: String,

        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Delete a transcript.
    Delete {
        /// Transcript UUID.
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::resolve_config(cli.config.as_deref())?;
    logging::init_tracing(&cfg.logging);

    match cli.command {
        Commands::Serve { bind } => {
            server::run_server(&cfg, bind.as_deref()).await?;
        }
        Commands::Providers => {
            provider::list_providers(&cfg);
        }
        Commands::Personas => {
            persona::list_personas(&cfg);
        }
        Commands::Ask {
            message,
            provider,
            model,
            persona,
            attach,
            save,
        } => {
            let options = AskOptions {
                provider,
                model,
                persona,
                attach,
                save,
            };
            chat::run_ask(&cfg, &message, options).await?;
        }
        Commands::Transcripts { action } => match action {
            TranscriptAction::List => {
                transcript::run_list(&cfg)?;
            }
            TranscriptAction::Show { id } => {
                transcript::run_show(&cfg, &id)?;
            }
            TranscriptAction::Export { id, format, output } => {
                let format: ExportFormat = format.parse().map_err(anyhow::Error::msg)?;
                export::run_export(&cfg, &id, format, output.as_deref())?;
            }
            TranscriptAction::Delete { id } => {
                transcript::run_delete(&cfg, &id)?;
            }
        },
    }

    Ok(())
}
