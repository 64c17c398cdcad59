//! livefeed-chat - terminal client for a shared, live chat feed
//!
//! Everyone sees the same feed; signed-in users can post and delete their own
//! messages.

mod auth;
mod chat;
mod commands;
mod config;
mod context;
mod models;
mod store;
mod tui;

#[cfg(test)]
mod testing;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{BackendKind, Config};
use crate::context::ChatContext;

#[derive(Parser)]
#[command(name = "livefeed-chat")]
#[command(about = "Terminal client for a live, shared chat feed", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Override the backend from config.toml
    #[arg(short, long, global = true, value_enum)]
    backend: Option<BackendKind>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with Google
    Login {
        /// Sign in again even if a session is stored
        #[arg(short, long)]
        force: bool,
    },

    /// Sign out and forget the stored session
    Logout,

    /// Show backend and session status
    Status,

    /// Show the signed-in profile
    Whoami,

    /// Print the current feed
    Read {
        /// Newest messages to show (default: feed.limit from config)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Print the feed and follow new messages until Ctrl+C
    Watch {
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Post a message
    Send {
        /// Message text
        message: String,
    },

    /// Delete one of your own messages
    Delete {
        /// Message id (shown by `read` next to your messages)
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Launch the terminal user interface (default)
    Tui,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Tui);
    let is_tui = matches!(command, Commands::Tui);

    // Initialize logging. In TUI mode lines go to the debug pane instead of
    // stderr.
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());
    let log_buffer = tui::LogBuffer::new();
    if is_tui {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(log_buffer.clone()),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    let config = Config::load()?;
    let backend = cli.backend.unwrap_or(config.backend);

    let connect = || ChatContext::connect(&config, backend, auth::stdout_prompt());

    match command {
        Commands::Login { force } => commands::login(&connect()?, force).await?,
        Commands::Logout => commands::logout(&connect()?).await?,
        Commands::Status => commands::status(&connect()?).await?,
        Commands::Whoami => commands::whoami(&connect()?).await?,
        Commands::Read { limit } => commands::read(&connect()?, limit).await?,
        Commands::Watch { limit } => commands::watch(&connect()?, limit).await?,
        Commands::Send { message } => {
            tracing::info!("Sending message...");
            commands::send(&connect()?, &message).await?;
        }
        Commands::Delete { id, yes } => commands::delete(&connect()?, &id, yes).await?,
        Commands::Tui => {
            let (prompt, prompts) = tui::prompt_channel();
            let ctx = ChatContext::connect(&config, backend, prompt)?;
            tui::run(ctx, log_buffer, prompts).await?;
        }
    }

    Ok(())
}
