//! Parley CLI: the main entry point.
//!
//! Commands:
//! - `serve`    Start the HTTP gateway
//! - `chat`     Send one message through the orchestrator
//! - `history`  List, show, or delete conversations
//! - `models`   Show the registered (provider, model) backends
//! - `init`     Write a default config file

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use parley_config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "parley",
    about = "Parley: chat with OpenAI and Ollama models, grounded in your documents",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.parley/config.toml)
    #[arg(short, long, global = true, env = "PARLEY_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Send a single message
    Chat {
        /// The message text
        #[arg(short, long)]
        message: String,

        /// Backend provider (openai, ollama)
        #[arg(long)]
        provider: Option<String>,

        /// Model name registered for the provider
        #[arg(long)]
        model: Option<String>,

        /// Conversation id; a new one is generated when omitted
        #[arg(long)]
        conversation: Option<String>,

        /// Id of a configured system prompt
        #[arg(long)]
        system_prompt: Option<String>,

        /// Wait for the full answer instead of streaming it
        #[arg(long)]
        no_stream: bool,

        /// Attach an image (repeatable)
        #[arg(long)]
        image: Vec<PathBuf>,
    },

    /// Manage stored conversations
    History {
        #[command(subcommand)]
        action: commands::history::HistoryAction,
    },

    /// List registered model backends
    Models,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => AppConfig::load().context("Failed to load config"),
    }
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // `init` must work even when the existing file does not parse.
    if let Commands::Init { force } = cli.command {
        init_tracing(cli.verbose, false);
        return commands::init::run(cli.config.as_deref(), force);
    }

    let config = load_config(cli.config.as_ref())?;
    init_tracing(cli.verbose, config.logging.format == "json");

    match cli.command {
        Commands::Serve { port } => commands::serve::run(config, port).await?,
        Commands::Chat {
            message,
            provider,
            model,
            conversation,
            system_prompt,
            no_stream,
            image,
        } => {
            let args = commands::chat::ChatArgs {
                message,
                provider,
                model,
                conversation,
                system_prompt,
                stream: !no_stream,
                images: image,
            };
            commands::chat::run(config, args).await?
        }
        Commands::History { action } => commands::history::run(config, action).await?,
        Commands::Models => commands::models::run(&config),
        Commands::Init { .. } => {}
    }

    Ok(())
}
