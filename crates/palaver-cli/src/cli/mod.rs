//! CLI entry and dispatch.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use palaver_core::config;
use palaver_core::store::{SessionStore, StoreOptions};

mod commands;

#[derive(Parser)]
#[command(name = "palaver")]
#[command(version = "0.3")]
#[command(about = "Streaming chat client for the palaver backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override the system prompt from config
    #[arg(long)]
    system_prompt: Option<String>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Send a message to the active session and stream the reply
    Chat {
        /// The message to send (read from stdin when omitted)
        #[arg(value_name = "MESSAGE")]
        message: Option<String>,

        /// Override the session's model for this and later turns
        #[arg(short, long)]
        model: Option<String>,

        /// Target a specific session instead of the active one
        #[arg(short, long, value_name = "SESSION_ID")]
        session: Option<String>,

        /// Enable chain-of-thought prompting for the session
        #[arg(long = "chain-of-thought")]
        chain_of_thought: bool,
    },

    /// Manage saved sessions
    Sessions {
        #[command(subcommand)]
        command: SessionCommands,
    },

    /// List available models from the catalog
    Models,

    /// Attach documents to a session
    Upload {
        /// Files to upload
        #[arg(value_name = "FILE", required = true)]
        files: Vec<std::path::PathBuf>,

        /// Target a specific session instead of the active one
        #[arg(short, long, value_name = "SESSION_ID")]
        session: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum SessionCommands {
    /// Lists saved sessions
    List,
    /// Shows a session transcript
    Show {
        /// The ID of the session to show
        #[arg(value_name = "SESSION_ID")]
        id: String,
    },
    /// Creates a fresh session and makes it active
    New,
    /// Makes a session active
    Use {
        /// The ID of the session to activate
        #[arg(value_name = "SESSION_ID")]
        id: String,
    },
    /// Rename a session
    Rename {
        /// The ID of the session to rename
        #[arg(value_name = "SESSION_ID")]
        id: String,
        /// New title for the session
        #[arg(value_name = "TITLE")]
        title: String,
    },
    /// Deletes a session (the list never goes empty)
    Delete {
        /// The ID of the session to delete
        #[arg(value_name = "SESSION_ID")]
        id: String,
    },
    /// Clears a session's messages
    Clear {
        /// The ID of the session to clear
        #[arg(value_name = "SESSION_ID")]
        id: String,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let mut config = config::Config::load().context("load config")?;

    if let Some(sp) = cli.system_prompt.as_deref() {
        let trimmed = sp.trim();
        config.system_prompt = (!trimmed.is_empty()).then(|| trimmed.to_string());
    }

    // Config commands never need a store (or a state file); everything
    // else opens one against the persisted session list.
    let build_store = |config: &config::Config| -> Result<Arc<SessionStore>> {
        let options = StoreOptions::from_config(config).context("resolve backend endpoints")?;
        Ok(Arc::new(SessionStore::new(options)))
    };

    match cli.command {
        None => {
            commands::chat::run(
                &build_store(&config)?,
                commands::chat::ChatRunOptions {
                    catalog_refresh: config.catalog_refresh_interval(),
                    ..commands::chat::ChatRunOptions::default()
                },
            )
            .await
        }
        Some(Commands::Chat {
            message,
            model,
            session,
            chain_of_thought,
        }) => {
            commands::chat::run(
                &build_store(&config)?,
                commands::chat::ChatRunOptions {
                    message,
                    model,
                    session,
                    chain_of_thought,
                    catalog_refresh: config.catalog_refresh_interval(),
                },
            )
            .await
        }
        Some(Commands::Sessions { command }) => {
            let store = build_store(&config)?;
            match command {
                SessionCommands::List => commands::sessions::list(&store),
                SessionCommands::Show { id } => commands::sessions::show(&store, &id),
                SessionCommands::New => commands::sessions::new(&store),
                SessionCommands::Use { id } => commands::sessions::activate(&store, &id),
                SessionCommands::Rename { id, title } => {
                    commands::sessions::rename(&store, &id, &title)
                }
                SessionCommands::Delete { id } => commands::sessions::delete(&store, &id),
                SessionCommands::Clear { id } => commands::sessions::clear(&store, &id),
            }
        }
        Some(Commands::Models) => commands::models::list(&build_store(&config)?).await,
        Some(Commands::Upload { files, session }) => {
            commands::upload::run(&build_store(&config)?, &config, &files, session.as_deref()).await
        }
        Some(Commands::Config { command }) => match command {
            ConfigCommands::Path => commands::config::path(),
            ConfigCommands::Init => commands::config::init(&config),
        },
    }
}
