//! CLI command definitions.
//!
//! This module defines the command structure for the recap CLI.
//! Each subcommand maps to one screen of the web client.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use recap_chat::{ChatError, ChatManager, ClientConfig, User, DEFAULT_STATE_DIR, ENV_STATE_DIR};

pub mod ask;
pub mod auth;
pub mod chats;
pub mod search;

/// recap - summarize text, web pages and PDFs from the terminal
#[derive(Parser, Debug)]
#[command(name = "recap")]
#[command(version, about = "recap - summarize text, web pages and PDFs from the terminal")]
#[command(long_about = r#"
recap talks to the recap content service: sign in, then send text, a URL or
a PDF and get back a summary with key points. Every exchange is kept in a
chat you can list, reopen and search later.

WORKFLOWS:
  register / login → Create an account or sign in (credential is cached)
  ask text|url|file → Analyze content in a new or existing chat
  chats            → List, create, show or delete chats
  search           → Find chats by title or message content

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid input
  3 - Not signed in or session expired
  4 - Service unavailable
  5 - Chat not found
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags accepted by every subcommand
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Directory holding settings.json and the cached credential
    #[arg(long, global = true, env = ENV_STATE_DIR, default_value = DEFAULT_STATE_DIR)]
    pub state_dir: PathBuf,

    /// Content service base URL, overrides settings and RECAP_API_URL
    #[arg(long, global = true)]
    pub api_url: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create an account and sign in
    Register(auth::RegisterArgs),

    /// Sign in with email and password
    Login(auth::LoginArgs),

    /// Forget the cached credential
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Manage chats
    #[command(subcommand)]
    Chats(chats::ChatsCommand),

    /// Analyze text, a URL or a PDF
    Ask(ask::AskArgs),

    /// Search chat titles and messages
    Search(search::SearchArgs),
}

/// Resolve client settings, letting `--api-url` win over file and environment.
pub fn load_config(global: &GlobalArgs) -> Result<ClientConfig> {
    let mut config = ClientConfig::load(&global.state_dir)?;
    if let Some(url) = &global.api_url {
        config = config.api_url(url.clone());
        config.validate()?;
    }
    Ok(config)
}

/// Build a manager without touching the session.
pub fn connect(global: &GlobalArgs) -> Result<ChatManager> {
    let config = load_config(global)?;
    ChatManager::from_config(&config).context("Failed to set up the service client")
}

/// Build a manager and resume the cached session, failing when there is none.
pub async fn signed_in(global: &GlobalArgs) -> Result<(ChatManager, User)> {
    let manager = connect(global)?;
    match manager.restore().await? {
        Some(user) => Ok((manager, user)),
        None => Err(ChatError::NotAuthenticated.into()),
    }
}

/// Print unless `--quiet` was given.
pub fn note(global: &GlobalArgs, message: impl std::fmt::Display) {
    if !global.quiet {
        println!("{}", message);
    }
}
