//! recap CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid input
//! - 3: Not signed in or session expired
//! - 4: Service unavailable
//! - 5: Chat not found

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use recap_chat::{ChatError, ErrorKind, GatewayError};

mod commands;

use commands::{Cli, Commands, GlobalArgs};

/// Script-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_INPUT: u8 = 2;
    pub const UNAUTHORIZED: u8 = 3;
    pub const UNAVAILABLE: u8 = 4;
    pub const NOT_FOUND: u8 = 5;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.global);

    let global = cli.global;
    let result = match cli.command {
        Commands::Register(args) => commands::auth::register(args, &global).await,
        Commands::Login(args) => commands::auth::login(args, &global).await,
        Commands::Logout => commands::auth::logout(&global).await,
        Commands::Whoami => commands::auth::whoami(&global).await,
        Commands::Chats(command) => commands::chats::execute(command, &global).await,
        Commands::Ask(args) => commands::ask::execute(args, &global).await,
        Commands::Search(args) => commands::search::execute(args, &global).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            if exit_code == ExitCodes::UNAUTHORIZED {
                eprintln!("   Sign in with `recap login --email <EMAIL>`");
            }
            ExitCode::from(exit_code)
        }
    }
}

/// Logs go to stderr so command output stays pipeable. `RUST_LOG` wins over the flags.
fn init_logging(global: &GlobalArgs) {
    let level = if global.verbose {
        "debug"
    } else if global.quiet {
        "error"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("recap={},warn", level)));

    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    let kind = if let Some(error) = e.downcast_ref::<ChatError>() {
        error.kind()
    } else if let Some(error) = e.downcast_ref::<GatewayError>() {
        ChatError::from(error.clone()).kind()
    } else {
        return ExitCodes::GENERAL_ERROR;
    };

    match kind {
        ErrorKind::Invalid => ExitCodes::INVALID_INPUT,
        ErrorKind::Unauthorized => ExitCodes::UNAUTHORIZED,
        ErrorKind::Unavailable => ExitCodes::UNAVAILABLE,
        ErrorKind::NotFound => ExitCodes::NOT_FOUND,
        ErrorKind::Busy | ErrorKind::State | ErrorKind::Internal => ExitCodes::GENERAL_ERROR,
    }
}
