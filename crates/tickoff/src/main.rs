//! tickoff - session-aware command-line client for the tickoff to-do service.
//!
//! Main entry point for the tickoff CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{auth, headers, init, status};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// tickoff - sign in and inspect your session for the tickoff to-do service
#[derive(Parser)]
#[command(name = "tickoff")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Config directory (default: ~/.config/tickoff)
    #[arg(long, global = true, env = "TICKOFF_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Auth server URL, overriding the config file
    #[arg(long, global = true, env = "TICKOFF_AUTH_URL")]
    pub auth_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a config file with the server URLs
    Init(init::InitArgs),

    /// Show the current session
    Status(status::StatusArgs),

    /// Check the session with the auth server
    Refresh,

    /// Sign in with email and password
    SignIn(auth::SignInArgs),

    /// Create an account and sign in
    SignUp(auth::SignUpArgs),

    /// Sign out and clear stored credentials
    SignOut,

    /// Print headers that authenticate API requests
    Headers,
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_dir = cli.config_dir.clone().or_else(tickoff_config::xdg_config_dir);

    // Initialize tracing: console (human-readable) + rotating JSON file
    let filter = if cli.verbose {
        "tickoff=debug,tickoff_session=debug,tickoff_client=debug,tickoff_config=debug,info"
    } else {
        "tickoff=info,tickoff_session=warn,tickoff_client=warn,warn"
    };

    let log_dir = config_dir
        .as_ref()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "tickoff.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "tickoff=trace,tickoff_session=trace,tickoff_client=trace,tickoff_config=trace,info",
                )),
        )
        .init();

    let load = || {
        commands::Context::load(
            config_dir.as_deref(),
            cli.auth_url.as_deref(),
            cli.json,
            cli.verbose,
        )
    };

    // Dispatch to command handlers
    match cli.command {
        Commands::Init(args) => {
            init::run(args, config_dir.as_deref(), cli.auth_url.as_deref(), cli.json)
        }
        Commands::Status(args) => status::run(args, &load()?).await,
        Commands::Refresh => status::refresh(&load()?).await,
        Commands::SignIn(args) => auth::sign_in(args, &load()?).await,
        Commands::SignUp(args) => auth::sign_up(args, &load()?).await,
        Commands::SignOut => auth::sign_out(&load()?).await,
        Commands::Headers => headers::run(&load()?).await,
    }
}
