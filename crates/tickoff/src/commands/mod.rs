//! CLI command handlers.

pub mod auth;
pub mod headers;
pub mod init;
pub mod status;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use console::{Style, style};
use serde::Serialize;
use tickoff_client::AuthClient;
use tickoff_config::ClientConfig;
use tickoff_session::{
    AuthStatus, FileStore, SessionCache, SessionConfig, SessionState, SharedStore,
    SignalSubscription,
};
use tracing::{debug, warn};

/// Shared context for all commands.
pub struct Context {
    /// Validated configuration.
    pub config: ClientConfig,
    /// Auth server client, persisting into the data directory.
    pub client: AuthClient,
    /// Session cache attached to the client's change signal.
    pub cache: SessionCache,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
    _subscription: SignalSubscription,
}

impl Context {
    /// Load configuration and wire the client and cache together.
    pub fn load(
        config_dir: Option<&Path>,
        auth_url: Option<&str>,
        json_output: bool,
        verbose: bool,
    ) -> Result<Self> {
        let mut loaded = tickoff_config::load_config_with_options(None, config_dir)?;
        for warning in &loaded.warnings {
            warn!("{}", warning);
        }
        if let Some(url) = auth_url {
            loaded.config.auth_url = Some(url.to_string());
        }
        debug!(
            sources = ?loaded.loaded_from(),
            env = ?loaded.env_overrides,
            "Configuration loaded"
        );

        let config = loaded.resolve()?;
        Self::new(config, json_output, verbose)
    }

    /// Build the client and cache for a validated configuration.
    pub fn new(config: ClientConfig, json_output: bool, verbose: bool) -> Result<Self> {
        let store: SharedStore = Arc::new(FileStore::new(&config.data_dir));
        let session_config = SessionConfig::new().with_storage_prefix(&config.storage_prefix);

        let client = AuthClient::builder()
            .base_url(config.auth_url.as_str())
            .cookie_prefix(&config.cookie_prefix)
            .session_config(session_config.clone())
            .store(store.clone())
            .timeout(config.timeout)
            .build()
            .context("Failed to create auth client")?;

        let cache = SessionCache::new(session_config, store, Arc::new(client.clone()));
        let subscription = cache.attach(client.signal());

        Ok(Self {
            config,
            client,
            cache,
            json_output,
            verbose,
            _subscription: subscription,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

/// Session state for JSON output.
#[derive(Debug, Serialize)]
struct StateOutput<'a> {
    status: &'static str,
    pending: bool,
    user_id: Option<&'a str>,
    name: Option<&'a str>,
    email: Option<&'a str>,
    expires_at: Option<String>,
    auth_url: &'a str,
}

fn status_key(status: AuthStatus) -> &'static str {
    match status {
        AuthStatus::SignedIn => "signed_in",
        AuthStatus::Unknown => "unknown",
        AuthStatus::SignedOut => "signed_out",
    }
}

/// Print a session state in the selected output format.
pub(crate) fn print_state(state: &SessionState, ctx: &Context) -> Result<()> {
    let status = state.status();
    let user = state.user();
    let expires_at = state.data.as_ref().and_then(|s| s.expires_at());

    if ctx.json_output {
        let output = StateOutput {
            status: status_key(status),
            pending: state.is_pending,
            user_id: user.map(|u| u.id.as_str()),
            name: user.and_then(|u| u.name.as_deref()),
            email: user.and_then(|u| u.email.as_deref()),
            expires_at: expires_at.map(|ts| ts.to_rfc3339()),
            auth_url: ctx.config.auth_url.as_str(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    let marker = match status {
        AuthStatus::SignedIn => Style::new().green().apply_to("● signed in"),
        AuthStatus::Unknown => Style::new().yellow().apply_to("● checking"),
        AuthStatus::SignedOut => Style::new().red().apply_to("● signed out"),
    };

    println!();
    println!("{}", style("tickoff Session").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    println!();
    println!("  {} {}", dim.apply_to("Status:"), marker);

    if let Some(user) = user {
        println!("  {} {}", dim.apply_to("User:"), user.display_name());
        if let Some(email) = &user.email {
            println!("  {} {}", dim.apply_to("Email:"), email);
        }
    }
    if let Some(expires_at) = expires_at {
        println!(
            "  {} {}",
            dim.apply_to("Expires:"),
            expires_at.format("%Y-%m-%d %H:%M UTC")
        );
    }
    if state.is_pending && state.data.is_some() {
        println!("  {}", dim.apply_to("(revalidating with the server)"));
    }
    println!("  {} {}", dim.apply_to("Auth server:"), ctx.config.auth_url);

    if ctx.verbose {
        println!("  {} {}", dim.apply_to("Data dir:"), ctx.config.data_dir.display());
    }

    println!();
    Ok(())
}
