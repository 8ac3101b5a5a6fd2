//! Status and refresh commands - show the session, from cache or the server.

use anyhow::Result;
use clap::Args;
use console::Style;
use tracing::{debug, warn};

use super::{Context, print_state};

/// Arguments for the status command.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Wait for the server to confirm the session before printing
    #[arg(short, long)]
    pub wait: bool,
}

/// Run the status command.
///
/// Prints what the local cache knows right away. With `--wait`, the
/// reconciliation with the server is awaited and the settled state printed.
pub async fn run(args: StatusArgs, ctx: &Context) -> Result<()> {
    let refresh = ctx.cache.bootstrap();

    if args.wait
        && let Some(handle) = refresh
    {
        debug!("Waiting for session reconciliation");
        if let Err(e) = handle.await {
            warn!(error = %e, "Session reconciliation did not complete");
        }
    }

    let state = ctx.cache.snapshot();
    print_state(&state, ctx)?;

    if !ctx.json_output && !args.wait && state.is_pending && state.data.is_none() {
        let dim = Style::new().dim();
        println!(
            "  {}",
            dim.apply_to("No cached session. Run with --wait to ask the server.")
        );
        println!();
    }

    Ok(())
}

/// Run the refresh command.
pub async fn refresh(ctx: &Context) -> Result<()> {
    // Start from the stored session so a transient failure keeps it.
    ctx.cache.resync_from_store();
    ctx.cache.refresh().await;

    print_state(&ctx.cache.snapshot(), ctx)
}
