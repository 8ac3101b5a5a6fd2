//! Headers command - print the headers that authenticate API requests.

use anyhow::{Result, bail};

use super::Context;

/// Run the headers command.
pub async fn run(ctx: &Context) -> Result<()> {
    let cookie = ctx.client.cookie_header();
    if cookie.is_empty() {
        bail!("No stored credentials. Run 'tickoff sign-in' first.");
    }

    if ctx.json_output {
        let output = serde_json::json!({
            "api_url": ctx.config.api_url.as_str(),
            "headers": { "cookie": cookie },
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("cookie: {}", cookie);
    }

    Ok(())
}
