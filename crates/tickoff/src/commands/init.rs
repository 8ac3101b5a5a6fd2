//! Init command - write a user config file.

use std::path::Path;

use anyhow::{Result, bail};
use clap::Args;
use tickoff_config::{ConfigError, FileConfig};

/// Arguments for the init command.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// To-do API URL
    #[arg(long, env = "TICKOFF_API_URL")]
    pub api_url: String,

    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}

/// Run the init command.
///
/// The auth URL comes from the global `--auth-url` flag. Both URLs are
/// validated before anything is written.
pub fn run(
    args: InitArgs,
    config_dir: Option<&Path>,
    auth_url: Option<&str>,
    json_output: bool,
) -> Result<()> {
    let config_dir = config_dir.ok_or(ConfigError::NoConfigDir)?;
    let Some(auth_url) = auth_url else {
        bail!("--auth-url is required for init");
    };

    let path = config_dir.join("config.toml");
    if path.exists() && !args.force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    let config = FileConfig {
        api_url: Some(args.api_url),
        auth_url: Some(auth_url.to_string()),
        ..Default::default()
    };
    let resolved = config.resolve(config_dir)?;
    tickoff_config::save_config(&config, &path)?;

    if json_output {
        let output = serde_json::json!({
            "path": path.display().to_string(),
            "api_url": resolved.api_url.as_str(),
            "auth_url": resolved.auth_url.as_str(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("Wrote {}", path.display());
    }

    Ok(())
}
