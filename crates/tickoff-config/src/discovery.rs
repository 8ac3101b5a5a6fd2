//! Config file discovery and layered merging.
//!
//! Resolution order (later overrides earlier):
//! 1. `~/.config/tickoff/config.toml` (XDG user config)
//! 2. `./tickoff.toml` (project-local)
//! 3. `TICKOFF_API_URL` / `TICKOFF_AUTH_URL` environment variables
//! 4. CLI arguments (handled externally)

use std::path::{Path, PathBuf};

use url::Url;

use crate::{ClientConfig, ConfigError, FileConfig, Result};

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "tickoff.toml";

/// Default config filename within XDG config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for XDG directory resolution.
const APP_NAME: &str = "tickoff";

/// Environment variable to override the config directory.
///
/// When set, this takes precedence over the platform default.
pub const CONFIG_DIR_ENV: &str = "TICKOFF_CONFIG_DIR";

/// Environment variable overriding `api_url`.
pub const API_URL_ENV: &str = "TICKOFF_API_URL";

/// Environment variable overriding `auth_url`.
pub const AUTH_URL_ENV: &str = "TICKOFF_AUTH_URL";

/// Tracks where each config layer was loaded from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Path to the config file.
    pub path: PathBuf,
    /// Whether the file was found and loaded.
    pub loaded: bool,
}

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged layers, not yet validated.
    pub config: FileConfig,
    /// User config directory in effect, if one could be determined.
    pub config_dir: Option<PathBuf>,
    /// Sources that were checked, in order of precedence (lowest first).
    pub sources: Vec<ConfigSource>,
    /// Environment variables that overrode file values.
    pub env_overrides: Vec<&'static str>,
    /// Warnings generated during loading (e.g., unreadable layers).
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Get paths of sources that were actually loaded.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }

    /// Validate the merged configuration.
    pub fn resolve(&self) -> Result<ClientConfig> {
        let config_dir = self.config_dir.as_deref().ok_or(ConfigError::NoConfigDir)?;
        self.config.resolve(config_dir)
    }
}

/// Load configuration by discovering and merging all config layers.
///
/// Searches for config files in order:
/// 1. User config dir (`TICKOFF_CONFIG_DIR` env, or platform default)
/// 2. Project-local (`./tickoff.toml` or specified project dir)
///
/// then applies environment overrides. Later layers override earlier ones.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None)
}

/// Load configuration with explicit control over the user config directory.
///
/// `config_dir` overrides both `TICKOFF_CONFIG_DIR` and the platform default.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let mut config = FileConfig::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    // 1. User config: explicit override, then env var, then platform default
    let config_dir = match config_dir {
        Some(dir) => Some(dir.to_path_buf()),
        None => xdg_config_dir(),
    };
    if let Some(dir) = &config_dir {
        let source = load_layer(&mut config, &dir.join(USER_CONFIG_FILE), &mut warnings);
        sources.push(source);
    }

    // 2. Project-local config
    let project_path = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    let source = load_layer(&mut config, &project_path, &mut warnings);
    sources.push(source);

    // 3. Environment
    let env_overrides = apply_env_overrides(&mut config, |name| std::env::var(name).ok());

    check_plaintext_urls(&config, &mut warnings);

    Ok(LoadedConfig {
        config,
        config_dir,
        sources,
        env_overrides,
        warnings,
    })
}

/// Apply environment overrides using `lookup` to read variables.
///
/// Empty values are ignored. Returns the names of the variables applied.
pub fn apply_env_overrides<F>(config: &mut FileConfig, lookup: F) -> Vec<&'static str>
where
    F: Fn(&str) -> Option<String>,
{
    let mut applied = Vec::new();
    let mut read = |name: &'static str| {
        let value = lookup(name).filter(|v| !v.trim().is_empty())?;
        applied.push(name);
        Some(value)
    };

    if let Some(url) = read(API_URL_ENV) {
        config.api_url = Some(url);
    }
    if let Some(url) = read(AUTH_URL_ENV) {
        config.auth_url = Some(url);
    }
    applied
}

/// Load config from a specific file path (no discovery).
pub fn load_config_file(path: &Path) -> Result<FileConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    FileConfig::from_toml(&contents)
}

/// Save configuration to a file.
///
/// Creates parent directories if they don't exist.
pub fn save_config(config: &FileConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFile {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let contents = config.to_toml()?;
    std::fs::write(path, contents).map_err(|e| ConfigError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(())
}

/// Get the XDG config file path for tickoff.
pub fn xdg_config_path() -> Option<PathBuf> {
    xdg_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// Get the XDG config directory for tickoff.
///
/// Checks `TICKOFF_CONFIG_DIR` env var first, then falls back to platform
/// default (`~/.config/tickoff` on Linux).
pub fn xdg_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Try to load a config file and merge it into the existing config.
///
/// A missing file is skipped; an unreadable one becomes a warning.
fn load_layer(config: &mut FileConfig, path: &Path, warnings: &mut Vec<String>) -> ConfigSource {
    let loaded = path.is_file()
        && match load_config_file(path) {
            Ok(layer) => {
                config.merge(layer);
                true
            }
            Err(e) => {
                warnings.push(format!("Failed to load {}: {}", path.display(), e));
                false
            }
        };

    ConfigSource {
        path: path.to_path_buf(),
        loaded,
    }
}

/// Warn when session cookies would travel over plain http to a remote host.
fn check_plaintext_urls(config: &FileConfig, warnings: &mut Vec<String>) {
    for (field, value) in [("api_url", &config.api_url), ("auth_url", &config.auth_url)] {
        let Some(url) = value.as_deref().and_then(|v| Url::parse(v.trim()).ok()) else {
            continue;
        };
        let local = matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"));
        if url.scheme() == "http" && !local {
            warnings.push(format!(
                "{} uses plain http to a remote host; session cookies will be sent unencrypted",
                field
            ));
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
