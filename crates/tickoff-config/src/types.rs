//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! api_url = "https://api.tickoff.app"
//! auth_url = "https://auth.tickoff.app"
//! storage_prefix = "tickoff"    # storage key prefix
//! cookie_prefix = "tickoff"     # must match the auth server
//! data_dir = "/var/lib/tickoff" # defaults to <config dir>/data
//! timeout_secs = 30
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{ConfigError, Result};

pub use tickoff_session::{DEFAULT_COOKIE_PREFIX, DEFAULT_STORAGE_PREFIX};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Subdirectory of the config dir used for stored data by default.
const DATA_SUBDIR: &str = "data";

// ─────────────────────────────────────────────────────────────────────────────
// File layer
// ─────────────────────────────────────────────────────────────────────────────

/// One configuration layer as written in a file.
///
/// Every field is optional so that partial layers (e.g. a project-local file
/// that only changes `api_url`) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// To-do API base URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Auth server base URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_url: Option<String>,

    /// Prefix for durable storage keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_prefix: Option<String>,

    /// Prefix of the auth server's cookie names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookie_prefix: Option<String>,

    /// Directory holding stored session data and cookies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Request timeout in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Create an empty layer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another layer on top of this one (other takes priority).
    pub fn merge(&mut self, other: FileConfig) {
        if other.api_url.is_some() {
            self.api_url = other.api_url;
        }
        if other.auth_url.is_some() {
            self.auth_url = other.auth_url;
        }
        if other.storage_prefix.is_some() {
            self.storage_prefix = other.storage_prefix;
        }
        if other.cookie_prefix.is_some() {
            self.cookie_prefix = other.cookie_prefix;
        }
        if other.data_dir.is_some() {
            self.data_dir = other.data_dir;
        }
        if other.timeout_secs.is_some() {
            self.timeout_secs = other.timeout_secs;
        }
    }

    /// Validate the merged layers into a [`ClientConfig`].
    ///
    /// `config_dir` anchors the default data directory. Every invalid or
    /// missing field is reported in one [`ConfigError::Invalid`].
    pub fn resolve(&self, config_dir: &Path) -> Result<ClientConfig> {
        let mut problems = Vec::new();

        let api_url = check_url("api_url", self.api_url.as_deref(), &mut problems);
        let auth_url = check_url("auth_url", self.auth_url.as_deref(), &mut problems);

        let storage_prefix = check_prefix(
            "storage_prefix",
            self.storage_prefix.as_deref().unwrap_or(DEFAULT_STORAGE_PREFIX),
            &mut problems,
        );
        let cookie_prefix = check_prefix(
            "cookie_prefix",
            self.cookie_prefix.as_deref().unwrap_or(DEFAULT_COOKIE_PREFIX),
            &mut problems,
        );

        let timeout_secs = self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            problems.push(FieldProblem::new("timeout_secs", "must be greater than 0"));
        }

        match (api_url, auth_url) {
            (Some(api_url), Some(auth_url)) if problems.is_empty() => Ok(ClientConfig {
                api_url,
                auth_url,
                storage_prefix,
                cookie_prefix,
                data_dir: self
                    .data_dir
                    .clone()
                    .unwrap_or_else(|| config_dir.join(DATA_SUBDIR)),
                timeout: Duration::from_secs(timeout_secs),
            }),
            _ => Err(ConfigError::Invalid(problems)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Validated config
// ─────────────────────────────────────────────────────────────────────────────

/// Validated client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_url: Url,
    pub auth_url: Url,
    pub storage_prefix: String,
    pub cookie_prefix: String,
    pub data_dir: PathBuf,
    pub timeout: Duration,
}

/// A single field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldProblem {
    pub field: &'static str,
    pub message: String,
}

impl FieldProblem {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn check_url(
    field: &'static str,
    value: Option<&str>,
    problems: &mut Vec<FieldProblem>,
) -> Option<Url> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        problems.push(FieldProblem::new(field, "is required"));
        return None;
    };

    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Some(url),
        Ok(url) => {
            problems.push(FieldProblem::new(
                field,
                format!(
                    "'{}' must be an http(s) URL with a host (got scheme '{}')",
                    value,
                    url.scheme()
                ),
            ));
            None
        }
        Err(e) => {
            problems.push(FieldProblem::new(
                field,
                format!("'{}' is not a valid URL: {}", value, e),
            ));
            None
        }
    }
}

fn check_prefix(field: &'static str, value: &str, problems: &mut Vec<FieldProblem>) -> String {
    let valid = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if !valid {
        problems.push(FieldProblem::new(
            field,
            format!("'{}' may only contain ASCII letters, digits, '_', '-' and '.'", value),
        ));
    }
    value.to_string()
}
