//! Configuration for tickoff clients.
//!
//! Provides TOML-based configuration with:
//! - Config file layering (XDG user config + project-local overrides)
//! - Environment overrides (`TICKOFF_API_URL`, `TICKOFF_AUTH_URL`)
//! - Validation of the merged result into a [`ClientConfig`], reporting
//!   every bad field at once

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    apply_env_overrides, load_config, load_config_file, load_config_with_options, save_config,
    xdg_config_dir, xdg_config_path, ConfigSource, LoadedConfig, API_URL_ENV, AUTH_URL_ENV,
    CONFIG_DIR_ENV,
};
pub use error::{ConfigError, Result};
pub use types::{
    ClientConfig, FieldProblem, FileConfig, DEFAULT_COOKIE_PREFIX, DEFAULT_STORAGE_PREFIX,
    DEFAULT_TIMEOUT_SECS,
};
