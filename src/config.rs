//! Configuration for watch resources and logging.
//!
//! Settings are layered:
//! - Default values
//! - TOML configuration file (`tailwatch.toml`)
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `TAILWATCH_` and use double
//! underscores to separate nested levels:
//! - `TAILWATCH_WATCH__EVENT_BUFFER=4` sets `watch.event_buffer`
//! - `TAILWATCH_WATCH__MAX_HANDLES=64` sets `watch.max_handles`
//! - `TAILWATCH_LOGGING__DEFAULT=debug` sets `logging.default`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::watcher::WatchError;

/// Default configuration file name, looked up in the current directory.
pub const CONFIG_FILE: &str = "tailwatch.toml";

const ENV_PREFIX: &str = "TAILWATCH_";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Watch handle and event stream settings
    #[serde(default)]
    pub watch: WatchConfig,

    /// Log levels
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatchConfig {
    /// Capacity of each outbound change stream. A full stream stalls
    /// classification until the consumer catches up.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Upper bound on outstanding OS watchers. Unlimited when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_handles: Option<usize>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level for every target (`error`, `warn`, `info`, `debug`, `trace`)
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-target overrides, e.g. `tailwatch::watcher = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_event_buffer() -> usize {
    1
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            watch: WatchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            event_buffer: default_event_buffer(),
            max_handles: None,
        }
    }
}

impl WatchConfig {
    /// Outbound stream capacity, never zero.
    pub fn event_capacity(&self) -> usize {
        self.event_buffer.max(1)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from defaults, `tailwatch.toml` in the current
    /// directory if present, and the environment.
    pub fn load() -> Result<Self, WatchError> {
        Self::load_from(PathBuf::from(CONFIG_FILE))
    }

    /// Load configuration from a specific file, still honoring environment overrides.
    ///
    /// A missing file is not an error; defaults and environment apply.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, WatchError> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| WatchError::Config {
                reason: e.to_string(),
            })
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), WatchError> {
        let path = path.as_ref();
        let to_config_error = |reason: String| WatchError::Config { reason };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| to_config_error(format!("{}: {e}", parent.display())))?;
        }

        let toml_string = toml::to_string_pretty(self).map_err(|e| to_config_error(e.to_string()))?;
        std::fs::write(path, toml_string)
            .map_err(|e| to_config_error(format!("{}: {e}", path.display())))?;

        Ok(())
    }
}
