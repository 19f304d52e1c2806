//! Configuration
//!
//! Two layers:
//!
//! - An environment file (`/etc/spook/environment`, `.env`, or the path in
//!   `SPOOK_ENV_FILE`) loaded into the process environment without overriding
//!   variables that are already set.
//! - A TOML [`SpookConfig`] controlling the inspection cooldown and which
//!   repairs and services are disabled.
//!
//! ```rust,no_run
//! use spook_core::config::{load_environment, SpookConfig};
//!
//! load_environment();
//! let config = SpookConfig::load(None).unwrap_or_default();
//! assert!(config.inspect_cooldown_secs > 0);
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Environment files tried after `$SPOOK_ENV_FILE`, first match wins
pub const ENV_FILE_PATHS: &[&str] = &["/etc/spook/environment", "/etc/spook.env", ".env"];

/// Environment variable naming the TOML config file
pub const CONFIG_PATH_VAR: &str = "SPOOK_CONFIG";

/// Default cooldown between debounced inspections, in seconds
pub const DEFAULT_INSPECT_COOLDOWN_SECS: u64 = 10;

/// Apply the first readable environment file to the process environment.
///
/// Variables already present in the environment win over the file. Returns
/// the file that was applied.
pub fn load_environment() -> Option<String> {
    let custom = std::env::var("SPOOK_ENV_FILE").ok();
    let candidates = custom.iter().map(String::as_str).chain(ENV_FILE_PATHS.iter().copied());

    for path in candidates {
        let Some(vars) = read_env_file(Path::new(path)) else {
            continue;
        };
        let mut applied = 0;
        for (key, value) in vars {
            if std::env::var_os(&key).is_none() {
                std::env::set_var(key, value);
                applied += 1;
            }
        }
        info!("Applied {} variables from {}", applied, path);
        return Some(path.to_string());
    }

    debug!("No environment file found");
    None
}

/// `KEY=VALUE` pairs of an environment file; `None` if it cannot be read
fn read_env_file(path: &Path) -> Option<Vec<(String, String)>> {
    match fs::read_to_string(path) {
        Ok(content) => Some(parse_env(&content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            warn!("Cannot read environment file {}: {}", path.display(), e);
            None
        }
    }
}

fn parse_env(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_env_line)
        .collect()
}

/// Parse `KEY=VALUE`, `KEY="VALUE"` or `KEY='VALUE'`
fn parse_env_line(line: &str) -> Option<(String, String)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }

    let value = value.trim();
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|q| value.strip_prefix(*q)?.strip_suffix(*q))
        .unwrap_or(value);

    Some((key.to_string(), unquoted.to_string()))
}

/// Get an optional configuration value.
pub fn get_config_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get a boolean configuration value.
pub fn get_config_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes" | "on"))
        .unwrap_or(default)
}

/// Runtime configuration for the repair and service managers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpookConfig {
    /// Cooldown applied by every debounced repair
    pub inspect_cooldown_secs: u64,
    /// Repairs that are never activated, as `domain.repair`
    pub disabled_repairs: Vec<String>,
    /// Services that are never registered, as `domain.service`
    pub disabled_services: Vec<String>,
}

impl Default for SpookConfig {
    fn default() -> Self {
        Self {
            inspect_cooldown_secs: DEFAULT_INSPECT_COOLDOWN_SECS,
            disabled_repairs: Vec::new(),
            disabled_services: Vec::new(),
        }
    }
}

impl SpookConfig {
    /// Load from `path`, falling back to `$SPOOK_CONFIG`.
    ///
    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path: Option<PathBuf> = path
            .map(Path::to_path_buf)
            .or_else(|| get_config_opt(CONFIG_PATH_VAR).map(PathBuf::from));

        let Some(path) = path else {
            debug!("No config file given, using defaults");
            return Ok(Self::default());
        };

        if !path.exists() {
            debug!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let config = Self::from_toml(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        if config.inspect_cooldown_secs == 0 {
            return Err(Error::Config(
                "inspect_cooldown_secs must be greater than zero".to_string(),
            ));
        }
        Ok(config)
    }

    pub fn inspect_cooldown(&self) -> Duration {
        Duration::from_secs(self.inspect_cooldown_secs)
    }

    pub fn is_repair_disabled(&self, domain: &str, repair: &str) -> bool {
        let id = format!("{}.{}", domain, repair);
        self.disabled_repairs.iter().any(|r| *r == id)
    }

    pub fn is_service_disabled(&self, domain: &str, service: &str) -> bool {
        let id = format!("{}.{}", domain, service);
        self.disabled_services.iter().any(|s| *s == id)
    }
}
