//! Configuration for a [`PromiseContext`](crate::PromiseContext).
//!
//! # Configuration Precedence
//!
//! Settings are resolved in this order (highest priority first):
//!
//! 1. **Programmatic** — values set via `with_*` methods
//! 2. **Environment variables** — values from `SETTLE_*` env vars
//! 3. **Config file** — values loaded from a TOML file (requires `config-file` feature)
//! 4. **Defaults** — built-in defaults from [`PromiseConfig::default()`]
//!
//! # Supported Environment Variables
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `SETTLE_TRACK_PENDING` | `bool` | `track_pending` |
//! | `SETTLE_UNHANDLED_POLICY` | `panic` \| `log` | `unhandled_policy` |
//! | `SETTLE_STALE_AFTER_MS` | `u64` | `stale_after` |

use core::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Environment variable name for pending-promise tracking.
pub const ENV_TRACK_PENDING: &str = "SETTLE_TRACK_PENDING";
/// Environment variable name for the default unhandled-rejection policy.
pub const ENV_UNHANDLED_POLICY: &str = "SETTLE_UNHANDLED_POLICY";
/// Environment variable name for the stale-pending threshold in milliseconds.
pub const ENV_STALE_AFTER_MS: &str = "SETTLE_STALE_AFTER_MS";

/// Error produced while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable held a value that could not be parsed.
    #[error("invalid value for {var}: expected {expected}, got {value:?}")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// What the variable should contain.
        expected: &'static str,
        /// The offending value.
        value: String,
    },
    /// A config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A config file could not be parsed.
    #[error("failed to parse TOML config: {0}")]
    Parse(String),
}

/// What the default unhandled-rejection sink does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config-file", derive(serde::Deserialize))]
#[cfg_attr(feature = "config-file", serde(rename_all = "snake_case"))]
pub enum UnhandledPolicy {
    /// Treat the rejection as a fatal fault: panic on the settling thread.
    #[default]
    Panic,
    /// Log the rejection at error level and carry on.
    Log,
}

impl FromStr for UnhandledPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "panic" | "fatal" => Ok(Self::Panic),
            "log" => Ok(Self::Log),
            _ => Err(()),
        }
    }
}

impl fmt::Display for UnhandledPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Panic => write!(f, "panic"),
            Self::Log => write!(f, "log"),
        }
    }
}

/// Settings for a promise context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromiseConfig {
    /// Record every pending promise in the context's registry.
    pub track_pending: bool,
    /// Behaviour of the default unhandled-rejection sink.
    pub unhandled_policy: UnhandledPolicy,
    /// Age after which a pending promise is reported as stale.
    pub stale_after: Duration,
}

impl Default for PromiseConfig {
    fn default() -> Self {
        Self {
            track_pending: false,
            unhandled_policy: UnhandledPolicy::Panic,
            stale_after: Duration::from_secs(60),
        }
    }
}

impl PromiseConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        apply_env_overrides(&mut config)?;
        Ok(config)
    }

    /// Enables or disables pending-promise tracking.
    #[must_use]
    pub fn with_track_pending(mut self, track: bool) -> Self {
        self.track_pending = track;
        self
    }

    /// Sets the default unhandled-rejection policy.
    #[must_use]
    pub fn with_unhandled_policy(mut self, policy: UnhandledPolicy) -> Self {
        self.unhandled_policy = policy;
        self
    }

    /// Sets the stale-pending threshold.
    #[must_use]
    pub fn with_stale_after(mut self, threshold: Duration) -> Self {
        self.stale_after = threshold;
        self
    }
}

/// Apply environment variable overrides to a [`PromiseConfig`].
///
/// Only variables that are set in the environment are applied.
/// Returns an error if a variable is set but contains an unparseable value.
pub fn apply_env_overrides(config: &mut PromiseConfig) -> Result<(), ConfigError> {
    if let Some(val) = read_env(ENV_TRACK_PENDING) {
        config.track_pending = parse_bool(ENV_TRACK_PENDING, &val)?;
    }
    if let Some(val) = read_env(ENV_UNHANDLED_POLICY) {
        config.unhandled_policy = val.parse().map_err(|()| ConfigError::InvalidEnv {
            var: ENV_UNHANDLED_POLICY,
            expected: "panic or log",
            value: val.clone(),
        })?;
    }
    if let Some(val) = read_env(ENV_STALE_AFTER_MS) {
        config.stale_after = Duration::from_millis(parse_u64(ENV_STALE_AFTER_MS, &val)?);
    }
    Ok(())
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_u64(var: &'static str, val: &str) -> Result<u64, ConfigError> {
    val.trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidEnv {
            var,
            expected: "unsigned integer",
            value: val.to_string(),
        })
}

fn parse_bool(var: &'static str, val: &str) -> Result<bool, ConfigError> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            var,
            expected: "bool (true/false/1/0/yes/no)",
            value: val.to_string(),
        }),
    }
}

// =========================================================================
// TOML config file support (feature-gated)
// =========================================================================

/// TOML-deserializable context configuration.
///
/// ```toml
/// [diagnostics]
/// track_pending = true
/// stale_after_ms = 30000
///
/// [unhandled]
/// policy = "log"
/// ```
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct PromiseTomlConfig {
    /// Diagnostics settings.
    #[serde(default)]
    pub diagnostics: DiagnosticsToml,
    /// Unhandled-rejection settings.
    #[serde(default)]
    pub unhandled: UnhandledToml,
}

/// Diagnostics section of the TOML config.
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct DiagnosticsToml {
    /// Record pending promises.
    pub track_pending: Option<bool>,
    /// Stale threshold in milliseconds.
    pub stale_after_ms: Option<u64>,
}

/// Unhandled-rejection section of the TOML config.
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct UnhandledToml {
    /// Default sink behaviour.
    pub policy: Option<UnhandledPolicy>,
}

/// Apply a parsed TOML config to a [`PromiseConfig`].
///
/// Only fields present in the TOML override the config.
#[cfg(feature = "config-file")]
pub fn apply_toml_config(config: &mut PromiseConfig, toml: &PromiseTomlConfig) {
    if let Some(v) = toml.diagnostics.track_pending {
        config.track_pending = v;
    }
    if let Some(v) = toml.diagnostics.stale_after_ms {
        config.stale_after = Duration::from_millis(v);
    }
    if let Some(v) = toml.unhandled.policy {
        config.unhandled_policy = v;
    }
}

/// Parse a TOML string into a [`PromiseTomlConfig`].
#[cfg(feature = "config-file")]
pub fn parse_toml_str(toml_str: &str) -> Result<PromiseTomlConfig, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Load a config file, then apply environment overrides on top of it.
#[cfg(feature = "config-file")]
pub fn load_file(path: &std::path::Path) -> Result<PromiseConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut config = PromiseConfig::default();
    apply_toml_config(&mut config, &parse_toml_str(&content)?);
    apply_env_overrides(&mut config)?;
    Ok(config)
}
