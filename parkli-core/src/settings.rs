//! Runtime settings: defaults, an optional TOML file, and `PARKLI_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::reconcile::{DEFAULT_ESTIMATE_PERCENT, EstimatePolicy};

/// File looked up in the working directory when no path is given.
pub const DEFAULT_SETTINGS_FILE: &str = "parkli.toml";

/// Prefix of environment variables overriding settings.
pub const ENV_PREFIX: &str = "PARKLI_";

#[derive(thiserror::Error, Debug)]
/// Settings could not be assembled.
pub enum SettingsError {
    /// A provider failed or a value had the wrong type.
    #[error("settings loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for SettingsError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Log line format.
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
/// Process-wide configuration.
pub struct Settings {
    /// Lifetime of cached city aggregates, in seconds.
    pub cache_ttl_secs: u64,
    /// Timeout of one upstream request, in seconds.
    pub request_timeout_secs: u64,
    /// Share of capacity assumed free for facilities without live data.
    pub estimate_percent: u8,
    /// Directory replacing the bundled reference dataset.
    pub reference_dir: Option<PathBuf>,
    /// `User-Agent` sent upstream.
    pub user_agent: String,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Log line format.
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 60,
            request_timeout_secs: 10,
            estimate_percent: DEFAULT_ESTIMATE_PERCENT,
            reference_dir: None,
            user_agent: String::from("parkli/0.1"),
            log_level: String::from("info"),
            log_format: LogFormat::Pretty,
        }
    }
}

impl Settings {
    /// Load defaults, then `file` (or [`DEFAULT_SETTINGS_FILE`]) if it exists,
    /// then `PARKLI_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] when the file is malformed or a value has the wrong type.
    pub fn load(file: Option<&Path>) -> Result<Self, SettingsError> {
        let file = file.unwrap_or_else(|| Path::new(DEFAULT_SETTINGS_FILE));
        Self::figment(file).extract().map_err(SettingsError::from)
    }

    /// The provider chain behind [`Settings::load`].
    #[must_use]
    pub fn figment(file: &Path) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// Cache time to live.
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Upstream request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Availability estimate for reference-only facilities.
    #[must_use]
    pub fn estimate(&self) -> EstimatePolicy {
        EstimatePolicy::new(self.estimate_percent)
    }
}
