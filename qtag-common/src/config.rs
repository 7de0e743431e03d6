//! Configuration loading and config file resolution
//!
//! Config file resolution follows a fixed priority order:
//! 1. Command-line argument (highest priority)
//! 2. `QTAG_CONFIG` environment variable
//! 3. Platform config directory (`~/.config/qtag/config.toml`, then `/etc/qtag/config.toml` on Linux)
//! 4. Compiled defaults (fallback)
//!
//! A missing config file in the platform locations is not an error; an
//! explicitly named file that is missing or malformed is.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use url::Url;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "QTAG_CONFIG";

/// Default capacity of the session EventBus
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

pub const DEFAULT_SCHEME: &str = "https";
pub const DEFAULT_HOST: &str = "qtag.app";
pub const DEFAULT_PATH: &str = "/tag";
pub const DEFAULT_ANDROID_PACKAGE: &str = "app.qtag.pos";

/// Full configuration file contents
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub logging: LoggingConfig,
    pub record: RecordConfig,
    pub session: SessionConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Fixed application constants embedded in every tag record
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RecordConfig {
    /// URL scheme a record must carry to be recognised
    pub scheme: String,
    /// URL host a record must carry to be recognised
    pub host: String,
    /// Path component of written URLs (not checked on read)
    pub path: String,
    /// External application identifier carried by the platform-hint record
    pub android_package: String,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            scheme: DEFAULT_SCHEME.to_string(),
            host: DEFAULT_HOST.to_string(),
            path: DEFAULT_PATH.to_string(),
            android_package: DEFAULT_ANDROID_PACKAGE.to_string(),
        }
    }
}

impl RecordConfig {
    /// `{scheme}://{host}{path}` as written in the file
    pub fn base_url(&self) -> String {
        format!("{}://{}{}", self.scheme, self.host, self.path)
    }

    /// Parse the base URL, requiring a host
    pub fn parse_base_url(&self) -> Result<Url> {
        let base = self.base_url();
        let url = Url::parse(&base)
            .map_err(|e| Error::Config(format!("record base URL {} is invalid: {}", base, e)))?;
        if url.host_str().map_or(true, str::is_empty) {
            return Err(Error::Config(format!("record base URL {} has no host", base)));
        }
        Ok(url)
    }
}

/// Session sheet texts and event bus sizing
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub event_capacity: usize,
    /// Shown while the session waits for a tag
    pub begin_alert: String,
    pub read_success_alert: String,
    pub write_success_alert: String,
    pub lock_success_alert: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            event_capacity: DEFAULT_EVENT_CAPACITY,
            begin_alert: "Hold the tag near the top of the device".to_string(),
            read_success_alert: "Tag read".to_string(),
            write_success_alert: "Tag written".to_string(),
            lock_success_alert: "Tag written and locked".to_string(),
        }
    }
}

impl TomlConfig {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: TomlConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the config file by priority order and load it
    ///
    /// Falls back to compiled defaults when no file exists in the platform
    /// locations.
    pub fn load_or_default(cli_arg: Option<&Path>) -> Result<Self> {
        // Priority 1: Command-line argument
        if let Some(path) = cli_arg {
            return Self::load(path);
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::load(Path::new(&path));
        }

        // Priority 3: Platform config file
        if let Some(path) = platform_config_file() {
            info!("Loading configuration from {}", path.display());
            return Self::load(&path);
        }

        // Priority 4: Compiled defaults
        warn!("No config file found, using built-in defaults");
        Ok(Self::default())
    }

    /// Check values the rest of the system relies on
    pub fn validate(&self) -> Result<()> {
        if self.record.scheme.is_empty() || self.record.host.is_empty() {
            return Err(Error::Config(
                "record.scheme and record.host must not be empty".to_string(),
            ));
        }
        if !self.record.path.is_empty() && !self.record.path.starts_with('/') {
            return Err(Error::Config(format!(
                "record.path must start with '/': {}",
                self.record.path
            )));
        }
        self.record.parse_base_url()?;
        if self.record.android_package.is_empty() {
            return Err(Error::Config(
                "record.android_package must not be empty".to_string(),
            ));
        }
        if self.session.event_capacity == 0 {
            return Err(Error::Config(
                "session.event_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// First existing config file in the platform locations
fn platform_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("qtag").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/qtag/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}
