use std::{env, fmt, fs, path, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shortest sweep interval accepted, in seconds
pub const MIN_INTERVAL_SECONDS: u64 = 10;

pub const MIN_REQUEST_TIMEOUT_MS: u64 = 100;
pub const MAX_REQUEST_TIMEOUT_MS: u64 = 300_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {}", .0.display(), .1)]
    ReadFailed(path::PathBuf, #[source] std::io::Error),

    #[error("Failed to write config file {}: {}", .0.display(), .1)]
    WriteFailed(path::PathBuf, #[source] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseFailed(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),

    #[error("No config directory available, set XDG_CONFIG_HOME or HOME")]
    ConfigPathUnavailable,

    #[error("Invalid value for {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("Check interval of {}s is below the minimum of {}s", .0, MIN_INTERVAL_SECONDS)]
    IntervalTooShort(u64),

    #[error(
        "Request timeout of {}ms is outside {}..={}ms",
        .0,
        MIN_REQUEST_TIMEOUT_MS,
        MAX_REQUEST_TIMEOUT_MS
    )]
    TimeoutOutOfRange(u64),

    #[error("Max concurrency must be at least 1")]
    ZeroConcurrency,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub monitoring: MonitoringConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Time between sweep starts
    pub interval_seconds: u64,
    /// Per-request timeout, also the slow threshold
    pub request_timeout_ms: u64,
    /// Checks in flight at once within a sweep
    pub max_concurrency: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: path::PathBuf,
    pub pool_size: usize,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self { interval_seconds: 300, request_timeout_ms: 5000, max_concurrency: 32 }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "uptrack.db".into(), pool_size: 8 }
    }
}

impl MonitoringConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/uptrack/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("uptrack/config.toml"))
}

fn parse_env<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    if let Ok(parsed) = value.trim().parse() {
        return Ok(parsed);
    }
    Err(ConfigError::InvalidEnv { name, value })
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Configuration:")?;
        write_title_1(f, "Monitoring")?;
        write_1(f, "Check Interval (s)", &self.monitoring.interval_seconds)?;
        write_1(f, "Request Timeout (ms)", &self.monitoring.request_timeout_ms)?;
        write_1(f, "Max Concurrency", &self.monitoring.max_concurrency)?;
        write_title_1(f, "Database")?;
        write_1(f, "Path", &self.database.path.display())?;
        write_1(f, "Pool Size", &self.database.pool_size)?;

        Ok(())
    }
}

impl Config {
    /// Load the config file, apply environment overrides and validate.
    ///
    /// A configuration that fails validation is fatal: the caller should not
    /// start the scheduler with it.
    pub fn load(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let mut config = Self::from_config(optional_path)?;
        config.apply_env_overrides(|name| env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/uptrack/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|err| ConfigError::ReadFailed(config_path.clone(), err))?;
            Ok(toml::from_str(raw_string.as_str())?)
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| ConfigError::WriteFailed(path.to_path_buf(), err))?;
        }

        fs::write(path, config_str).map_err(|err| ConfigError::WriteFailed(path.to_path_buf(), err))
    }

    /// Override file values with `CHECK_INTERVAL_SECONDS`, `REQUEST_TIMEOUT_MS`,
    /// `MAX_CONCURRENCY` and `DB_PATH` as returned by `lookup`
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup("CHECK_INTERVAL_SECONDS") {
            self.monitoring.interval_seconds = parse_env("CHECK_INTERVAL_SECONDS", value)?;
        }
        if let Some(value) = lookup("REQUEST_TIMEOUT_MS") {
            self.monitoring.request_timeout_ms = parse_env("REQUEST_TIMEOUT_MS", value)?;
        }
        if let Some(value) = lookup("MAX_CONCURRENCY") {
            self.monitoring.max_concurrency = parse_env("MAX_CONCURRENCY", value)?;
        }
        if let Some(value) = lookup("DB_PATH") {
            self.database.path = value.into();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let monitoring = &self.monitoring;
        if monitoring.interval_seconds < MIN_INTERVAL_SECONDS {
            return Err(ConfigError::IntervalTooShort(monitoring.interval_seconds));
        }
        if !(MIN_REQUEST_TIMEOUT_MS..=MAX_REQUEST_TIMEOUT_MS).contains(&monitoring.request_timeout_ms) {
            return Err(ConfigError::TimeoutOutOfRange(monitoring.request_timeout_ms));
        }
        if monitoring.max_concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        Ok(())
    }
}
