use std::time::Duration;
use std::{env, fmt, fs, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read config {path}: {source}")]
    Read { path: path::PathBuf, source: std::io::Error },
    #[error("failed to write config {path}: {source}")]
    Write { path: path::PathBuf, source: std::io::Error },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("no config directory available (set XDG_CONFIG_HOME or HOME)")]
    ConfigPathUnavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseSettings,
    pub checks: CheckSettings,
    pub proxies: ProxySettings,
    pub retention: RetentionSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: String,
}

/// Knobs read by the check orchestrator at the start of every cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckSettings {
    pub auto_check: bool,
    pub limit_concurrent_checks: usize,
    pub probe_timeout_seconds: u64,
    /// Checked nodes become due again once `checked_at` is older than this
    pub stale_after_seconds: u64,
    pub interval_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    /// Newline separated proxy list
    pub url: String,
    pub refresh_interval_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionSettings {
    pub check_ttl_seconds: u64,
    pub cleanup_interval_seconds: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self { path: "chainwatch.db".into() }
    }
}

impl Default for CheckSettings {
    fn default() -> Self {
        Self {
            auto_check: true,
            limit_concurrent_checks: 10,
            probe_timeout_seconds: 5,
            stale_after_seconds: 60,
            interval_seconds: 3,
        }
    }
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self { url: "http://localhost:8000".into(), refresh_interval_seconds: 60 }
    }
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self { check_ttl_seconds: 3 * 60 * 60, cleanup_interval_seconds: 600 }
    }
}

impl CheckSettings {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_seconds)
    }

    pub fn stale_after(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.stale_after_seconds as i64)
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

/// Get default config path ($XDG_CONFIG_HOME/chainwatch/config.toml or
/// $HOME/.config/...)
pub fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("chainwatch/config.toml"))
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
        write_title_1(f, "Database")?;
        write_1(f, "Path", &self.database.path)?;
        write_title_1(f, "Checks")?;
        write_1(f, "Auto Check", &self.checks.auto_check)?;
        write_1(f, "Concurrent Limit", &self.checks.limit_concurrent_checks)?;
        write_1(f, "Probe Timeout (s)", &self.checks.probe_timeout_seconds)?;
        write_1(f, "Stale After (s)", &self.checks.stale_after_seconds)?;
        write_1(f, "Interval (s)", &self.checks.interval_seconds)?;
        write_title_1(f, "Proxies")?;
        write_1(f, "Source URL", &self.proxies.url)?;
        write_1(f, "Refresh Interval (s)", &self.proxies.refresh_interval_seconds)?;
        write_title_1(f, "Retention")?;
        write_1(f, "Check TTL (s)", &self.retention.check_ttl_seconds)?;
        write_1(f, "Cleanup Interval (s)", &self.retention.cleanup_interval_seconds)?;

        Ok(())
    }
}

impl Config {
    /// Resolve the config path: the given one (forced to `.toml`) or the default
    pub fn resolve_path(optional_path: Option<impl AsRef<path::Path>>) -> Result<path::PathBuf, Error> {
        match optional_path {
            Some(path) => Ok(normalize_toml_path(path.as_ref())),
            None => default_config_path(),
        }
    }

    /// Generate Config structure from file
    ///
    /// Creates a default config at the resolved path if none exists yet.
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path = Self::resolve_path(optional_path)?;

        if config_path.exists() {
            Self::read(&config_path)
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Read an existing config file
    pub fn read(path: &path::Path) -> Result<Self, Error> {
        let raw_string = fs::read_to_string(path)
            .map_err(|source| Error::Read { path: path.to_path_buf(), source })?;
        Ok(toml::from_str(raw_string.as_str())?)
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| Error::Write { path: path.to_path_buf(), source })?;
        }

        fs::write(path, config_str).map_err(|source| Error::Write { path: path.to_path_buf(), source })
    }
}
