//! Process-level execution settings
//!
//! Settings are resolved once (CLI flag > environment > settings file > default)
//! and then passed by reference to every invocation. Nothing in the executor
//! reads ambient process state on its own.

use crate::errors::{ConfigError, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Environment variable selecting mock execution mode
pub const MOCK_MODE_ENV: &str = "DOCKCALL_MOCK_MODE";

/// Environment variable overriding the container runtime binary
pub const RUNTIME_ENV: &str = "DOCKCALL_RUNTIME";

/// Container path the working directory is mounted at
pub const DEFAULT_MOUNT_POINT: &str = "/data";

/// Settings applied to every invocation run by an executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Skip the container runtime and synthesize declared outputs
    pub mock: bool,
    /// Container runtime CLI binary path (e.g., "docker" or "podman")
    pub runtime_path: String,
    /// Container-side mount point of the working directory
    pub mount_point: String,
    /// Value for `--log-driver`; `None` omits the flag
    pub log_driver: Option<String>,
    /// Host shell used to run piped commands
    pub host_shell: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mock: false,
            runtime_path: "docker".to_string(),
            mount_point: DEFAULT_MOUNT_POINT.to_string(),
            log_driver: Some("none".to_string()),
            host_shell: "bash".to_string(),
        }
    }
}

/// On-disk settings file, every field optional
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SettingsFile {
    pub mock: Option<bool>,
    pub runtime_path: Option<String>,
    pub mount_point: Option<String>,
    pub log_driver: Option<String>,
    pub host_shell: Option<String>,
}

impl SettingsFile {
    /// Parse a TOML settings document
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            ConfigError::Parsing {
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Load a TOML settings file from disk
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading settings from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::parse(&content)
    }
}

/// Explicit overrides, typically from command-line flags
#[derive(Debug, Default, Clone)]
pub struct SettingsOverrides {
    pub mock: Option<bool>,
    pub runtime_path: Option<String>,
}

impl Settings {
    /// Resolve settings from overrides, the process environment, and an optional file
    pub fn resolve(overrides: SettingsOverrides, file: Option<SettingsFile>) -> Result<Self> {
        Self::resolve_with_env(overrides, file, |name| std::env::var(name).ok())
    }

    /// Resolve settings with an injectable environment lookup
    pub fn resolve_with_env<F>(
        overrides: SettingsOverrides,
        file: Option<SettingsFile>,
        env: F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = file.unwrap_or_default();
        let defaults = Settings::default();

        let env_mock = match env(MOCK_MODE_ENV) {
            Some(raw) => Some(parse_flag(MOCK_MODE_ENV, &raw)?),
            None => None,
        };

        let settings = Settings {
            mock: overrides.mock.or(env_mock).or(file.mock).unwrap_or(false),
            runtime_path: overrides
                .runtime_path
                .or_else(|| env(RUNTIME_ENV).filter(|v| !v.trim().is_empty()))
                .or(file.runtime_path)
                .unwrap_or(defaults.runtime_path),
            mount_point: file.mount_point.unwrap_or(defaults.mount_point),
            log_driver: match file.log_driver {
                Some(driver) if driver.is_empty() => None,
                Some(driver) => Some(driver),
                None => defaults.log_driver,
            },
            host_shell: file.host_shell.unwrap_or(defaults.host_shell),
        };

        debug!(
            mock = settings.mock,
            runtime = %settings.runtime_path,
            "Resolved execution settings"
        );
        Ok(settings)
    }

    /// Copy of these settings with mock mode switched on or off
    pub fn with_mock(mut self, mock: bool) -> Self {
        self.mock = mock;
        self
    }

    /// Copy of these settings pointing at another runtime binary
    pub fn with_runtime_path(mut self, runtime_path: impl Into<String>) -> Self {
        self.runtime_path = runtime_path.into();
        self
    }
}

/// Interpret a mock-mode flag value: integers (non-zero is on) or booleans
fn parse_flag(name: &str, raw: &str) -> Result<bool> {
    let value = raw.trim();
    if value.is_empty() {
        return Ok(false);
    }
    if let Ok(n) = value.parse::<i64>() {
        return Ok(n != 0);
    }
    match value.to_lowercase().as_str() {
        "true" | "yes" | "on" => Ok(true),
        "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name: name.to_string(),
            value: raw.to_string(),
        }
        .into()),
    }
}
