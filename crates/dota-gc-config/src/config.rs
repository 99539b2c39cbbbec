//! Client settings and their on-disk form.
//!
//! Everything lives in one RON document, `dota-gc.ron`. Missing sections and
//! fields fall back to [`Default`], unknown ones are ignored, so an old file
//! keeps loading after new knobs appear.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Name of the settings file inside the config directory.
pub const CONFIG_FILE: &str = "dota-gc.ron";

/// The whole settings document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// GC session timing and identity.
    pub gc: GcConfig,
    /// Logging settings.
    pub debug: DebugConfig,
}

/// Game Coordinator session settings.
///
/// The GC is unreliable about answering the first hello, so the client keeps
/// knocking. These values control how hard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GcConfig {
    /// Steam app id announced as "running". Dota 2 is 570.
    pub app_id: u32,
    /// Period of the hello retry loop after `launch`, in milliseconds.
    pub hello_interval_ms: u64,
    /// Delay of the extra hello sent shortly after `launch`, in milliseconds.
    pub hello_initial_delay_ms: u64,
    /// Period of the hello retry loop while recovering a lost session.
    pub recovery_interval_ms: u64,
    /// Unanswered hellos tolerated before a hello-timeout notification.
    pub hello_timeout_threshold: u32,
}

/// Logging and diagnostics settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Also write JSON log lines to a file in this directory.
    pub log_dir: Option<PathBuf>,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            app_id: 570,
            hello_interval_ms: 6000,
            hello_initial_delay_ms: 1000,
            recovery_interval_ms: 5000,
            hello_timeout_threshold: 10,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            log_dir: None,
        }
    }
}

impl GcConfig {
    /// Period of the hello retry loop.
    pub fn hello_interval(&self) -> Duration {
        Duration::from_millis(self.hello_interval_ms)
    }

    /// Delay of the early hello after launch.
    pub fn hello_initial_delay(&self) -> Duration {
        Duration::from_millis(self.hello_initial_delay_ms)
    }

    /// Period of the hello loop while recovering.
    pub fn recovery_interval(&self) -> Duration {
        Duration::from_millis(self.recovery_interval_ms)
    }

    /// Reject values the retry loops cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason| Err(ConfigError::Invalid { field, reason });
        if self.app_id == 0 {
            return invalid("app_id", "must name a Steam app");
        }
        if self.hello_interval_ms == 0 {
            return invalid("hello_interval_ms", "must be positive");
        }
        if self.recovery_interval_ms == 0 {
            return invalid("recovery_interval_ms", "must be positive");
        }
        if self.hello_timeout_threshold == 0 {
            return invalid("hello_timeout_threshold", "must be at least 1");
        }
        Ok(())
    }
}

/// Platform config directory for the client (`<config_dir>/dota-gc`).
pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("dota-gc"))
        .ok_or(ConfigError::NoConfigDir)
}

fn read_file(path: &Path) -> Result<Config, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    ron::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl Config {
    /// Read `dota-gc.ron` from `dir`. A missing file is written out with
    /// defaults first so users have something to edit.
    pub fn load_or_create(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            let config = Self::default();
            config.save(dir)?;
            log::info!("Wrote default GC config to {}", path.display());
            return Ok(config);
        }

        let config = read_file(&path)?;
        config.gc.validate()?;
        log::info!("Loaded GC config from {}", path.display());
        Ok(config)
    }

    /// Write `dota-gc.ron` into `dir`, creating the directory if needed.
    pub fn save(&self, dir: &Path) -> Result<(), ConfigError> {
        let path = dir.join(CONFIG_FILE);
        let write_err = |source| ConfigError::Write {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(dir).map_err(write_err)?;
        let text = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::new().depth_limit(2))?;
        fs::write(&path, text).map_err(write_err)
    }

    /// Re-read the file. `Ok(None)` means nothing changed.
    pub fn reload(&self, dir: &Path) -> Result<Option<Self>, ConfigError> {
        let fresh = read_file(&dir.join(CONFIG_FILE))?;
        if fresh == *self {
            return Ok(None);
        }
        fresh.gc.validate()?;
        log::info!("GC config changed on disk");
        Ok(Some(fresh))
    }
}
