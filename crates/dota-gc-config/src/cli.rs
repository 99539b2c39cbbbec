//! Command-line overrides for the GC client settings.

use std::path::PathBuf;

use clap::Args;

use crate::config::default_config_dir;
use crate::{Config, ConfigError};

/// GC client command-line arguments.
///
/// Meant to be `#[command(flatten)]`-ed into the host bot's own parser.
/// CLI values override settings loaded from `dota-gc.ron`.
#[derive(Args, Debug, Default, Clone)]
pub struct GcArgs {
    /// Steam app id to announce.
    #[arg(long)]
    pub app_id: Option<u32>,

    /// Hello retry period in milliseconds.
    #[arg(long)]
    pub hello_interval_ms: Option<u64>,

    /// Delay of the early hello after launch, in milliseconds.
    #[arg(long)]
    pub hello_initial_delay_ms: Option<u64>,

    /// Recovery retry period in milliseconds.
    #[arg(long)]
    pub recovery_interval_ms: Option<u64>,

    /// Unanswered hellos before a timeout is reported.
    #[arg(long)]
    pub hello_timeout_threshold: Option<u32>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Directory holding `dota-gc.ron` instead of the platform default.
    #[arg(long, value_name = "DIR")]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Load from the directory named by `--config` (or the platform
    /// default), then layer the remaining flags on top.
    pub fn from_args(args: &GcArgs) -> Result<Self, ConfigError> {
        let dir = match &args.config {
            Some(dir) => dir.clone(),
            None => default_config_dir()?,
        };
        let mut config = Self::load_or_create(&dir)?;
        config.apply_cli_overrides(args);
        config.gc.validate()?;
        Ok(config)
    }

    /// Overwrite every setting given on the command line.
    pub fn apply_cli_overrides(&mut self, args: &GcArgs) {
        let gc = &mut self.gc;
        gc.app_id = args.app_id.unwrap_or(gc.app_id);
        gc.hello_interval_ms = args.hello_interval_ms.unwrap_or(gc.hello_interval_ms);
        gc.hello_initial_delay_ms = args
            .hello_initial_delay_ms
            .unwrap_or(gc.hello_initial_delay_ms);
        gc.recovery_interval_ms = args.recovery_interval_ms.unwrap_or(gc.recovery_interval_ms);
        gc.hello_timeout_threshold = args
            .hello_timeout_threshold
            .unwrap_or(gc.hello_timeout_threshold);
        if let Some(level) = &args.log_level {
            self.debug.log_level.clone_from(level);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Host {
        #[command(flatten)]
        gc: GcArgs,
    }

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = GcArgs {
            hello_timeout_threshold: Some(4),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.gc.hello_timeout_threshold, 4);
        assert_eq!(config.debug.log_level, "debug");
        // Non-overridden fields retain defaults
        assert_eq!(config.gc.app_id, 570);
        assert_eq!(config.gc.hello_interval_ms, 6000);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&GcArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_flattened_into_host_parser() {
        let host = Host::parse_from(["bot", "--app-id", "730", "--recovery-interval-ms", "250"]);
        let mut config = Config::default();
        config.apply_cli_overrides(&host.gc);
        assert_eq!(config.gc.app_id, 730);
        assert_eq!(config.gc.recovery_interval_ms, 250);
    }

    #[test]
    fn test_from_args_uses_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let dir_arg = dir.path().to_str().unwrap();
        let host = Host::parse_from([
            "bot",
            "--config",
            dir_arg,
            "--hello-timeout-threshold",
            "2",
        ]);

        let config = Config::from_args(&host.gc).unwrap();
        assert_eq!(config.gc.hello_timeout_threshold, 2);
        assert!(dir.path().join(crate::CONFIG_FILE).exists());
    }

    #[test]
    fn test_from_args_rejects_zero_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let args = GcArgs {
            config: Some(dir.path().to_path_buf()),
            hello_timeout_threshold: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            Config::from_args(&args),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
