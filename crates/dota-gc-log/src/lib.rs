//! Structured logging for the GC client.
//!
//! Provides filterable logging via the `tracing` ecosystem: console output
//! with uptime timestamps and module paths, plus JSON file logging in debug
//! builds so a bot's GC traffic can be inspected after the fact.

use std::path::Path;
use std::sync::Mutex;

use dota_gc_config::Config;
use tracing::Subscriber;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when no config (or an empty level) is supplied.
pub const DEFAULT_FILTER: &str = "info";

/// Name of the JSON log file written in debug builds.
pub const LOG_FILE_NAME: &str = "dota-gc.log";

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level. In debug builds, when the
/// config names a `log_dir`, JSON lines are also written to
/// [`LOG_FILE_NAME`] inside it. Calling this twice panics inside
/// `tracing-subscriber`, so hosts should call it once at startup.
///
/// ```no_run
/// use dota_gc_config::Config;
/// use dota_gc_log::init_logging;
///
/// let config = Config::default();
/// init_logging(cfg!(debug_assertions), Some(&config));
/// ```
pub fn init_logging(debug_build: bool, config: Option<&Config>) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(config)));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if debug_build
        && let Some(log_dir) = config.and_then(|c| c.debug.log_dir.as_deref())
        && let Ok(file_layer) = json_file_layer(log_dir)
    {
        subscriber.with(file_layer).init();
        return;
    }

    subscriber.init();
}

/// The filter directive derived from config, falling back to [`DEFAULT_FILTER`].
pub fn filter_directive(config: Option<&Config>) -> String {
    match config {
        Some(config) if !config.debug.log_level.is_empty() => config.debug.log_level.clone(),
        _ => DEFAULT_FILTER.to_string(),
    }
}

/// Create an `EnvFilter` with the default filter string.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}

/// A JSON-lines layer writing to `log_dir/dota-gc.log`.
pub fn json_file_layer<S>(log_dir: &Path) -> std::io::Result<impl Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    std::fs::create_dir_all(log_dir)?;
    let log_file = std::fs::File::create(log_dir.join(LOG_FILE_NAME))?;

    Ok(fmt::layer()
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .with_target(true)
        .with_timer(fmt::time::uptime())
        .json())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_level() {
        let filter = default_env_filter();
        assert!(format!("{}", filter).contains("info"));
    }

    #[test]
    fn test_filter_directive_from_config() {
        let mut config = Config::default();
        config.debug.log_level = "warn,dota_gc=trace".to_string();
        assert_eq!(filter_directive(Some(&config)), "warn,dota_gc=trace");
    }

    #[test]
    fn test_filter_directive_fallbacks() {
        assert_eq!(filter_directive(None), DEFAULT_FILTER);

        let mut config = Config::default();
        config.debug.log_level.clear();
        assert_eq!(filter_directive(Some(&config)), DEFAULT_FILTER);
    }

    #[test]
    fn test_env_filter_parsing() {
        let valid_filters = ["info", "debug,dota_gc=trace", "warn,dota_gc::routing=debug"];

        for filter_str in &valid_filters {
            let result = EnvFilter::try_from(*filter_str);
            assert!(result.is_ok(), "Failed to parse filter: {}", filter_str);
        }
    }

    #[test]
    fn test_json_file_layer_writes_lines() {
        let temp_dir = tempfile::tempdir().unwrap();
        let layer = json_file_layer(temp_dir.path()).unwrap();
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(msg_type = 4004u32, "Received client welcome");
        });

        let contents = std::fs::read_to_string(temp_dir.path().join(LOG_FILE_NAME)).unwrap();
        let line = contents.lines().next().expect("one log line");
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(value["level"], "INFO");
        assert_eq!(value["fields"]["message"], "Received client welcome");
        assert_eq!(value["fields"]["msg_type"], 4004);
    }
}
