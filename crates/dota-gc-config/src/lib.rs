//! Settings for the Dota 2 Game Coordinator client.
//!
//! Settings persist as RON. A host bot can flatten [`GcArgs`] into its own
//! clap parser and let [`Config::from_args`] do the rest.

mod cli;
mod config;
mod error;

pub use cli::GcArgs;
pub use config::{CONFIG_FILE, Config, DebugConfig, GcConfig, default_config_dir};
pub use error::ConfigError;
