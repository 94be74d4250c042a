//! Datapath configuration: TOML-loaded, validated after parse.

mod loader;
mod types;

pub use loader::load_from_path;
pub use types::{CacheConfig, ClassifierConfig, Config, LoggingConfig, SwitchModeConfig, UpdaterConfig};
