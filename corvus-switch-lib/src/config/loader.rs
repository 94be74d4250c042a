use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::error::{DpError, Result};

pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let txt = fs::read_to_string(p)
        .map_err(|e| DpError::Config(format!("Failed to read config file: {e}")))?;
    let cfg: Config = toml::from_str(&txt)
        .map_err(|e| DpError::Config(format!("Failed to parse config: {e}")))?;

    validate_config(&cfg)?;

    Ok(cfg)
}

fn validate_config(cfg: &Config) -> Result<()> {
    if cfg.bridge.is_empty() {
        return Err(DpError::Config("bridge name must not be empty".to_string()));
    }
    if cfg.updater.mbtree_debounce_ms == 0 || cfg.updater.thtable_debounce_ms == 0 {
        return Err(DpError::Config(
            "updater debounce intervals must be non-zero".to_string(),
        ));
    }
    Ok(())
}
