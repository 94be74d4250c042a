use serde::Deserialize;

use crate::cache::CacheKind;
use crate::flowdb::{ClassifierKind, SwitchMode};

/// Main configuration structure.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Bridge name shown in dumps and logs.
    #[serde(default = "default_bridge_name")]
    pub bridge: String,
    /// Datapath id reported to the controller.
    #[serde(default)]
    pub dpid: u64,
    /// What happens to packets no flow matches.
    #[serde(default)]
    pub mode: SwitchModeConfig,
    /// Classifier strategy for table lookups.
    #[serde(default)]
    pub classifier: ClassifierConfig,
    /// Flow cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Index rebuild scheduling.
    #[serde(default)]
    pub updater: UpdaterConfig,
    /// Compatibility switch: classify a PBB I-TAG frame as its inner
    /// VLAN-tagged frame.
    #[serde(default)]
    pub pbb_is_vlan: bool,
    /// Logging configuration (consumed by the binary).
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_bridge_name() -> String {
    "br0".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bridge: default_bridge_name(),
            dpid: 0,
            mode: SwitchModeConfig::default(),
            classifier: ClassifierConfig::default(),
            cache: CacheConfig::default(),
            updater: UpdaterConfig::default(),
            pbb_is_vlan: false,
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SwitchModeConfig {
    #[default]
    Openflow,
    Secure,
    Standalone,
}

impl From<SwitchModeConfig> for SwitchMode {
    fn from(mode: SwitchModeConfig) -> SwitchMode {
        match mode {
            SwitchModeConfig::Openflow => SwitchMode::Openflow,
            SwitchModeConfig::Secure => SwitchMode::Secure,
            SwitchModeConfig::Standalone => SwitchMode::Standalone,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierConfig {
    #[default]
    Flowinfo,
    Mbtree,
    Thtable,
}

impl From<ClassifierConfig> for ClassifierKind {
    fn from(kind: ClassifierConfig) -> ClassifierKind {
        match kind {
            ClassifierConfig::Flowinfo => ClassifierKind::Flowinfo,
            ClassifierConfig::Mbtree => ClassifierKind::Mbtree,
            ClassifierConfig::Thtable => ClassifierKind::Thtable,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct CacheConfig {
    /// Disable to classify every packet.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Backend: `concurrent`, `single_writer` or `ptree`.
    #[serde(default)]
    pub kind: CacheKind,
}

fn default_true() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig { enabled: true, kind: CacheKind::default() }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct UpdaterConfig {
    /// Debounce between a flow mod and the mbtree rebuild.
    #[serde(default = "default_mbtree_debounce")]
    pub mbtree_debounce_ms: u64,
    /// Debounce for the tuple-hash table; a separate, slower schedule.
    #[serde(default = "default_thtable_debounce")]
    pub thtable_debounce_ms: u64,
}

fn default_mbtree_debounce() -> u64 {
    1000
}

fn default_thtable_debounce() -> u64 {
    2000
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        UpdaterConfig { mbtree_debounce_ms: 1000, thtable_debounce_ms: 2000 }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level filter when RUST_LOG is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Include the module target in log lines.
    #[serde(default)]
    pub show_target: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig { level: "info".to_string(), show_target: false }
    }
}
