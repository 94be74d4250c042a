//! Configuration loading and validation.

use corvus_switch_lib::config::{load_from_path, ClassifierConfig, SwitchModeConfig};
use corvus_switch_lib::CacheKind;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn loads_minimal_config() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut file = NamedTempFile::new()?;
    writeln!(
        file,
        r#"
bridge = "br-test"
dpid = 42
"#
    )?;

    let cfg = load_from_path(file.path())?;
    assert_eq!(cfg.bridge, "br-test");
    assert_eq!(cfg.dpid, 42);
    assert_eq!(cfg.mode, SwitchModeConfig::Openflow);
    assert_eq!(cfg.classifier, ClassifierConfig::Flowinfo);
    assert!(cfg.cache.enabled);
    assert_eq!(cfg.updater.mbtree_debounce_ms, 1000);
    assert_eq!(cfg.updater.thtable_debounce_ms, 2000);
    assert!(!cfg.pbb_is_vlan);
    Ok(())
}

#[test]
fn loads_full_config() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut file = NamedTempFile::new()?;
    writeln!(
        file,
        r#"
bridge = "br0"
dpid = 7
mode = "secure"
classifier = "mbtree"
pbb_is_vlan = true

[cache]
enabled = true
kind = "single_writer"

[updater]
mbtree_debounce_ms = 500
thtable_debounce_ms = 1500

[logging]
level = "debug"
show_target = true
"#
    )?;

    let cfg = load_from_path(file.path())?;
    assert_eq!(cfg.mode, SwitchModeConfig::Secure);
    assert_eq!(cfg.classifier, ClassifierConfig::Mbtree);
    assert_eq!(cfg.cache.kind, CacheKind::SingleWriter);
    assert_eq!(cfg.updater.mbtree_debounce_ms, 500);
    assert!(cfg.pbb_is_vlan);
    assert_eq!(cfg.logging.level, "debug");
    assert!(cfg.logging.show_target);
    Ok(())
}

#[test]
fn rejects_zero_debounce() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut file = NamedTempFile::new()?;
    writeln!(
        file,
        r#"
[updater]
mbtree_debounce_ms = 0
thtable_debounce_ms = 1000
"#
    )?;
    assert!(load_from_path(file.path()).is_err());
    Ok(())
}

#[test]
fn rejects_unknown_classifier() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut file = NamedTempFile::new()?;
    writeln!(file, r#"classifier = "quantum""#)?;
    assert!(load_from_path(file.path()).is_err());
    Ok(())
}
