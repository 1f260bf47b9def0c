//! Configuration file integration tests

use hidhub::{parse_usb_id, Config, ConfigError};
use std::time::Duration;

#[test]
fn test_save_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = Config::default();
    config.device.vendor_id = parse_usb_id("0x046d").unwrap();
    config.device.product_id = parse_usb_id("0xc31c").unwrap();
    config.heartbeat.reload = 5;
    config.save_to(&path).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded, config);

    let settings = loaded.session_settings().unwrap();
    assert_eq!(settings.vendor_id, 0x046d);
    assert_eq!(settings.heartbeat.map(|(_, reload)| reload.get()), Some(5));
}

#[test]
fn test_load_hand_written_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[device]
vendor_id = 0x046d
product_id = 0xc31c

[heartbeat]
reload = 0

[capture]
report_interval_ms = 250
max_reports = 10
led = "num_lock"
"#,
    )
    .unwrap();

    let settings = Config::load_from(&path).unwrap().session_settings().unwrap();
    assert_eq!(settings.product_id, 0xc31c);
    assert!(settings.heartbeat.is_none());
    assert_eq!(settings.plan.report_interval, Duration::from_millis(250));
    assert_eq!(settings.plan.max_reports, 10);
    assert_eq!(settings.plan.led, hidhub::hid::Led::NumLock);
}

#[test]
fn test_malformed_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[device]\nvendor_id = \"logitech\"\n").unwrap();

    let err = Config::load_from(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to parse config file"));
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(Config::load_from(&dir.path().join("absent.toml")).is_err());
}

#[test]
fn test_ids_are_required() {
    let mut config = Config::default();
    config.device.vendor_id = 0x046d;
    assert!(matches!(
        config.session_settings(),
        Err(ConfigError::MissingProductId)
    ));
}
