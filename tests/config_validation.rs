//! Integration tests for configuration validation

#![allow(clippy::expect_used)]

use cubesat_link::config::{FramerConfig, LoggingConfig, SatelliteConfig};
use cubesat_link::error::ProtocolError;
use cubesat_link::transport::Modulation;
use serde_json::json;
use std::time::Duration;

fn valid_config() -> SatelliteConfig {
    SatelliteConfig::default_with_overrides(|config| {
        config.cubesat_name = "Orbiter".to_string();
        config.super_secret_code = "hunter2".to_string();
        config.radio.license = "KK4XYZ".to_string();
    })
}

#[test]
fn test_configured_defaults_validate() {
    let errors = valid_config().validate();
    assert!(
        errors.is_empty(),
        "Configured defaults should be valid, but got errors: {:?}",
        errors
    );
}

#[test]
fn test_bare_default_needs_secret_and_license() {
    let errors = SatelliteConfig::default().validate();
    assert!(errors.iter().any(|e| e.contains("super_secret_code")));
    assert!(errors.iter().any(|e| e.contains("license")));
    assert!(SatelliteConfig::default().validate_strict().is_err());
}

#[test]
fn test_name_too_long() {
    let mut config = valid_config();
    config.cubesat_name = "ExtremelyLongName".to_string();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("cubesat_name")));
}

#[test]
fn test_out_of_range_radio_values() {
    let mut config = valid_config();
    config.radio.transmit_frequency = 500.0;
    config.radio.lora.spreading_factor = 13;
    config.radio.lora.transmit_power = 30;
    config.radio.fsk.modulation_type = 2;

    let errors = config.validate();
    assert_eq!(errors.len(), 4, "got: {:?}", errors);
    for key in [
        "transmit_frequency",
        "spreading_factor",
        "transmit_power",
        "modulation_type",
    ] {
        assert!(errors.iter().any(|e| e.contains(key)), "missing {key}");
    }
}

#[test]
fn test_915_mhz_band_is_allowed() {
    let mut config = valid_config();
    config.radio.transmit_frequency = 915.0;
    assert!(config.validate().is_empty());
}

#[test]
fn test_framer_timing_validation() {
    let framer = FramerConfig {
        send_delay: Duration::from_secs(10),
        listen_timeout: Duration::ZERO,
        poll_interval: Duration::ZERO,
    };
    let errors = framer.validate();
    assert!(errors.iter().any(|e| e.contains("Send delay too long")));
    assert!(errors.iter().any(|e| e.contains("greater than 0")));

    let framer = FramerConfig {
        poll_interval: Duration::from_secs(20),
        ..FramerConfig::default()
    };
    assert!(framer
        .validate()
        .iter()
        .any(|e| e.contains("Poll interval")));
}

#[test]
fn test_empty_app_name() {
    let logging = LoggingConfig {
        app_name: String::new(),
        ..LoggingConfig::default()
    };
    assert!(logging.validate().iter().any(|e| e.contains("cannot be empty")));
}

#[test]
fn test_validate_key() {
    let config = valid_config();
    assert!(config.validate_key("coding_rate", &json!(5)).is_ok());
    assert!(config.validate_key("ack_delay", &json!(1.25)).is_ok());
    assert!(matches!(
        config.validate_key("coding_rate", &json!(9)),
        Err(ProtocolError::ValidationError { .. })
    ));
    assert!(matches!(
        config.validate_key("cyclic_redundancy_check", &json!("yes")),
        Err(ProtocolError::ValidationError { .. })
    ));
    assert!(matches!(
        config.validate_key("hyperdrive", &json!(1)),
        Err(ProtocolError::ConfigError(_))
    ));
}

#[test]
fn test_update_config_nested_keys() {
    let mut config = valid_config();
    config
        .update_config("node_address", json!(42), true)
        .expect("fsk update");
    config
        .update_config("transmit_power", json!(20), true)
        .expect("lora update");
    config
        .update_config("cubesat_name", json!("Nova"), true)
        .expect("root update");

    assert_eq!(config.radio.fsk.node_address, 42);
    assert_eq!(config.radio.lora.transmit_power, 20);
    assert_eq!(config.cubesat_name, "Nova");
}

#[test]
fn test_rejected_update_changes_nothing() {
    let mut config = valid_config();
    assert!(config
        .update_config("spreading_factor", json!(99), true)
        .is_err());
    assert_eq!(config.radio.lora.spreading_factor, 8);
}

#[test]
fn test_temporary_update_leaves_file_alone() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.json");
    valid_config().save_to_file(&path).expect("save");

    let mut config = SatelliteConfig::from_file(&path).expect("load");
    config
        .update_config("modulation", json!("FSK"), true)
        .expect("temporary update");
    assert_eq!(config.radio.modulation, Modulation::Fsk);

    let on_disk = SatelliteConfig::from_file(&path).expect("reload");
    assert_eq!(on_disk.radio.modulation, Modulation::LoRa);

    config
        .update_config("modulation", json!("FSK"), false)
        .expect("persistent update");
    let on_disk = SatelliteConfig::from_file(&path).expect("reload");
    assert_eq!(on_disk.radio.modulation, Modulation::Fsk);
    assert_eq!(on_disk.path(), Some(path.as_path()));
}

#[test]
fn test_json_round_trip() {
    let config = valid_config();
    let json = SatelliteConfig::example_config();
    assert!(json.contains("\"modulation\": \"LoRa\""));

    let mut parsed = SatelliteConfig::from_json(&json).expect("parse example");
    parsed.super_secret_code = config.super_secret_code.clone();
    assert_eq!(parsed.framer.send_delay, Duration::from_millis(200));
    assert_eq!(parsed.command.listen_timeout, Duration::from_secs(10));
}

#[test]
fn test_invalid_json_is_config_error() {
    assert!(matches!(
        SatelliteConfig::from_json("{\"cubesat_name\": 5}"),
        Err(ProtocolError::ConfigError(_))
    ));
    assert!(matches!(
        SatelliteConfig::from_file("/nonexistent/config.json"),
        Err(ProtocolError::ConfigError(_))
    ));
}

#[test]
fn test_minimal_json_uses_defaults() {
    let config = SatelliteConfig::from_json(
        r#"{
            "cubesat_name": "Orbiter",
            "super_secret_code": "hunter2",
            "radio": {
                "license": "KK4XYZ",
                "modulation": "FSK",
                "transmit_frequency": 437.4
            }
        }"#,
    )
    .expect("minimal config");

    assert_eq!(config.radio.modulation, Modulation::Fsk);
    assert_eq!(config.radio.lora.coding_rate, 8);
    assert_eq!(config.framer.poll_interval, Duration::ZERO);
    assert!(config.jokes.is_empty());
    assert!(config.validate().is_empty());
}

#[test]
fn test_flight_computer_keys_are_not_updatable() {
    let mut config = valid_config();
    for key in ["sleep_duration", "detumble_enable_z", "turbo_clock", "repeat_code"] {
        assert!(
            matches!(
                config.update_config(key, json!(1), true),
                Err(ProtocolError::ConfigError(ref msg)) if msg.contains("Unknown configuration key")
            ),
            "{key} should be rejected"
        );
    }
}
