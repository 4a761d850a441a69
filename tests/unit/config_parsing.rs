//! Unit tests for TOML configuration parsing.

use std::io::Write;

use palletizer_motion::config::{load_config, parse_config, SystemConfig};

const FULL_CONFIG: &str = r#"
[compiler]
max_call_depth = 8
max_expanded_commands = 5000

[planner]
default_speed = 1200.0
default_accel = 400.0

[queue]
max_retries = 5

[bridge]
address = "192.168.1.40:7070"
command_timeout_ms = 3000
timeout_duration_factor = 1.5
reconnect_interval_ms = 500
optimize_interval_ms = 250
event_capacity = 64
"#;

/// Test parsing every section.
#[test]
fn test_parse_full_config() {
    let config = parse_config(FULL_CONFIG).expect("Failed to parse config");

    assert_eq!(config.compiler.max_call_depth, 8);
    assert_eq!(config.compiler.max_expanded_commands, 5000);
    assert_eq!(config.planner.default_speed, 1200.0);
    assert_eq!(config.planner.default_accel, 400.0);
    assert_eq!(config.queue.max_retries, 5);
    assert_eq!(config.bridge.address, "192.168.1.40:7070");
    assert_eq!(config.bridge.timeout_duration_factor, 1.5);
    assert_eq!(config.bridge.event_capacity, 64);
}

/// Test that omitted sections fall back to defaults.
#[test]
fn test_defaults() {
    let config: SystemConfig = toml::from_str("[queue]\nmax_retries = 1\n").expect("Failed to parse TOML");
    let defaults = SystemConfig::default();

    assert_eq!(config.queue.max_retries, 1);
    assert_eq!(config.planner, defaults.planner);
    assert_eq!(config.bridge, defaults.bridge);
    assert_eq!(defaults.planner.default_speed, 1000.0);
    assert_eq!(defaults.planner.default_accel, 500.0);
    assert_eq!(defaults.bridge.command_timeout_ms, 5000);
}

/// Test the derived timeout policy.
#[test]
fn test_timeout_policy() {
    let config = parse_config(FULL_CONFIG).unwrap();
    // 3000 + ceil(1234 * 1.5)
    assert_eq!(config.bridge.timeout_for(1234), 3000 + 1851);
    assert_eq!(config.bridge.timeout_for(0), 3000);
    assert_eq!(config.bridge.reconnect_interval().as_millis(), 500);
}

/// Test loading from a file on disk.
#[test]
fn test_load_config_from_file() {
    let path = std::env::temp_dir().join(format!(
        "palletizer-motion-config-{}.toml",
        std::process::id()
    ));
    {
        let mut file = std::fs::File::create(&path).expect("create temp config");
        file.write_all(FULL_CONFIG.as_bytes()).expect("write temp config");
    }

    let config = load_config(&path);
    let _ = std::fs::remove_file(&path);

    let config = config.expect("Failed to load config");
    assert_eq!(config.bridge.optimize_interval_ms, 250);
}

/// Test that unknown value types are rejected.
#[test]
fn test_wrong_types_rejected() {
    assert!(parse_config("[queue]\nmax_retries = \"three\"\n").is_err());
    assert!(parse_config("[bridge]\ncommand_timeout_ms = -1\n").is_err());
}
