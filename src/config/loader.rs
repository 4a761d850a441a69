//! Configuration loading from files.

use std::fs;
use std::path::Path;

use crate::error::{ConfigError, Error, Result};

use super::SystemConfig;

/// Load configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
///
/// # Example
///
/// ```rust,ignore
/// use palletizer_motion::load_config;
///
/// let config = load_config("palletizer.toml")?;
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<SystemConfig> {
    let content = fs::read_to_string(path.as_ref())
        .map_err(|e| Error::Config(ConfigError::IoError(e.to_string())))?;

    parse_config(&content)
}

/// Parse configuration from a TOML string.
///
/// # Errors
///
/// Returns an error if the TOML is invalid or fails validation.
pub fn parse_config(content: &str) -> Result<SystemConfig> {
    let config: SystemConfig = toml::from_str(content)
        .map_err(|e| Error::Config(ConfigError::ParseError(e.message().to_string())))?;

    // Validate the configuration
    super::validation::validate_config(&config)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config() {
        let config = parse_config("").unwrap();
        assert_eq!(config, SystemConfig::default());
    }

    #[test]
    fn test_parse_partial_sections() {
        let toml = r#"
[planner]
default_speed = 1200.0

[bridge]
address = "10.0.0.5:9000"
command_timeout_ms = 2500
"#;

        let config = parse_config(toml).unwrap();
        assert_eq!(config.planner.default_speed, 1200.0);
        assert_eq!(config.planner.default_accel, 500.0);
        assert_eq!(config.bridge.address, "10.0.0.5:9000");
        assert_eq!(config.bridge.command_timeout_ms, 2500);
        assert_eq!(config.bridge.event_capacity, 256);
        assert_eq!(config.queue.max_retries, 3);
    }

    #[test]
    fn test_parse_rejects_bad_toml() {
        let result = parse_config("[planner\ndefault_speed = 1");
        assert!(matches!(result, Err(Error::Config(ConfigError::ParseError(_)))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config("/nonexistent/palletizer.toml");
        assert!(matches!(result, Err(Error::Config(ConfigError::IoError(_)))));
    }
}
