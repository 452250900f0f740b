//! TOML configuration file loading.
//!
//! The file is optional; when given it is read once at startup and overlaid on
//! [`ServerConfig::default`].  Missing keys keep their defaults.
//!
//! ```toml
//! bind_addr = "0.0.0.0:3000"
//! adb_path = "adb"
//! frame_interval_ms = 100
//! probe_timeout_ms = 1000
//! scan_ports = [5555]
//! event_buffer = 64
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::config::ServerConfig;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but cannot be used.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Reads and validates the config file at `path`.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file is unreadable, not valid TOML, or
/// fails [`validate`].
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config(&text)?;
    validate(&config)?;
    Ok(config)
}

pub fn parse_config(text: &str) -> Result<ServerConfig, ConfigError> {
    Ok(toml::from_str(text)?)
}

/// Rejects settings the server cannot run with.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] naming the offending field.
pub fn validate(config: &ServerConfig) -> Result<(), ConfigError> {
    if config.adb_path.trim().is_empty() {
        return Err(ConfigError::Invalid("adb_path must not be empty".to_string()));
    }
    if config.frame_interval_ms == 0 {
        return Err(ConfigError::Invalid(
            "frame_interval_ms must be at least 1".to_string(),
        ));
    }
    if config.probe_timeout_ms == 0 {
        return Err(ConfigError::Invalid(
            "probe_timeout_ms must be at least 1".to_string(),
        ));
    }
    if config.scan_ports.is_empty() || config.scan_ports.contains(&0) {
        return Err(ConfigError::Invalid(
            "scan_ports must list at least one non-zero port".to_string(),
        ));
    }
    if config.event_buffer == 0 {
        return Err(ConfigError::Invalid("event_buffer must be at least 1".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/droid-remote.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/droid-remote.toml"));
    }

    #[test]
    fn test_load_reads_file_from_disk() {
        // Arrange
        let path = std::env::temp_dir().join(format!("droid-remote-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "adb_path = \"/opt/adb\"\nscan_ports = [5555, 5037]\n").unwrap();

        // Act
        let result = load_config(&path);
        std::fs::remove_file(&path).unwrap();

        // Assert
        let cfg = result.unwrap();
        assert_eq!(cfg.adb_path, "/opt/adb");
        assert_eq!(cfg.scan_ports, vec![5555, 5037]);
        assert_eq!(cfg.frame_interval_ms, 100);
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = parse_config("bind_addr = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_wrong_type_is_parse_error() {
        let err = parse_config("frame_interval_ms = \"fast\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_zero_event_buffer_is_invalid() {
        let cfg = ServerConfig {
            event_buffer: 0,
            ..ServerConfig::default()
        };
        let err = validate(&cfg).unwrap_err();
        assert_eq!(err.to_string(), "invalid config: event_buffer must be at least 1");
    }

    #[test]
    fn test_empty_port_list_is_invalid() {
        let cfg = ServerConfig {
            scan_ports: vec![],
            ..ServerConfig::default()
        };
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_frame_interval_is_invalid() {
        let cfg = ServerConfig {
            frame_interval_ms: 0,
            ..ServerConfig::default()
        };
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }
}
