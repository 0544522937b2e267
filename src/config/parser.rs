//! Configuration file parsing (HOCON format).

use std::path::Path;

use crate::common::error::ConfigError;
use crate::config::types::Config;
use hocon::HoconLoader;

/// Load configuration from a HOCON file.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();

    HoconLoader::new()
        .load_file(path)
        .map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
        })?
        .resolve()
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })
}

/// Load configuration from a HOCON string.
pub fn load_config_str(content: &str) -> Result<Config, ConfigError> {
    HoconLoader::new()
        .load_str(content)
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?
        .resolve()
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_fills_defaults() {
        let config = load_config_str(
            r#"
            thingsboard { host = "tb.local" }
            chirpstack {
                mqtt_host = "cs.local"
                api_server = "cs.local:8080"
                api_key = "secret"
            }
            "#,
        )
        .unwrap();

        assert_eq!(config.http.port, 3000);
        assert_eq!(config.thingsboard.host, "tb.local");
        assert_eq!(config.thingsboard.port, 1883);
        assert_eq!(config.chirpstack.mqtt_port, 1883);
        assert_eq!(config.ports.uplink, 105);
        assert_eq!(config.ports.downlink, 15);
    }

    #[test]
    fn test_explicit_values_override_defaults() {
        let config = load_config_str(
            r#"
            http { port = 8080 }
            thingsboard { host = "tb.local", port = 8883 }
            chirpstack {
                mqtt_host = "cs.local"
                api_server = "cs.local:8080"
                api_key = "secret"
            }
            ports { uplink = 10, downlink = 20 }
            "#,
        )
        .unwrap();

        assert_eq!(config.http.port, 8080);
        assert_eq!(config.thingsboard.port, 8883);
        assert_eq!(config.ports.uplink, 10);
        assert_eq!(config.ports.downlink, 20);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = load_config("/nonexistent/lorabridge.conf");
        assert!(matches!(result, Err(ConfigError::IoError { .. })));
    }
}
