//! Configuration validation.
//!
//! Validates configuration values and provides helpful error messages.

use crate::common::error::ConfigError;
use crate::config::types::Config;

/// Validate a configuration and return detailed errors.
///
/// Runs after env overrides, so a value may satisfy a requirement from
/// either source.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    // Validate control plane config
    if config.http.port == 0 {
        errors.push("http.port must be non-zero".to_string());
    }

    // Validate ThingsBoard config
    if config.thingsboard.host.is_empty() {
        errors.push(
            "thingsboard.host is required (or set LORABRIDGE_THINGSBOARD_HOST)".to_string(),
        );
    }
    if config.thingsboard.port == 0 {
        errors.push("thingsboard.port must be non-zero".to_string());
    }

    // Validate ChirpStack config
    if config.chirpstack.mqtt_host.is_empty() {
        errors.push(
            "chirpstack.mqtt_host is required (or set LORABRIDGE_CHIRPSTACK_MQTT_HOST)"
                .to_string(),
        );
    }
    if config.chirpstack.mqtt_port == 0 {
        errors.push("chirpstack.mqtt_port must be non-zero".to_string());
    }
    if config.chirpstack.api_server.is_empty() {
        errors.push(
            "chirpstack.api_server is required (or set LORABRIDGE_CHIRPSTACK_API_SERVER)"
                .to_string(),
        );
    }
    if config.chirpstack.api_key.is_empty() {
        errors.push(
            "chirpstack.api_key is required (or set LORABRIDGE_CHIRPSTACK_API_KEY)".to_string(),
        );
    }

    // Validate fPorts (fPort 0 is reserved for MAC commands)
    if config.ports.uplink == 0 {
        errors.push("ports.uplink must be non-zero".to_string());
    }
    if config.ports.downlink == 0 {
        errors.push("ports.downlink must be non-zero".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            message: errors.join("\n"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::*;

    fn make_valid_config() -> Config {
        Config {
            http: HttpConfig::default(),
            thingsboard: ThingsboardConfig {
                host: "tb.local".to_string(),
                port: 1883,
            },
            chirpstack: ChirpstackConfig {
                mqtt_host: "cs.local".to_string(),
                mqtt_port: 1883,
                api_server: "cs.local:8080".to_string(),
                api_key: "secret".to_string(),
            },
            ports: PortsConfig::default(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        let config = make_valid_config();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_empty_thingsboard_host_fails() {
        let mut config = make_valid_config();
        config.thingsboard.host = String::new();

        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("thingsboard.host"));
    }

    #[test]
    fn test_empty_api_key_mentions_env_var() {
        let mut config = make_valid_config();
        config.chirpstack.api_key = String::new();

        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("LORABRIDGE_CHIRPSTACK_API_KEY"));
    }

    #[test]
    fn test_zero_fport_fails() {
        let mut config = make_valid_config();
        config.ports.uplink = 0;

        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("ports.uplink"));
    }

    #[test]
    fn test_errors_accumulate() {
        let config = Config {
            http: HttpConfig::default(),
            thingsboard: ThingsboardConfig::default(),
            chirpstack: ChirpstackConfig::default(),
            ports: PortsConfig::default(),
        };

        let result = validate_config(&config);
        assert!(result.is_err());

        let message = result.unwrap_err().to_string();
        assert!(message.contains("thingsboard.host"));
        assert!(message.contains("chirpstack.mqtt_host"));
        assert!(message.contains("chirpstack.api_server"));
        assert!(message.contains("chirpstack.api_key"));
    }
}
