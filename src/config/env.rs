//! Environment variable overrides for configuration.
//!
//! Supports overriding config values with environment variables:
//! - `LORABRIDGE_HTTP_PORT` - Control-plane HTTP port
//! - `LORABRIDGE_THINGSBOARD_HOST` - ThingsBoard MQTT host
//! - `LORABRIDGE_THINGSBOARD_PORT` - ThingsBoard MQTT port
//! - `LORABRIDGE_CHIRPSTACK_MQTT_HOST` - ChirpStack MQTT host
//! - `LORABRIDGE_CHIRPSTACK_MQTT_PORT` - ChirpStack MQTT port
//! - `LORABRIDGE_CHIRPSTACK_API_SERVER` - ChirpStack gRPC endpoint (host:port)
//! - `LORABRIDGE_CHIRPSTACK_API_KEY` - ChirpStack API token

use std::env;

use crate::config::types::Config;

/// Environment variable prefix for all config overrides.
const ENV_PREFIX: &str = "LORABRIDGE";

/// Apply environment variable overrides to a config.
///
/// This allows sensitive values like the ChirpStack API token to be
/// provided via environment variables instead of the config file.
pub fn apply_env_overrides(mut config: Config) -> Config {
    // Control plane
    if let Ok(port) = env::var(format!("{}_HTTP_PORT", ENV_PREFIX)) {
        if let Ok(port) = port.parse() {
            config.http.port = port;
        }
    }

    // ThingsBoard broker
    if let Ok(host) = env::var(format!("{}_THINGSBOARD_HOST", ENV_PREFIX)) {
        config.thingsboard.host = host;
    }
    if let Ok(port) = env::var(format!("{}_THINGSBOARD_PORT", ENV_PREFIX)) {
        if let Ok(port) = port.parse() {
            config.thingsboard.port = port;
        }
    }

    // ChirpStack endpoints
    if let Ok(host) = env::var(format!("{}_CHIRPSTACK_MQTT_HOST", ENV_PREFIX)) {
        config.chirpstack.mqtt_host = host;
    }
    if let Ok(port) = env::var(format!("{}_CHIRPSTACK_MQTT_PORT", ENV_PREFIX)) {
        if let Ok(port) = port.parse() {
            config.chirpstack.mqtt_port = port;
        }
    }
    if let Ok(server) = env::var(format!("{}_CHIRPSTACK_API_SERVER", ENV_PREFIX)) {
        config.chirpstack.api_server = server;
    }
    if let Ok(key) = env::var(format!("{}_CHIRPSTACK_API_KEY", ENV_PREFIX)) {
        config.chirpstack.api_key = key;
    }

    config
}

/// Get the config file path from environment or use default.
///
/// Checks `LORABRIDGE_CONFIG` environment variable, otherwise returns
/// "lorabridge.conf".
pub fn get_config_path() -> String {
    env::var(format!("{}_CONFIG", ENV_PREFIX)).unwrap_or_else(|_| "lorabridge.conf".to_string())
}
