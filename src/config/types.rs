//! Configuration type definitions.

use serde::Deserialize;

/// Root configuration structure.
///
/// Every section is optional in the file; connection values that have no
/// sensible default are enforced by validation after env overrides apply.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub thingsboard: ThingsboardConfig,
    #[serde(default)]
    pub chirpstack: ChirpstackConfig,
    #[serde(default)]
    pub ports: PortsConfig,
}

/// Control-plane HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: default_http_port(),
        }
    }
}

/// ThingsBoard MQTT broker configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ThingsboardConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
}

impl Default for ThingsboardConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_mqtt_port(),
        }
    }
}

/// ChirpStack connection configuration: MQTT for uplinks, gRPC for downlinks.
#[derive(Debug, Clone, Deserialize)]
pub struct ChirpstackConfig {
    #[serde(default)]
    pub mqtt_host: String,
    #[serde(default = "default_mqtt_port")]
    pub mqtt_port: u16,
    /// gRPC API endpoint, host:port.
    #[serde(default)]
    pub api_server: String,
    /// API token passed as a bearer credential on every enqueue.
    #[serde(default)]
    pub api_key: String,
}

impl Default for ChirpstackConfig {
    fn default() -> Self {
        Self {
            mqtt_host: String::new(),
            mqtt_port: default_mqtt_port(),
            api_server: String::new(),
            api_key: String::new(),
        }
    }
}

/// LoRaWAN fPorts the bridge reads and writes.
#[derive(Debug, Clone, Deserialize)]
pub struct PortsConfig {
    /// fPort carrying device-originated bridge traffic.
    #[serde(default = "default_uplink_fport")]
    pub uplink: u8,
    /// fPort downlink queue items are enqueued on.
    #[serde(default = "default_downlink_fport")]
    pub downlink: u8,
}

impl Default for PortsConfig {
    fn default() -> Self {
        Self {
            uplink: default_uplink_fport(),
            downlink: default_downlink_fport(),
        }
    }
}

fn default_http_port() -> u16 {
    3000
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_uplink_fport() -> u8 {
    105
}

fn default_downlink_fport() -> u8 {
    15
}
