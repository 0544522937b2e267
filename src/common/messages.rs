//! Canonical message types for bridge communication.
//!
//! This module defines the single source of truth for the JSON shapes
//! exchanged with ThingsBoard, ChirpStack, and the control plane. The
//! serde renames pin the exact wire field names.

use serde::{Deserialize, Serialize};

/// Credentials and identity of one bridged device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentifier {
    /// ThingsBoard device access token (doubles as the MQTT username).
    #[serde(rename = "accessToken")]
    pub access_token: String,
    /// LoRaWAN device EUI, as provisioned in ChirpStack.
    #[serde(rename = "devEUI")]
    pub dev_eui: String,
}

/// Serializable view of a registered device, as listed by the control plane.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSnapshot {
    #[serde(rename = "deviceIdentifier")]
    pub identifier: DeviceIdentifier,
}

/// Downlink frame wrapped for transport over LoRaWAN.
///
/// Serialization order is the wire order: `topic` first, then `data`.
#[derive(Debug, Serialize)]
pub struct DownlinkEnvelope {
    /// The ThingsBoard topic the message originated from.
    pub topic: String,
    /// The message payload, passed through verbatim.
    pub data: serde_json::Value,
}

/// ChirpStack uplink event envelope, reduced to the fields the bridge reads.
#[derive(Debug, Deserialize)]
pub struct UplinkEnvelope {
    #[serde(rename = "fPort", default)]
    pub f_port: u32,
    /// Base64-encoded application payload. Absent on empty uplinks.
    #[serde(default)]
    pub data: Option<String>,
    #[serde(rename = "deviceInfo")]
    pub device_info: UplinkDeviceInfo,
}

/// Device identity carried inside an uplink event.
#[derive(Debug, Deserialize)]
pub struct UplinkDeviceInfo {
    #[serde(rename = "devEui")]
    pub dev_eui: String,
}

/// Inner frame devices send over LoRaWAN: a ThingsBoard topic and the raw
/// payload to publish there.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UplinkFrame {
    pub topic: String,
    pub data: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_identifier_uses_exact_wire_names() {
        let identifier = DeviceIdentifier {
            access_token: "tok".to_string(),
            dev_eui: "0102030405060708".to_string(),
        };

        let json = serde_json::to_string(&identifier).unwrap();
        assert_eq!(
            json,
            r#"{"accessToken":"tok","devEUI":"0102030405060708"}"#
        );
    }

    #[test]
    fn device_snapshot_nests_identifier() {
        let snapshot = DeviceSnapshot {
            identifier: DeviceIdentifier {
                access_token: "tok".to_string(),
                dev_eui: "D1".to_string(),
            },
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["deviceIdentifier"]["accessToken"], "tok");
        assert_eq!(json["deviceIdentifier"]["devEUI"], "D1");
    }

    #[test]
    fn uplink_envelope_reads_chirpstack_names() {
        let json = r#"{
            "fPort": 105,
            "data": "aGVsbG8=",
            "deviceInfo": { "devEui": "D1", "deviceName": "sensor-1" }
        }"#;

        let envelope: UplinkEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.f_port, 105);
        assert_eq!(envelope.data.as_deref(), Some("aGVsbG8="));
        assert_eq!(envelope.device_info.dev_eui, "D1");
    }

    #[test]
    fn uplink_envelope_tolerates_missing_port_and_data() {
        let json = r#"{ "deviceInfo": { "devEui": "D1" } }"#;

        let envelope: UplinkEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.f_port, 0);
        assert!(envelope.data.is_none());
    }

    #[test]
    fn uplink_frame_requires_string_data() {
        let err = serde_json::from_str::<UplinkFrame>(r#"{"topic":"t","data":{"nested":1}}"#);
        assert!(err.is_err());
    }
}
