//! MQTT topic constants and the single-level wildcard matcher.
//!
//! All message classification in the bridge goes through [`matches`].

/// ThingsBoard shared-attributes topic.
pub const SHARED_ATTRIBUTES: &str = "v1/devices/me/attributes";

/// ThingsBoard server-side RPC request topic (`+` is the request id).
pub const RPC_REQUEST: &str = "v1/devices/me/rpc/request/+";

/// ChirpStack uplink event topic covering every application and device.
pub const UPLINK_EVENTS: &str = "application/+/device/+/event/up";

/// Uplink event topic scoped to a single device EUI.
pub fn device_uplink(dev_eui: &str) -> String {
    format!("application/+/device/{dev_eui}/event/up")
}

/// Match a concrete topic against a subscription pattern.
///
/// Segments are compared pairwise: a `+` pattern segment matches exactly one
/// topic segment of one-or-more characters, any other pattern segment must
/// match byte-for-byte. Segment counts must be equal. The multi-level `#`
/// wildcard is not supported and is treated as a literal.
pub fn matches(topic: &str, pattern: &str) -> bool {
    let mut topic_segments = topic.split('/');
    let mut pattern_segments = pattern.split('/');

    loop {
        match (topic_segments.next(), pattern_segments.next()) {
            (None, None) => return true,
            (Some(t), Some(p)) => {
                let segment_ok = if p == "+" { !t.is_empty() } else { t == p };
                if !segment_ok {
                    return false;
                }
            }
            // One side ran out of segments first.
            _ => return false,
        }
    }
}
