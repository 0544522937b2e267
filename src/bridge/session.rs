//! Per-device ThingsBoard MQTT session.
//!
//! Each registered device owns one of these: a dedicated MQTT session
//! authenticated with the device's access token, bridging attribute updates
//! and RPC requests into ChirpStack downlinks.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, SubscribeReasonCode};
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::bridge::topic;
use crate::bridge::uplink::UplinkHandle;
use crate::chirpstack::EnqueueClient;
use crate::common::messages::{DeviceIdentifier, DownlinkEnvelope};
use crate::common::reconnect::{mqtt_backoff, MAX_RECONNECT_DELAY};
use crate::config::ThingsboardConfig;

/// Build the MQTT session for one device.
///
/// ThingsBoard authenticates devices by MQTT username, which carries the
/// access token; the password stays empty.
pub(crate) fn telemetry_session(
    config: &ThingsboardConfig,
    identifier: &DeviceIdentifier,
) -> (AsyncClient, EventLoop) {
    let mut options = MqttOptions::new(
        format!("lorabridge-{}", identifier.dev_eui),
        config.host.clone(),
        config.port,
    );
    options.set_credentials(identifier.access_token.clone(), "");
    options.set_keep_alive(Duration::from_secs(30));

    AsyncClient::new(options, 32)
}

/// True for the two ThingsBoard topics the bridge forwards downlink.
pub(crate) fn is_bridged_topic(msg_topic: &str) -> bool {
    topic::matches(msg_topic, topic::SHARED_ATTRIBUTES)
        || topic::matches(msg_topic, topic::RPC_REQUEST)
}

/// Wrap a ThingsBoard message into the LoRaWAN downlink frame:
/// `{"topic": <origin topic>, "data": <parsed payload>}`.
pub(crate) fn downlink_frame(msg_topic: &str, payload: &[u8]) -> Result<Vec<u8>, serde_json::Error> {
    let data: serde_json::Value = serde_json::from_slice(payload)?;
    serde_json::to_vec(&DownlinkEnvelope {
        topic: msg_topic.to_string(),
        data,
    })
}

pub struct DeviceSession {
    identifier: DeviceIdentifier,
    client: AsyncClient,
    enqueue: EnqueueClient,
    uplinks: UplinkHandle,
}

impl DeviceSession {
    pub fn new(
        identifier: DeviceIdentifier,
        client: AsyncClient,
        enqueue: EnqueueClient,
        uplinks: UplinkHandle,
    ) -> Self {
        Self {
            identifier,
            client,
            enqueue,
            uplinks,
        }
    }

    /// Drive the session until deregistration.
    ///
    /// The loop is biased toward the shutdown signal: once deregistration is
    /// observed, no further messages are taken from the event loop.
    pub async fn run(self, mut eventloop: EventLoop, mut shutdown_rx: watch::Receiver<bool>) {
        let dev_eui = self.identifier.dev_eui.clone();
        let mut backoff = mqtt_backoff();

        info!("[{}] Telemetry session starting", dev_eui);

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        self.close(&mut eventloop).await;
                        break;
                    }
                }

                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("[{}] Connected to ThingsBoard", dev_eui);
                        backoff = mqtt_backoff();
                        self.subscribe_all().await;
                    }
                    Ok(Event::Incoming(Packet::SubAck(ack))) => {
                        if ack
                            .return_codes
                            .iter()
                            .any(|code| matches!(code, SubscribeReasonCode::Failure))
                        {
                            error!("[{}] Broker rejected a subscription", dev_eui);
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        self.on_message(&publish.topic, &publish.payload).await;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        let delay = backoff.next().unwrap_or(MAX_RECONNECT_DELAY);
                        error!("[{}] Telemetry connection error: {}", dev_eui, e);
                        info!(
                            "[{}] Reconnecting in {:.1} seconds...",
                            dev_eui,
                            delay.as_secs_f64()
                        );

                        // Wait for delay OR shutdown signal
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = shutdown_rx.changed() => {
                                if *shutdown_rx.borrow() {
                                    break;
                                }
                            }
                        }
                    }
                }
            }
        }

        info!("[{}] Telemetry session closed", dev_eui);
    }

    /// Issue the three subscriptions this device needs. Each is independent
    /// best-effort: a failure is reported and the session keeps running.
    async fn subscribe_all(&self) {
        let dev_eui = &self.identifier.dev_eui;

        for sub_topic in [topic::SHARED_ATTRIBUTES, topic::RPC_REQUEST] {
            match self.client.subscribe(sub_topic, QoS::AtMostOnce).await {
                Ok(()) => info!("[{}] Subscribed to {}", dev_eui, sub_topic),
                Err(e) => error!("[{}] Failed to subscribe to {}: {}", dev_eui, sub_topic, e),
            }
        }

        let uplink_topic = topic::device_uplink(dev_eui);
        match self.uplinks.subscribe(dev_eui).await {
            Ok(()) => info!("[{}] Subscribed to {}", dev_eui, uplink_topic),
            Err(e) => error!("[{}] Failed to subscribe to {}: {}", dev_eui, uplink_topic, e),
        }
    }

    /// Handle one ThingsBoard message: wrap it and enqueue it as a downlink.
    ///
    /// Attribute updates and RPC requests are treated identically; anything
    /// else is an unknown topic. Enqueue failures are reported, not retried.
    async fn on_message(&self, msg_topic: &str, payload: &[u8]) {
        let dev_eui = &self.identifier.dev_eui;

        if !is_bridged_topic(msg_topic) {
            error!("[{}] Unknown topic: {}", dev_eui, msg_topic);
            return;
        }

        let frame = match downlink_frame(msg_topic, payload) {
            Ok(frame) => frame,
            Err(e) => {
                error!(
                    "[{}] Dropping message on {} with invalid JSON payload: {}",
                    dev_eui, msg_topic, e
                );
                return;
            }
        };

        match self.enqueue.enqueue(dev_eui, frame).await {
            Ok(id) => info!("[{}] Downlink enqueued with id {}", dev_eui, id),
            Err(e) => error!("[{}] Downlink enqueue failed: {}", dev_eui, e),
        }
    }

    /// Request a clean MQTT disconnect and drain the event loop briefly so
    /// the DISCONNECT packet actually goes out.
    async fn close(&self, eventloop: &mut EventLoop) {
        if let Err(e) = self.client.disconnect().await {
            debug!(
                "[{}] Disconnect request failed (session already closed): {}",
                self.identifier.dev_eui, e
            );
            return;
        }

        let drain = async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Outgoing(rumqttc::Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        };
        let _ = tokio::time::timeout(Duration::from_secs(1), drain).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_and_rpc_topics_are_bridged() {
        assert!(is_bridged_topic("v1/devices/me/attributes"));
        assert!(is_bridged_topic("v1/devices/me/rpc/request/1"));
        assert!(is_bridged_topic("v1/devices/me/rpc/request/9934"));
    }

    #[test]
    fn other_topics_are_not_bridged() {
        assert!(!is_bridged_topic("v1/devices/me/telemetry"));
        assert!(!is_bridged_topic("v1/devices/me/rpc/request"));
        assert!(!is_bridged_topic("v1/devices/me/rpc/response/1"));
        assert!(!is_bridged_topic("application/1/device/D1/event/up"));
    }

    #[test]
    fn downlink_frame_wraps_topic_and_payload() {
        let frame = downlink_frame("v1/devices/me/attributes", br#"{"foo":1}"#).unwrap();
        assert_eq!(
            frame,
            br#"{"topic":"v1/devices/me/attributes","data":{"foo":1}}"#
        );
    }

    #[test]
    fn downlink_frame_keeps_rpc_request_topic() {
        let frame = downlink_frame(
            "v1/devices/me/rpc/request/7",
            br#"{"method":"reboot","params":{}}"#,
        )
        .unwrap();

        let value: serde_json::Value = serde_json::from_slice(&frame).unwrap();
        assert_eq!(value["topic"], "v1/devices/me/rpc/request/7");
        assert_eq!(value["data"]["method"], "reboot");
    }

    #[test]
    fn downlink_frame_rejects_invalid_json() {
        assert!(downlink_frame("v1/devices/me/attributes", b"not json").is_err());
        assert!(downlink_frame("v1/devices/me/attributes", b"").is_err());
    }
}
