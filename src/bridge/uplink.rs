//! Shared ChirpStack uplink listener.
//!
//! One MQTT session against the ChirpStack broker carries the uplink events
//! of every registered device. Subscriptions are scoped per device EUI and
//! restored in bulk whenever the session reconnects.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rumqttc::{
    AsyncClient, ClientError, Event, EventLoop, MqttOptions, Packet, QoS, SubscribeReasonCode,
};
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::bridge::registry::Registry;
use crate::bridge::topic;
use crate::common::error::UplinkError;
use crate::common::messages::{UplinkEnvelope, UplinkFrame};
use crate::common::reconnect::{mqtt_backoff, MAX_RECONNECT_DELAY};
use crate::config::ChirpstackConfig;

/// Build the shared MQTT session against the ChirpStack broker.
pub fn radio_session(config: &ChirpstackConfig) -> (AsyncClient, EventLoop) {
    let mut options = MqttOptions::new("lorabridge-uplink", config.mqtt_host.clone(), config.mqtt_port);
    options.set_keep_alive(Duration::from_secs(30));

    AsyncClient::new(options, 64)
}

/// Subscription handle onto the shared uplink session.
///
/// Device sessions use this to add their EUI-scoped uplink topic; the
/// registry uses it to drop the topic again on deregistration.
#[derive(Clone)]
pub struct UplinkHandle {
    client: AsyncClient,
}

impl UplinkHandle {
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }

    pub async fn subscribe(&self, dev_eui: &str) -> Result<(), ClientError> {
        self.client
            .subscribe(topic::device_uplink(dev_eui), QoS::AtMostOnce)
            .await
    }

    pub async fn unsubscribe(&self, dev_eui: &str) -> Result<(), ClientError> {
        self.client.unsubscribe(topic::device_uplink(dev_eui)).await
    }
}

/// What became of one uplink event. This is where a drop-reason counter
/// would attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UplinkOutcome {
    /// Inner frame published to the device's ThingsBoard session.
    Forwarded,
    /// The event's fPort is not the bridge uplink port.
    SkippedPort,
    /// No registered device matches the event's devEUI.
    UnknownDevice,
    /// Topic or payload did not decode; dropped with an error report.
    Rejected,
}

fn parse_envelope(payload: &[u8]) -> Result<UplinkEnvelope, UplinkError> {
    serde_json::from_slice(payload).map_err(UplinkError::Envelope)
}

/// Decode the base64 application payload into the inner `{topic, data}`
/// frame the device sent.
fn decode_frame(envelope: &UplinkEnvelope) -> Result<UplinkFrame, UplinkError> {
    let data = envelope.data.as_deref().ok_or(UplinkError::MissingData)?;
    let raw = BASE64.decode(data)?;
    serde_json::from_slice(&raw).map_err(UplinkError::Frame)
}

pub struct UplinkListener {
    uplinks: UplinkHandle,
    registry: Arc<Registry>,
    uplink_fport: u8,
}

impl UplinkListener {
    pub fn new(uplinks: UplinkHandle, registry: Arc<Registry>, uplink_fport: u8) -> Self {
        Self {
            uplinks,
            registry,
            uplink_fport,
        }
    }

    /// Drive the shared session until process shutdown.
    pub async fn run(self, mut eventloop: EventLoop, mut shutdown_rx: watch::Receiver<bool>) {
        let mut backoff = mqtt_backoff();

        info!("Uplink listener starting");

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
                        backoff = mqtt_backoff();
                        self.restore_subscriptions().await;
                    }
                    Ok(Event::Incoming(Packet::SubAck(ack))) => {
                        if ack
                            .return_codes
                            .iter()
                            .any(|code| matches!(code, SubscribeReasonCode::Failure))
                        {
                            error!("ChirpStack broker rejected a subscription");
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        self.on_uplink(&publish.topic, &publish.payload).await;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        let delay = backoff.next().unwrap_or(MAX_RECONNECT_DELAY);
                        error!("ChirpStack connection error: {}", e);
                        info!("Reconnecting in {:.1} seconds...", delay.as_secs_f64());

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

        info!("Uplink listener stopped");
    }

    /// Re-issue the uplink subscription of every registered device.
    /// Runs on every (re)connect; new devices subscribe themselves.
    async fn restore_subscriptions(&self) {
        let dev_euis = self.registry.dev_euis().await;
        info!(
            "Connected to ChirpStack MQTT, restoring {} device subscription(s)",
            dev_euis.len()
        );

        for dev_eui in dev_euis {
            if let Err(e) = self.uplinks.subscribe(&dev_eui).await {
                error!("[{}] Failed to restore uplink subscription: {}", dev_eui, e);
            }
        }
    }

    /// Handle one uplink event end-to-end.
    ///
    /// Order matters: envelope decode, fPort filter, registry lookup, inner
    /// frame decode, publish. Foreign traffic on the uplink port of another
    /// integration leaves at the fPort filter without touching the registry.
    async fn on_uplink(&self, msg_topic: &str, payload: &[u8]) -> UplinkOutcome {
        if !topic::matches(msg_topic, topic::UPLINK_EVENTS) {
            error!("Unknown topic: {}", msg_topic);
            return UplinkOutcome::Rejected;
        }

        let envelope = match parse_envelope(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                error!("Dropping malformed uplink event on {}: {}", msg_topic, e);
                return UplinkOutcome::Rejected;
            }
        };
        let dev_eui = &envelope.device_info.dev_eui;

        if envelope.f_port != u32::from(self.uplink_fport) {
            debug!("Skipping fPort {} uplink from {}", envelope.f_port, dev_eui);
            return UplinkOutcome::SkippedPort;
        }

        let Some(target) = self.registry.find_by_dev_eui(dev_eui).await else {
            debug!("Uplink from unregistered device {}", dev_eui);
            return UplinkOutcome::UnknownDevice;
        };

        let frame = match decode_frame(&envelope) {
            Ok(frame) => frame,
            Err(e) => {
                error!("[{}] Dropping undecodable uplink payload: {}", dev_eui, e);
                return UplinkOutcome::Rejected;
            }
        };

        match target.publish(&frame.topic, frame.data).await {
            Ok(()) => {
                info!("[{}] Uplink forwarded to {}", dev_eui, frame.topic);
                UplinkOutcome::Forwarded
            }
            Err(e) => {
                error!("[{}] Failed to publish uplink to {}: {}", dev_eui, frame.topic, e);
                UplinkOutcome::Rejected
            }
        }
    }

    /// Request a clean disconnect and drain the event loop briefly so the
    /// DISCONNECT packet actually goes out.
    async fn close(&self, eventloop: &mut EventLoop) {
        if let Err(e) = self.uplinks.client.disconnect().await {
            debug!("Disconnect request failed (session already closed): {}", e);
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
