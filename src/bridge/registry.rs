//! Device registry: the authoritative table of bridged devices.
//!
//! Owned by main and passed explicitly to the control plane and the uplink
//! listener. Insertion order is preserved for listing; both lookup keys are
//! indexed, so the uplink hot path resolves devices in O(1).

use std::collections::HashMap;
use std::time::Duration;

use futures::future::join_all;
use rumqttc::{AsyncClient, ClientError, QoS};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bridge::session::{telemetry_session, DeviceSession};
use crate::bridge::uplink::UplinkHandle;
use crate::chirpstack::EnqueueClient;
use crate::common::error::RegistryError;
use crate::common::messages::{DeviceIdentifier, DeviceSnapshot};
use crate::config::ThingsboardConfig;

/// Publish handle for one registered device, resolved on the uplink path.
#[derive(Clone)]
pub struct UplinkTarget {
    pub identifier: DeviceIdentifier,
    client: AsyncClient,
}

impl UplinkTarget {
    /// Publish into the device's ThingsBoard session, QoS 0 fire-and-forget.
    ///
    /// Fails only if the session is gone, which the caller tolerates: the
    /// device may have been deregistered while this uplink was in flight.
    pub async fn publish(&self, msg_topic: &str, payload: String) -> Result<(), ClientError> {
        self.client
            .publish(msg_topic, QoS::AtMostOnce, false, payload)
            .await
    }
}

struct DeviceEntry {
    identifier: DeviceIdentifier,
    client: AsyncClient,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Insertion-ordered device table with O(1) lookups on both keys.
#[derive(Default)]
struct DeviceTable {
    entries: Vec<DeviceEntry>,
    by_token: HashMap<String, usize>,
    by_dev_eui: HashMap<String, usize>,
}

impl DeviceTable {
    fn insert(&mut self, entry: DeviceEntry) {
        let index = self.entries.len();
        self.by_token
            .insert(entry.identifier.access_token.clone(), index);
        self.by_dev_eui
            .insert(entry.identifier.dev_eui.clone(), index);
        self.entries.push(entry);
    }

    /// Remove by access token; indices above the hole shift down by one.
    fn remove(&mut self, access_token: &str) -> Option<DeviceEntry> {
        let index = self.by_token.remove(access_token)?;
        let entry = self.entries.remove(index);
        self.by_dev_eui.remove(&entry.identifier.dev_eui);

        for slot in self
            .by_token
            .values_mut()
            .chain(self.by_dev_eui.values_mut())
        {
            if *slot > index {
                *slot -= 1;
            }
        }

        Some(entry)
    }
}

pub struct Registry {
    devices: RwLock<DeviceTable>,
    thingsboard: ThingsboardConfig,
    enqueue: EnqueueClient,
    uplinks: UplinkHandle,
}

impl Registry {
    pub fn new(
        thingsboard: ThingsboardConfig,
        enqueue: EnqueueClient,
        uplinks: UplinkHandle,
    ) -> Self {
        Self {
            devices: RwLock::new(DeviceTable::default()),
            thingsboard,
            enqueue,
            uplinks,
        }
    }

    /// Snapshot of the registered devices in insertion order.
    pub async fn list(&self) -> Vec<DeviceSnapshot> {
        let table = self.devices.read().await;
        table
            .entries
            .iter()
            .map(|entry| DeviceSnapshot {
                identifier: entry.identifier.clone(),
            })
            .collect()
    }

    /// EUIs of every registered device, for subscription restoration.
    pub async fn dev_euis(&self) -> Vec<String> {
        let table = self.devices.read().await;
        table
            .entries
            .iter()
            .map(|entry| entry.identifier.dev_eui.clone())
            .collect()
    }

    /// Register a device and start its telemetry session.
    ///
    /// Both the access token and the EUI must be unique; a duplicate is
    /// rejected before any session state is created.
    pub async fn register(
        &self,
        identifier: DeviceIdentifier,
    ) -> Result<DeviceSnapshot, RegistryError> {
        let mut table = self.devices.write().await;

        if table.by_token.contains_key(&identifier.access_token) {
            return Err(RegistryError::DuplicateAccessToken {
                access_token: identifier.access_token,
            });
        }
        if table.by_dev_eui.contains_key(&identifier.dev_eui) {
            return Err(RegistryError::DuplicateDevEui {
                dev_eui: identifier.dev_eui,
            });
        }

        let (client, eventloop) = telemetry_session(&self.thingsboard, &identifier);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let session = DeviceSession::new(
            identifier.clone(),
            client.clone(),
            self.enqueue.clone(),
            self.uplinks.clone(),
        );
        let task = tokio::spawn(session.run(eventloop, shutdown_rx));

        table.insert(DeviceEntry {
            identifier: identifier.clone(),
            client,
            shutdown: shutdown_tx,
            task,
        });
        info!("[{}] Device registered", identifier.dev_eui);

        Ok(DeviceSnapshot { identifier })
    }

    /// Deregister by access token: signal the session to stop and drop the
    /// device. The session observes the signal before taking any further
    /// messages; an enqueue already in flight may still complete.
    pub async fn deregister(&self, access_token: &str) -> Result<(), RegistryError> {
        let entry = {
            let mut table = self.devices.write().await;
            table
                .remove(access_token)
                .ok_or_else(|| RegistryError::NotFound {
                    access_token: access_token.to_string(),
                })?
        };

        if entry.shutdown.send(true).is_err() {
            debug!("[{}] Session already stopped", entry.identifier.dev_eui);
        }
        if let Err(e) = self.uplinks.unsubscribe(&entry.identifier.dev_eui).await {
            warn!(
                "[{}] Failed to drop uplink subscription: {}",
                entry.identifier.dev_eui, e
            );
        }
        info!("[{}] Device deregistered", entry.identifier.dev_eui);

        Ok(())
    }

    /// Resolve the publish handle for an uplink, if the device is registered.
    pub async fn find_by_dev_eui(&self, dev_eui: &str) -> Option<UplinkTarget> {
        let table = self.devices.read().await;
        let index = *table.by_dev_eui.get(dev_eui)?;
        let entry = &table.entries[index];

        Some(UplinkTarget {
            identifier: entry.identifier.clone(),
            client: entry.client.clone(),
        })
    }

    /// Stop every device session, joining them with a bounded timeout.
    pub async fn shutdown(&self) {
        let entries: Vec<DeviceEntry> = {
            let mut table = self.devices.write().await;
            table.by_token.clear();
            table.by_dev_eui.clear();
            table.entries.drain(..).collect()
        };

        if entries.is_empty() {
            return;
        }
        info!("Closing {} device session(s)...", entries.len());

        let mut tasks = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.shutdown.send(true).is_err() {
                debug!("[{}] Session already stopped", entry.identifier.dev_eui);
            }
            tasks.push(entry.task);
        }

        if tokio::time::timeout(Duration::from_secs(5), join_all(tasks))
            .await
            .is_err()
        {
            warn!("Timed out waiting for device sessions to close");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::uplink::radio_session;
    use crate::config::ChirpstackConfig;

    fn make_identifier(token: &str, dev_eui: &str) -> DeviceIdentifier {
        DeviceIdentifier {
            access_token: token.to_string(),
            dev_eui: dev_eui.to_string(),
        }
    }

    fn make_registry() -> (Registry, rumqttc::EventLoop) {
        let chirpstack = ChirpstackConfig {
            mqtt_host: "127.0.0.1".to_string(),
            mqtt_port: 1883,
            api_server: "127.0.0.1:8080".to_string(),
            api_key: "test-key".to_string(),
        };
        let thingsboard = ThingsboardConfig {
            host: "127.0.0.1".to_string(),
            port: 1883,
        };

        let (radio_client, radio_eventloop) = radio_session(&chirpstack);
        let enqueue = EnqueueClient::new(&chirpstack, 15).unwrap();
        let registry = Registry::new(thingsboard, enqueue, UplinkHandle::new(radio_client));

        (registry, radio_eventloop)
    }

    #[tokio::test]
    async fn register_and_list_preserves_insertion_order() {
        let (registry, _radio_eventloop) = make_registry();

        registry.register(make_identifier("tok-a", "A")).await.unwrap();
        registry.register(make_identifier("tok-b", "B")).await.unwrap();

        let devices = registry.list().await;
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].identifier.dev_eui, "A");
        assert_eq!(devices[1].identifier.dev_eui, "B");
    }

    #[tokio::test]
    async fn duplicate_access_token_is_rejected() {
        let (registry, _radio_eventloop) = make_registry();
        registry.register(make_identifier("tok-a", "A")).await.unwrap();

        let result = registry.register(make_identifier("tok-a", "B")).await;
        assert!(matches!(
            result,
            Err(RegistryError::DuplicateAccessToken { access_token }) if access_token == "tok-a"
        ));
        assert_eq!(registry.list().await.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_dev_eui_is_rejected() {
        let (registry, _radio_eventloop) = make_registry();
        registry.register(make_identifier("tok-a", "A")).await.unwrap();

        let result = registry.register(make_identifier("tok-b", "A")).await;
        assert!(matches!(
            result,
            Err(RegistryError::DuplicateDevEui { dev_eui }) if dev_eui == "A"
        ));
        assert_eq!(registry.list().await.len(), 1);
    }

    #[tokio::test]
    async fn find_by_dev_eui_resolves_registered_devices() {
        let (registry, _radio_eventloop) = make_registry();
        registry.register(make_identifier("tok-a", "A")).await.unwrap();

        let target = registry.find_by_dev_eui("A").await.unwrap();
        assert_eq!(target.identifier.access_token, "tok-a");

        assert!(registry.find_by_dev_eui("GHOST").await.is_none());
    }

    #[tokio::test]
    async fn deregister_removes_the_device() {
        let (registry, _radio_eventloop) = make_registry();
        registry.register(make_identifier("tok-a", "A")).await.unwrap();

        registry.deregister("tok-a").await.unwrap();

        assert!(registry.list().await.is_empty());
        assert!(registry.find_by_dev_eui("A").await.is_none());

        let again = registry.deregister("tok-a").await;
        assert!(matches!(
            again,
            Err(RegistryError::NotFound { access_token }) if access_token == "tok-a"
        ));
    }

    #[tokio::test]
    async fn deregister_unknown_token_is_not_found() {
        let (registry, _radio_eventloop) = make_registry();

        let result = registry.deregister("ghost").await;
        assert!(matches!(
            result,
            Err(RegistryError::NotFound { access_token }) if access_token == "ghost"
        ));
    }

    #[tokio::test]
    async fn reregistering_after_deregister_succeeds() {
        let (registry, _radio_eventloop) = make_registry();
        let identifier = make_identifier("tok-a", "A");

        registry.register(identifier.clone()).await.unwrap();
        registry.deregister("tok-a").await.unwrap();
        registry.register(identifier).await.unwrap();

        assert_eq!(registry.list().await.len(), 1);
        assert!(registry.find_by_dev_eui("A").await.is_some());
    }

    #[tokio::test]
    async fn removal_keeps_remaining_lookups_intact() {
        let (registry, _radio_eventloop) = make_registry();
        registry.register(make_identifier("tok-a", "A")).await.unwrap();
        registry.register(make_identifier("tok-b", "B")).await.unwrap();
        registry.register(make_identifier("tok-c", "C")).await.unwrap();

        registry.deregister("tok-b").await.unwrap();

        let devices = registry.list().await;
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].identifier.dev_eui, "A");
        assert_eq!(devices[1].identifier.dev_eui, "C");

        assert_eq!(
            registry.find_by_dev_eui("C").await.unwrap().identifier.access_token,
            "tok-c"
        );
        assert!(registry.find_by_dev_eui("B").await.is_none());
    }
}
