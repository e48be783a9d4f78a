use std::sync::Arc;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde_json::{Value, json};
use tokio::sync::watch;
use tokio::task;
use tokio::time::{self, Duration};
use tracing::{debug, error, info};

use crate::charger::ChargerSnapshot;

/// Republishes charger snapshots to an MQTT broker.
///
/// Every snapshot becomes one `{"value": ...}` message per channel under
/// `<prefix>/<charger id>/`, unknown values are sent as `null`.
pub struct MqttPublisher {
    client: AsyncClient,
    prefix: String,
    /// Flips to `true` once; every task holds a receiver
    shutdown: watch::Sender<bool>,
    _eventloop_handle: task::JoinHandle<()>,
}

impl MqttPublisher {
    pub async fn connect(client_id: &str, host: &str, port: u16, prefix: &str) -> anyhow::Result<Self> {
        let mut mqttoptions = MqttOptions::new(client_id, host, port);
        mqttoptions.set_keep_alive(Duration::from_secs(30));

        let (client, mut eventloop) = AsyncClient::new(mqttoptions, 10);
        let (shutdown, mut stop) = watch::channel(false);

        let _eventloop_handle = task::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.changed() => {
                        info!("Shutting down MQTT event loop");
                        break;
                    }
                    event = eventloop.poll() => match event {
                        Ok(Event::Incoming(Packet::ConnAck(_))) => info!("Connected to MQTT broker"),
                        Ok(_) => {}
                        Err(e) => {
                            error!("MQTT event loop error: {:?}", e);
                            tokio::select! {
                                _ = stop.changed() => break,
                                _ = time::sleep(Duration::from_secs(5)) => {}
                            }
                        }
                    }
                }
            }
        });

        Ok(Self {
            client,
            prefix: prefix.trim_end_matches('/').to_string(),
            shutdown,
            _eventloop_handle,
        })
    }

    pub async fn publish_snapshot(&self, snapshot: &ChargerSnapshot) -> anyhow::Result<()> {
        for (topic, payload) in snapshot_messages(&self.prefix, snapshot) {
            self.client
                .publish(topic, QoS::AtLeastOnce, false, payload)
                .await?;
        }
        Ok(())
    }

    /// Publishes every snapshot the receiver sees until the charger goes
    /// away or the publisher is shut down.
    pub fn forward(self: Arc<Self>, mut snapshots: watch::Receiver<ChargerSnapshot>) -> task::JoinHandle<()> {
        let mut stop = self.shutdown.subscribe();
        task::spawn(async move {
            while !*stop.borrow() {
                let snapshot = snapshots.borrow_and_update().clone();
                tokio::select! {
                    _ = stop.changed() => break,
                    result = self.publish_snapshot(&snapshot) => {
                        if let Err(e) = result {
                            error!(charger = %snapshot.id, "Snapshot publish failed: {:?}", e);
                        }
                    }
                }
                tokio::select! {
                    _ = stop.changed() => break,
                    changed = snapshots.changed() => {
                        if changed.is_err() {
                            debug!(charger = %snapshot.id, "Charger gone, stopping forwarder");
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Stops the event loop and every forwarder, including ones blocked
    /// in a publish.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
        if let Err(e) = self.client.try_disconnect() {
            debug!("MQTT disconnect failed: {:?}", e);
        }
    }
}

/// Topic and payload of every channel of a snapshot
pub fn snapshot_messages(prefix: &str, snapshot: &ChargerSnapshot) -> Vec<(String, String)> {
    let measurement = snapshot.measurement.as_ref();
    let channels: [(&str, Value); 6] = [
        ("Power", json!(measurement.map(|m| m.power))),
        ("Voltage", json!(measurement.and_then(|m| m.voltage))),
        ("Current", json!(measurement.map(|m| m.current))),
        ("State", json!(snapshot.state.as_str())),
        ("Stale", json!(snapshot.stale)),
        ("Alias", json!(snapshot.alias)),
    ];

    channels
        .into_iter()
        .map(|(channel, value)| {
            (
                format!("{}/{}/{}", prefix, snapshot.id, channel),
                json!({ "value": value }).to_string(),
            )
        })
        .collect()
}
