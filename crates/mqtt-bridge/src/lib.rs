//! MQTT Bridge
//!
//! Connects to the broker, subscribes to the logger's topics and hands every
//! received publish to a single consumer, in arrival order:
//! - subscription is renewed on every CONNACK, so broker restarts are covered
//! - reconnection itself is left to the client library
//! - the bounded channel is the only hand-off point to the pipeline

use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, Publish, QoS,
};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Time allowed for the DISCONNECT packet to be flushed on shutdown
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Bridge error types
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Disconnect failed: {0}")]
    Disconnect(String),
}

/// Broker connection and subscription settings
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// MQTT broker host
    pub host: String,
    /// MQTT port
    pub port: u16,
    pub username: String,
    pub password: String,
    pub client_id: String,
    pub keep_alive: Duration,
    /// Prefix shared by all subscribed topics, e.g. `lab/room1`
    pub namespace: String,
    /// Messages buffered between the event loop and the consumer
    pub channel_capacity: usize,
    /// Pause after an event loop error before polling again
    pub reconnect_delay: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            username: "user1".to_string(),
            password: "pass1".to_string(),
            client_id: "database_logger_service".to_string(),
            keep_alive: Duration::from_secs(60),
            namespace: "lab/room1".to_string(),
            channel_capacity: 100,
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

/// Topics the logger subscribes to under `namespace`
pub fn subscription_topics(namespace: &str) -> [String; 2] {
    let namespace = namespace.trim_end_matches('/');
    [
        format!("{}/sensor/state", namespace),
        format!("{}/device/state", namespace),
    ]
}

/// Build client options from the config
pub fn mqtt_options(config: &BrokerConfig) -> MqttOptions {
    let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
    options.set_keep_alive(config.keep_alive.max(Duration::from_secs(5)));
    options.set_credentials(&config.username, &config.password);
    options
}

/// A message received from the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl From<Publish> for InboundMessage {
    fn from(publish: Publish) -> Self {
        Self {
            topic: publish.topic,
            payload: publish.payload.to_vec(),
        }
    }
}

/// Running MQTT subscription
pub struct MqttBridge {
    client: AsyncClient,
    task: JoinHandle<()>,
}

impl MqttBridge {
    /// Start the event loop. Returns the bridge handle and the receiving end
    /// of the message channel.
    pub fn start(config: &BrokerConfig) -> (Self, mpsc::Receiver<InboundMessage>) {
        let (client, eventloop) = AsyncClient::new(mqtt_options(config), 10);
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));

        info!(
            "Connecting to MQTT broker {}:{} as '{}'",
            config.host, config.port, config.client_id
        );

        let task = tokio::spawn(drive(
            eventloop,
            client.clone(),
            tx,
            config.namespace.clone(),
            config.reconnect_delay,
        ));

        (Self { client, task }, rx)
    }

    /// Disconnect from the broker and stop the event loop.
    ///
    /// The event loop exits once the DISCONNECT packet has been written. If
    /// that does not happen within a short grace period the loop is aborted.
    pub async fn shutdown(self) -> Result<(), BridgeError> {
        info!("Disconnecting from MQTT broker");
        let Self { client, mut task } = self;

        if let Err(e) = client.try_disconnect() {
            task.abort();
            return Err(BridgeError::Disconnect(e.to_string()));
        }

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut task).await {
            Ok(_) => {
                info!("Disconnected from MQTT broker");
                Ok(())
            }
            Err(_) => {
                task.abort();
                Err(BridgeError::Disconnect(format!(
                    "no DISCONNECT sent within {}s",
                    SHUTDOWN_TIMEOUT.as_secs()
                )))
            }
        }
    }
}

async fn drive(
    mut eventloop: EventLoop,
    client: AsyncClient,
    tx: mpsc::Sender<InboundMessage>,
    namespace: String,
    reconnect_delay: Duration,
) {
    let topics = subscription_topics(&namespace);

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code != ConnectReturnCode::Success {
                    warn!("MQTT connection refused: {:?}", ack.code);
                    continue;
                }
                info!("Connected to MQTT broker");
                for topic in &topics {
                    // Event loop is not being polled here; never await
                    if let Err(e) = client.try_subscribe(topic.as_str(), QoS::AtMostOnce) {
                        error!("Failed to subscribe to '{}': {}", topic, e);
                    }
                }
                info!("Subscribed to topics under '{}'", namespace);
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if tx.send(InboundMessage::from(publish)).await.is_err() {
                    info!("Message consumer closed, stopping MQTT event loop");
                    break;
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("DISCONNECT sent, stopping MQTT event loop");
                break;
            }
            Ok(event) => {
                debug!("MQTT event: {:?}", event);
            }
            Err(e) => {
                if tx.is_closed() {
                    break;
                }
                error!("MQTT error: {}", e);
                tokio::time::sleep(reconnect_delay).await;
            }
        }
    }
}
