//! IoT Database Logger
//!
//! Subscribes to the lab's MQTT topics and records sensor samples and device
//! state changes in PostgreSQL.

mod settings;

pub use settings::{Settings, CONFIG_FILE};

use ingest::Router;
use mqtt_bridge::{BridgeError, InboundMessage, MqttBridge};
use std::future::Future;
use storage::{Database, Store};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Service error types
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("MQTT bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

/// Parse the configured log level
pub fn log_level(settings: &Settings) -> Result<Level, ServiceError> {
    settings
        .log_level
        .parse::<Level>()
        .map_err(|e| ServiceError::Logging(format!("{}: '{}'", e, settings.log_level)))
}

/// Initialize logging
pub fn init_logging(level: Level) -> Result<(), ServiceError> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| ServiceError::Logging(e.to_string()))
}

/// Feed messages to the router one at a time until the channel closes or
/// `shutdown` completes. A message already being handled is always finished
/// before shutdown is observed.
pub async fn pump<S, F>(
    mut router: Router<S>,
    rx: &mut mpsc::Receiver<InboundMessage>,
    shutdown: F,
) -> Router<S>
where
    S: Store,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
            message = rx.recv() => match message {
                Some(message) => {
                    router.on_message(&message.topic, &message.payload).await;
                }
                None => {
                    info!("Message channel closed");
                    break;
                }
            },
        }
    }

    router
}

/// Resolves on Ctrl-C
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for interrupt: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Run the logger until interrupted
pub async fn run(settings: Settings) -> Result<(), ServiceError> {
    info!("Connecting to PostgreSQL at {}:{}", settings.db_host, settings.db_port);
    let database = Database::connect(&settings.database()).await;

    let (bridge, mut rx) = MqttBridge::start(&settings.broker());

    let router = pump(Router::new(database), &mut rx, interrupted()).await;

    let disconnected = bridge.shutdown().await;
    if let Err(e) = &disconnected {
        warn!("{}", e);
    }
    router.into_store().close().await;
    info!("Logger service stopped");

    disconnected.map_err(ServiceError::from)
}
