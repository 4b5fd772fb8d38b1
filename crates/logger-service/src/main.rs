//! IoT Database Logger - Main Entry Point

use logger_service::{init_logging, log_level, run, Settings};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load()?;
    init_logging(log_level(&settings)?)?;

    info!("=== IoT Database Logger v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "Recording '{}' topics from {}:{}",
        settings.topic_namespace, settings.mqtt_host, settings.mqtt_port
    );

    run(settings).await?;

    Ok(())
}
