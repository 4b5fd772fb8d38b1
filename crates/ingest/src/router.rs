//! Message Router

use crate::device_state::DeviceStateWriter;
use crate::payload::decode_object;
use crate::telemetry::TelemetryWriter;
use crate::Outcome;
use storage::Store;
use tracing::{debug, warn};

/// Topic suffix for temperature/humidity samples
pub const SENSOR_TOPIC_SUFFIX: &str = "/sensor/state";
/// Topic suffix for device on/off states
pub const DEVICE_TOPIC_SUFFIX: &str = "/device/state";

/// Handler a topic is dispatched to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Sensor,
    Device,
}

impl Route {
    /// Classify a topic by its suffix
    pub fn classify(topic: &str) -> Option<Route> {
        if topic.ends_with(SENSOR_TOPIC_SUFFIX) {
            Some(Route::Sensor)
        } else if topic.ends_with(DEVICE_TOPIC_SUFFIX) {
            Some(Route::Device)
        } else {
            None
        }
    }
}

/// Dispatches decoded messages to the writers.
///
/// Owns the store and both writers; messages are handled one at a time, so
/// neither the store nor the device state table is ever shared.
pub struct Router<S> {
    store: S,
    telemetry: TelemetryWriter,
    devices: DeviceStateWriter,
}

impl<S: Store> Router<S> {
    /// Create a router writing into `store`
    pub fn new(store: S) -> Self {
        Self {
            store,
            telemetry: TelemetryWriter::new(),
            devices: DeviceStateWriter::new(),
        }
    }

    /// Handle one inbound message. Never fails: every problem is logged and
    /// reported through the returned [`Outcome`].
    pub async fn on_message(&mut self, topic: &str, payload: &[u8]) -> Outcome {
        debug!(
            "Received message on topic '{}': {}",
            topic,
            String::from_utf8_lossy(payload)
        );

        let fields = match decode_object(payload) {
            Ok(fields) => fields,
            Err(e) => {
                warn!("Dropping message on '{}': {}", topic, e);
                return Outcome::Malformed;
            }
        };

        match Route::classify(topic) {
            Some(Route::Sensor) => self.telemetry.handle(&mut self.store, &fields).await,
            Some(Route::Device) => self.devices.handle(&mut self.store, &fields).await,
            None => {
                debug!("No handler for topic '{}'", topic);
                Outcome::Ignored
            }
        }
    }

    /// The store messages are written to
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Device-state writer, for inspecting last committed states
    pub fn devices(&self) -> &DeviceStateWriter {
        &self.devices
    }

    /// Telemetry writer
    pub fn telemetry(&self) -> &TelemetryWriter {
        &self.telemetry
    }

    /// Give the store back, e.g. to close it on shutdown
    pub fn into_store(self) -> S {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use storage::{Device, MemoryStore, SensorReading};
    use tracing_subscriber::fmt::MakeWriter;

    /// Log sink shared between the subscriber and the test
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn lines(&self) -> Vec<String> {
            let bytes = self.0.lock().unwrap();
            String::from_utf8_lossy(&bytes)
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn router() -> Router<MemoryStore> {
        Router::new(MemoryStore::new())
    }

    #[test]
    fn test_classify_by_suffix() {
        assert_eq!(Route::classify("lab/room1/sensor/state"), Some(Route::Sensor));
        assert_eq!(Route::classify("lab/room1/device/state"), Some(Route::Device));
        assert_eq!(Route::classify("lab/room1/device/command"), None);
        assert_eq!(Route::classify("lab/room1/sensor/state/extra"), None);
    }

    #[tokio::test]
    async fn test_sensor_topic_reaches_telemetry() {
        let mut router = router();
        let outcome = router
            .on_message("lab/room1/sensor/state", br#"{"temp_c": 21.5, "hum_pct": 60.2}"#)
            .await;

        assert_eq!(outcome, Outcome::Recorded(1));
        assert_eq!(
            router.store().sensor_data(),
            &[SensorReading {
                temperature: 21.5,
                humidity: 60.2
            }]
        );
        assert_eq!(router.telemetry().saved(), 1);
    }

    #[tokio::test]
    async fn test_device_topic_reaches_state_writer() {
        let mut router = router();
        router
            .on_message("lab/room1/device/state", br#"{"light": "on"}"#)
            .await;

        assert_eq!(router.store().device_events().len(), 1);
        assert_eq!(router.devices().table().get(Device::Light), Some("on"));
    }

    #[tokio::test]
    async fn test_malformed_payload_has_no_side_effects() {
        let mut router = router();

        for topic in ["lab/room1/sensor/state", "lab/room1/device/state"] {
            assert_eq!(router.on_message(topic, b"{not json").await, Outcome::Malformed);
            assert_eq!(router.on_message(topic, b"\"on\"").await, Outcome::Malformed);
        }

        let store = router.into_store();
        assert_eq!(store.commits(), 0);
        assert_eq!(store.rollbacks(), 0);
    }

    #[tokio::test]
    async fn test_unknown_topic_ignored() {
        let mut router = router();
        let outcome = router
            .on_message("lab/room1/alarm/state", br#"{"temp_c": 1, "hum_pct": 2}"#)
            .await;

        assert_eq!(outcome, Outcome::Ignored);
        assert!(router.store().sensor_data().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_payload_logs_one_warning() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut router = router();
        let outcome = router
            .on_message("lab/room1/sensor/state", b"temp=21.5")
            .await;

        assert_eq!(outcome, Outcome::Malformed);
        let lines = logs.lines();
        assert_eq!(lines.len(), 1, "unexpected log output: {:?}", lines);
        assert!(lines[0].contains("WARN"));
        assert!(lines[0].contains("Dropping message on 'lab/room1/sensor/state'"));
    }
}
