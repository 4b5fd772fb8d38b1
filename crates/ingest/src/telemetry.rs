//! Telemetry Writer

use crate::payload::Fields;
use crate::Outcome;
use storage::{Row, SensorReading, Store};
use tracing::{debug, error, info};

/// Payload key carrying temperature in °C
pub const TEMPERATURE_KEY: &str = "temp_c";
/// Payload key carrying relative humidity in %
pub const HUMIDITY_KEY: &str = "hum_pct";

/// Inserts every complete sensor sample
#[derive(Debug, Default)]
pub struct TelemetryWriter {
    /// Rows committed so far
    saved: u64,
}

impl TelemetryWriter {
    /// Create a new telemetry writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract a reading from a decoded payload.
    ///
    /// `null` and non-numeric values count as missing.
    pub fn reading(fields: &Fields) -> Option<SensorReading> {
        let temperature = fields.get(TEMPERATURE_KEY)?.as_f64()?;
        let humidity = fields.get(HUMIDITY_KEY)?.as_f64()?;
        Some(SensorReading {
            temperature,
            humidity,
        })
    }

    /// Write one `sensor_data` row if both fields are present
    pub async fn handle<S: Store + ?Sized>(&mut self, store: &mut S, fields: &Fields) -> Outcome {
        let Some(reading) = Self::reading(fields) else {
            debug!("Incomplete sensor sample ignored: {:?}", fields);
            return Outcome::Incomplete;
        };

        match store.within_transaction(&[Row::Sensor(reading)]).await {
            Ok(()) => {
                self.saved += 1;
                info!(
                    "Saved sensor data: Temp={}, Humidity={}",
                    reading.temperature, reading.humidity
                );
                Outcome::Recorded(1)
            }
            Err(e) => {
                error!("Error saving sensor data: {}", e);
                Outcome::WriteFailed
            }
        }
    }

    /// Number of readings committed by this writer
    pub fn saved(&self) -> u64 {
        self.saved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::decode_object;
    use storage::MemoryStore;

    #[tokio::test]
    async fn test_full_sample_recorded_verbatim() {
        let mut store = MemoryStore::new();
        let mut writer = TelemetryWriter::new();
        let fields = decode_object(br#"{"temp_c": 21.5, "hum_pct": 60.2, "rssi": -70}"#).unwrap();

        assert_eq!(writer.handle(&mut store, &fields).await, Outcome::Recorded(1));
        assert_eq!(
            store.sensor_data(),
            &[SensorReading {
                temperature: 21.5,
                humidity: 60.2
            }]
        );
        assert_eq!(writer.saved(), 1);
    }

    #[tokio::test]
    async fn test_partial_sample_ignored() {
        let mut store = MemoryStore::new();
        let mut writer = TelemetryWriter::new();

        let payloads: [&[u8]; 4] = [
            br#"{"temp_c": 21.5}"#,
            br#"{"hum_pct": 60.2}"#,
            br#"{"temp_c": null, "hum_pct": 60.2}"#,
            br#"{"temp_c": "warm", "hum_pct": 60.2}"#,
        ];
        for payload in payloads {
            let fields = decode_object(payload).unwrap();
            assert_eq!(writer.handle(&mut store, &fields).await, Outcome::Incomplete);
        }

        assert!(store.sensor_data().is_empty());
        assert_eq!(store.commits(), 0);
    }

    #[tokio::test]
    async fn test_write_failure_loses_reading() {
        let mut store = MemoryStore::new();
        store.fail_next_transactions(1);
        let mut writer = TelemetryWriter::new();
        let fields = decode_object(br#"{"temp_c": 19, "hum_pct": 40}"#).unwrap();

        assert_eq!(writer.handle(&mut store, &fields).await, Outcome::WriteFailed);
        assert!(store.sensor_data().is_empty());
        assert_eq!(writer.saved(), 0);
    }

    #[test]
    fn test_integer_values_accepted() {
        let fields = decode_object(br#"{"temp_c": 22, "hum_pct": 55}"#).unwrap();
        let reading = TelemetryWriter::reading(&fields).unwrap();
        assert_eq!(reading.temperature, 22.0);
        assert_eq!(reading.humidity, 55.0);
    }
}
