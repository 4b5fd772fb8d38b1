//! In-memory store
//!
//! Same all-or-nothing contract as [`Database`](crate::Database), without a
//! server. Failures can be injected to exercise rollback paths.

use crate::records::{DeviceEvent, Row, SensorReading};
use crate::{StorageError, Store};
use async_trait::async_trait;
use tracing::debug;

/// Store that keeps committed rows in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Committed `sensor_data` rows
    sensor_data: Vec<SensorReading>,
    /// Committed `device_events` rows
    device_events: Vec<DeviceEvent>,
    /// Number of upcoming transactions that will fail and roll back
    pending_failures: usize,
    /// Committed transaction count
    commits: usize,
    /// Rolled back transaction count
    rollbacks: usize,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` transactions fail and roll back
    pub fn fail_next_transactions(&mut self, n: usize) {
        self.pending_failures = n;
    }

    /// Committed sensor readings, oldest first
    pub fn sensor_data(&self) -> &[SensorReading] {
        &self.sensor_data
    }

    /// Committed device events, oldest first
    pub fn device_events(&self) -> &[DeviceEvent] {
        &self.device_events
    }

    /// Number of committed transactions
    pub fn commits(&self) -> usize {
        self.commits
    }

    /// Number of rolled back transactions
    pub fn rollbacks(&self) -> usize {
        self.rollbacks
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn within_transaction(&mut self, rows: &[Row]) -> Result<(), StorageError> {
        if rows.is_empty() {
            return Ok(());
        }

        if self.pending_failures > 0 {
            self.pending_failures -= 1;
            self.rollbacks += 1;
            return Err(StorageError::DatabaseError(
                "simulated write failure".to_string(),
            ));
        }

        for row in rows {
            match row {
                Row::Sensor(reading) => self.sensor_data.push(*reading),
                Row::Device(event) => self.device_events.push(event.clone()),
            }
        }
        self.commits += 1;
        debug!("Committed {} row(s) in memory", rows.len());
        Ok(())
    }
}
