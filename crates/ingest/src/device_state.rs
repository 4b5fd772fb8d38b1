//! Device-State Writer
//!
//! Devices report their full state on every message; only changes are
//! persisted. The last committed value per device lives in a
//! [`DeviceStateTable`] owned by the writer.

use crate::payload::Fields;
use crate::Outcome;
use serde_json::Value;
use std::collections::HashMap;
use storage::{Device, DeviceEvent, Row, Store};
use tracing::{debug, error, info};

/// Last committed state per device.
///
/// Starts empty on every process start, so the first value seen for a device
/// is always a transition.
#[derive(Debug, Default, Clone)]
pub struct DeviceStateTable {
    states: HashMap<Device, String>,
}

impl DeviceStateTable {
    /// Create an empty table (every device unknown)
    pub fn new() -> Self {
        Self::default()
    }

    /// Last committed value, `None` while unknown
    pub fn get(&self, device: Device) -> Option<&str> {
        self.states.get(&device).map(String::as_str)
    }

    /// Whether `value` differs from the last committed value
    pub fn is_transition(&self, device: Device, value: &str) -> bool {
        self.get(device) != Some(value)
    }

    /// Number of devices with a known state
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether every device is still unknown
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    fn record(&mut self, device: Device, value: String) {
        self.states.insert(device, value);
    }
}

/// Writes `device_events` rows for state transitions
#[derive(Debug, Default)]
pub struct DeviceStateWriter {
    table: DeviceStateTable,
}

impl DeviceStateWriter {
    /// Create a writer with every device in the unknown state
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only view of the last committed states
    pub fn table(&self) -> &DeviceStateTable {
        &self.table
    }

    /// Transitions carried by `fields`, in [`Device::ALL`] order
    pub fn transitions(&self, fields: &Fields) -> Vec<DeviceEvent> {
        let mut staged = Vec::new();

        for device in Device::ALL {
            let Some(raw) = fields.get(device.as_str()) else {
                continue;
            };
            let Some(value) = state_value(raw) else {
                if !raw.is_null() {
                    debug!("Ignoring non-scalar state for {}: {}", device, raw);
                }
                continue;
            };

            if self.table.is_transition(device, &value) {
                staged.push(DeviceEvent {
                    device,
                    event: value,
                });
            } else {
                debug!("{} unchanged ({})", device, value);
            }
        }

        staged
    }

    /// Persist every transition in `fields` within one transaction.
    ///
    /// The table only advances after the commit succeeds. On rollback no
    /// device advances, so the same values are treated as transitions again
    /// next time.
    pub async fn handle<S: Store + ?Sized>(&mut self, store: &mut S, fields: &Fields) -> Outcome {
        let staged = self.transitions(fields);
        if staged.is_empty() {
            return Outcome::Unchanged;
        }

        let rows: Vec<Row> = staged.iter().cloned().map(Row::Device).collect();
        match store.within_transaction(&rows).await {
            Ok(()) => {
                let count = staged.len();
                for event in staged {
                    info!("Saved event: {} changed to {}", event.device, event.event);
                    self.table.record(event.device, event.event);
                }
                Outcome::Recorded(count)
            }
            Err(e) => {
                error!("Error saving device event: {}", e);
                Outcome::WriteFailed
            }
        }
    }
}

/// Text form of a reported state. Strings are kept verbatim, booleans and
/// numbers use their JSON text; `null`, arrays and objects carry no state.
fn state_value(raw: &Value) -> Option<String> {
    match raw {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
