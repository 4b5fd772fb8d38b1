//! Ingestion Pipeline
//!
//! Turns bus messages into database rows:
//! - payload decoding and topic routing
//! - unconditional telemetry inserts
//! - device-state inserts on transitions only

mod device_state;
mod payload;
mod router;
mod telemetry;

pub use device_state::{DeviceStateTable, DeviceStateWriter};
pub use payload::{decode_object, DecodeError, Fields};
pub use router::{Route, Router, DEVICE_TOPIC_SUFFIX, SENSOR_TOPIC_SUFFIX};
pub use telemetry::{TelemetryWriter, HUMIDITY_KEY, TEMPERATURE_KEY};

pub use storage::{Device, DeviceEvent, SensorReading};

/// What happened to a single inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Payload was not a JSON object; dropped
    Malformed,
    /// Topic matched no handler
    Ignored,
    /// Telemetry sample missing a field; dropped
    Incomplete,
    /// No device changed state; nothing written
    Unchanged,
    /// Transaction committed with this many rows
    Recorded(usize),
    /// Transaction rolled back; the message's effect is discarded
    WriteFailed,
}
