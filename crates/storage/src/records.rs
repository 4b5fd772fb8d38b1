//! Row types written by the logger

use serde::{Deserialize, Serialize};
use std::fmt;

/// Devices whose on/off state is tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Light,
    Fan,
}

impl Device {
    /// Every tracked device, in the order a state message is evaluated
    pub const ALL: [Device; 2] = [Device::Light, Device::Fan];

    /// Payload key and `device_events.device` value
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Light => "light",
            Device::Fan => "fan",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One temperature/humidity sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub temperature: f64,
    pub humidity: f64,
}

/// A device switching to a new state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEvent {
    pub device: Device,
    pub event: String,
}

/// A row staged for insertion
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Sensor(SensorReading),
    Device(DeviceEvent),
}

impl Row {
    /// Parameterised INSERT for this row's table
    pub fn insert_sql(&self) -> &'static str {
        match self {
            Row::Sensor(_) => "INSERT INTO sensor_data (temperature, humidity) VALUES ($1, $2)",
            Row::Device(_) => "INSERT INTO device_events (device, event) VALUES ($1, $2)",
        }
    }

    /// Destination table
    pub fn table(&self) -> &'static str {
        match self {
            Row::Sensor(_) => "sensor_data",
            Row::Device(_) => "device_events",
        }
    }
}

impl From<SensorReading> for Row {
    fn from(reading: SensorReading) -> Self {
        Row::Sensor(reading)
    }
}

impl From<DeviceEvent> for Row {
    fn from(event: DeviceEvent) -> Self {
        Row::Device(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_names() {
        assert_eq!(Device::Light.as_str(), "light");
        assert_eq!(Device::Fan.to_string(), "fan");
        assert_eq!(Device::ALL, [Device::Light, Device::Fan]);
    }

    #[test]
    fn test_insert_targets() {
        let sensor = Row::from(SensorReading {
            temperature: 21.5,
            humidity: 60.2,
        });
        assert_eq!(sensor.table(), "sensor_data");
        assert!(sensor.insert_sql().contains("(temperature, humidity)"));

        let event = Row::from(DeviceEvent {
            device: Device::Light,
            event: "on".to_string(),
        });
        assert_eq!(event.table(), "device_events");
        assert!(event.insert_sql().contains("(device, event)"));
    }
}
