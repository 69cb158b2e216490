//! Decoded telemetry: message types, geographies, and signal snapshots.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::detect::DetectError;

/// Category of telemetry message; fixes which signals it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MessageType {
    EngineData,
    VehicleData,
    ClimateControl,
}

impl MessageType {
    pub const ALL: [MessageType; 3] = [
        MessageType::EngineData,
        MessageType::VehicleData,
        MessageType::ClimateControl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::EngineData => "EngineData",
            MessageType::VehicleData => "VehicleData",
            MessageType::ClimateControl => "ClimateControl",
        }
    }

    /// The signal names a message of this type is allowed to carry.
    pub fn signals(&self) -> &'static [&'static str] {
        match self {
            MessageType::EngineData => &[signal::ENGINE_SPEED, signal::ENGINE_TEMP, signal::BATTERY_LEVEL],
            MessageType::VehicleData => &[signal::SPEED, signal::GEAR_POSITION, signal::BATTERY_VOLTAGE],
            MessageType::ClimateControl => &[signal::CABIN_TEMP, signal::FAN_SPEED, signal::AC_STATUS],
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = DetectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EngineData" => Ok(MessageType::EngineData),
            "VehicleData" => Ok(MessageType::VehicleData),
            "ClimateControl" => Ok(MessageType::ClimateControl),
            other => Err(DetectError::UnknownMessageType(other.to_string())),
        }
    }
}

/// Road and weather context a vehicle is currently in. Supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Geography {
    Rainy,
    Mountainous,
    Urban,
    Highway,
    Hot,
    Snowy,
}

impl Geography {
    pub const ALL: [Geography; 6] = [
        Geography::Rainy,
        Geography::Mountainous,
        Geography::Urban,
        Geography::Highway,
        Geography::Hot,
        Geography::Snowy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Geography::Rainy => "rainy",
            Geography::Mountainous => "mountainous",
            Geography::Urban => "urban",
            Geography::Highway => "highway",
            Geography::Hot => "hot",
            Geography::Snowy => "snowy",
        }
    }
}

impl std::fmt::Display for Geography {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Geography {
    type Err = DetectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Geography::ALL
            .iter()
            .copied()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| DetectError::UnknownGeography(s.to_string()))
    }
}

/// Signal names as they appear on the bus.
pub mod signal {
    pub const ENGINE_SPEED: &str = "EngineSpeed";
    pub const ENGINE_TEMP: &str = "EngineTemp";
    pub const BATTERY_LEVEL: &str = "BatteryLevel";
    pub const SPEED: &str = "Speed";
    pub const GEAR_POSITION: &str = "GearPosition";
    pub const BATTERY_VOLTAGE: &str = "BatteryVoltage";
    pub const CABIN_TEMP: &str = "CabinTemp";
    pub const FAN_SPEED: &str = "FanSpeed";
    pub const AC_STATUS: &str = "ACStatus";
}

/// One decoded message's named numeric values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalSnapshot(BTreeMap<String, f64>);

impl SignalSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.0.insert(name.into(), value);
    }

    /// The observed value, or `None` when the message did not carry it.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    /// Missing signals count as zero. Only for numeric projection, never for display.
    pub fn value_or_zero(&self, name: &str) -> f64 {
        self.get(name).unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for SignalSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// A message as delivered by the transport, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodedMessage {
    pub vehicle_id: String,
    pub message_type: String,
    pub geography: String,
    pub signals: BTreeMap<String, f64>,
}

/// A message whose type, geography, and signal names have been checked.
#[derive(Debug, Clone)]
pub struct ValidatedMessage {
    pub vehicle_id: String,
    pub message_type: MessageType,
    pub geography: Geography,
    pub snapshot: SignalSnapshot,
}

impl DecodedMessage {
    /// Check the message against the closed sets before it reaches any state.
    pub fn validate(self) -> Result<ValidatedMessage, DetectError> {
        let message_type: MessageType = self.message_type.parse()?;
        let geography: Geography = self.geography.parse()?;

        let known = message_type.signals();
        if let Some(unknown) = self.signals.keys().find(|name| !known.contains(&name.as_str())) {
            return Err(DetectError::UnknownSignal {
                message_type,
                signal: unknown.clone(),
            });
        }

        Ok(ValidatedMessage {
            vehicle_id: self.vehicle_id,
            message_type,
            geography,
            snapshot: SignalSnapshot(self.signals),
        })
    }
}
