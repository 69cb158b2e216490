//! Anomaly records and the detection engine that produces them.

pub mod engine;

pub use engine::{DetectionEngine, SinkStats};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::telemetry::{Geography, MessageType, SignalSnapshot};

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("unknown message type '{0}'")]
    UnknownMessageType(String),
    #[error("unknown geography '{0}'")]
    UnknownGeography(String),
    #[error("signal '{signal}' is not part of {message_type}")]
    UnknownSignal {
        message_type: MessageType,
        signal: String,
    },
    #[error("outlier model for {0} is not trained yet")]
    ModelNotTrained(MessageType),
    #[error("insufficient training data: need at least {needed} samples, have {have}")]
    InsufficientTrainingData { needed: usize, have: usize },
    #[error("invalid model parameter: {0}")]
    InvalidModelParameter(String),
}

/// Severity levels for detected anomalies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

/// The closed vocabulary of anomaly tags consumed by dashboards and alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    // Temporal
    SuddenSpeedChange,
    SuddenTemperatureChange,
    SuddenGearChange,
    SuddenEngineSpeedChange,
    SuddenBatteryDrop,
    SuddenCabinTemperatureChange,
    // Geography
    HighSpeedInRain,
    HighTemperatureInMountainous,
    HighSpeedInMountainous,
    HighTemperatureInHot,
    HighCabinTemperature,
    AcOffInHot,
    HighSpeedInSnow,
    LowCabinTemperature,
    HighSpeedInUrban,
    HighEngineSpeed,
    LowSpeedInHighway,
    // Absolute / cross-signal
    CriticalEngineTemperature,
    CriticalBatteryLevel,
    LowBatteryLevel,
    GearSpeedMismatch,
    CriticalGearMismatch,
    CriticalLowCabinTemperature,
    CriticalHighCabinTemperature,
    // Outlier model
    IsolationForest,
}

impl AnomalyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyType::SuddenSpeedChange => "sudden_speed_change",
            AnomalyType::SuddenTemperatureChange => "sudden_temperature_change",
            AnomalyType::SuddenGearChange => "sudden_gear_change",
            AnomalyType::SuddenEngineSpeedChange => "sudden_engine_speed_change",
            AnomalyType::SuddenBatteryDrop => "sudden_battery_drop",
            AnomalyType::SuddenCabinTemperatureChange => "sudden_cabin_temperature_change",
            AnomalyType::HighSpeedInRain => "high_speed_in_rain",
            AnomalyType::HighTemperatureInMountainous => "high_temperature_in_mountainous",
            AnomalyType::HighSpeedInMountainous => "high_speed_in_mountainous",
            AnomalyType::HighTemperatureInHot => "high_temperature_in_hot",
            AnomalyType::HighCabinTemperature => "high_cabin_temperature",
            AnomalyType::AcOffInHot => "ac_off_in_hot",
            AnomalyType::HighSpeedInSnow => "high_speed_in_snow",
            AnomalyType::LowCabinTemperature => "low_cabin_temperature",
            AnomalyType::HighSpeedInUrban => "high_speed_in_urban",
            AnomalyType::HighEngineSpeed => "high_engine_speed",
            AnomalyType::LowSpeedInHighway => "low_speed_in_highway",
            AnomalyType::CriticalEngineTemperature => "critical_engine_temperature",
            AnomalyType::CriticalBatteryLevel => "critical_battery_level",
            AnomalyType::LowBatteryLevel => "low_battery_level",
            AnomalyType::GearSpeedMismatch => "gear_speed_mismatch",
            AnomalyType::CriticalGearMismatch => "critical_gear_mismatch",
            AnomalyType::CriticalLowCabinTemperature => "critical_low_cabin_temperature",
            AnomalyType::CriticalHighCabinTemperature => "critical_high_cabin_temperature",
            AnomalyType::IsolationForest => "isolation_forest",
        }
    }
}

impl std::fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected anomaly. Ownership passes to the sink once emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub id: uuid::Uuid,
    pub vehicle_id: String,
    pub anomaly_type: AnomalyType,
    pub message_type: MessageType,
    pub geography: Geography,
    pub severity: Severity,
    pub signals: SignalSnapshot,
    pub details: String,
    pub detected_at: chrono::DateTime<chrono::Utc>,
}
