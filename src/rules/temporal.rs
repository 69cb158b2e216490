//! Sudden changes between consecutive snapshots of the same message type.

use crate::detect::{AnomalyType, Severity};
use crate::rules::{RuleHit, Tier};
use crate::telemetry::{signal, MessageType, SignalSnapshot};

#[derive(Debug, Clone, Copy)]
enum Change {
    /// |current - previous| > threshold
    Either(f64),
    /// previous - current > threshold
    Drop(f64),
}

struct TemporalRule {
    message_type: MessageType,
    signal: &'static str,
    change: Change,
    anomaly_type: AnomalyType,
    tier: Tier,
    label: &'static str,
    unit: &'static str,
}

const RULES: &[TemporalRule] = &[
    TemporalRule {
        message_type: MessageType::VehicleData,
        signal: signal::SPEED,
        change: Change::Either(20.0),
        anomaly_type: AnomalyType::SuddenSpeedChange,
        tier: Tier::Reported,
        label: "sudden speed change",
        unit: " km/h",
    },
    TemporalRule {
        message_type: MessageType::VehicleData,
        signal: signal::GEAR_POSITION,
        change: Change::Either(1.0),
        anomaly_type: AnomalyType::SuddenGearChange,
        tier: Tier::Diagnostic,
        label: "gears skipped",
        unit: "",
    },
    TemporalRule {
        message_type: MessageType::EngineData,
        signal: signal::ENGINE_TEMP,
        change: Change::Either(15.0),
        anomaly_type: AnomalyType::SuddenTemperatureChange,
        tier: Tier::Reported,
        label: "sudden temperature change",
        unit: "°C",
    },
    TemporalRule {
        message_type: MessageType::EngineData,
        signal: signal::ENGINE_SPEED,
        change: Change::Either(2000.0),
        anomaly_type: AnomalyType::SuddenEngineSpeedChange,
        tier: Tier::Diagnostic,
        label: "sudden engine speed change",
        unit: " rpm",
    },
    TemporalRule {
        message_type: MessageType::EngineData,
        signal: signal::BATTERY_LEVEL,
        change: Change::Drop(10.0),
        anomaly_type: AnomalyType::SuddenBatteryDrop,
        tier: Tier::Diagnostic,
        label: "sudden battery drop",
        unit: "%",
    },
    TemporalRule {
        message_type: MessageType::ClimateControl,
        signal: signal::CABIN_TEMP,
        change: Change::Either(5.0),
        anomaly_type: AnomalyType::SuddenCabinTemperatureChange,
        tier: Tier::Diagnostic,
        label: "sudden cabin temperature change",
        unit: "°C",
    },
];

pub fn evaluate(
    message_type: MessageType,
    previous: &SignalSnapshot,
    current: &SignalSnapshot,
) -> Vec<RuleHit> {
    RULES
        .iter()
        .filter(|rule| rule.message_type == message_type)
        .filter_map(|rule| {
            let before = previous.get(rule.signal)?;
            let after = current.get(rule.signal)?;
            let (delta, threshold) = match rule.change {
                Change::Either(t) => ((after - before).abs(), t),
                Change::Drop(t) => (before - after, t),
            };
            if delta <= threshold {
                return None;
            }
            let details = format!(
                "{}: {:.1}{unit} ({:.1}{unit} -> {:.1}{unit})",
                rule.label,
                delta,
                before,
                after,
                unit = rule.unit
            );
            Some(match rule.tier {
                Tier::Reported => RuleHit::reported(rule.anomaly_type, details),
                Tier::Diagnostic => RuleHit::diagnostic(rule.anomaly_type, Severity::Warning, details),
            })
        })
        .collect()
}
