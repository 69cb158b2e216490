//! Hard limits and cross-signal consistency checks, independent of history
//! and geography.

use crate::detect::{AnomalyType, Severity};
use crate::rules::RuleHit;
use crate::telemetry::{signal, MessageType, SignalSnapshot};

pub const CRITICAL_ENGINE_TEMP: f64 = 120.0;
pub const CRITICAL_BATTERY_LEVEL: f64 = 20.0;
pub const LOW_BATTERY_LEVEL: f64 = 30.0;
pub const CRITICAL_LOW_CABIN_TEMP: f64 = 10.0;
pub const CRITICAL_HIGH_CABIN_TEMP: f64 = 30.0;
/// Allowed distance between the expected and the engaged gear.
pub const GEAR_TOLERANCE: i64 = 1;

/// Gear a vehicle is expected to be in at `speed` km/h.
pub fn expected_gear(speed: f64) -> i64 {
    match speed {
        s if s <= 20.0 => 1,
        s if s <= 40.0 => 2,
        s if s <= 70.0 => 3,
        s if s <= 100.0 => 4,
        s if s <= 150.0 => 5,
        _ => 6,
    }
}

pub fn evaluate(message_type: MessageType, current: &SignalSnapshot) -> Vec<RuleHit> {
    match message_type {
        MessageType::EngineData => engine(current),
        MessageType::VehicleData => drivetrain(current),
        MessageType::ClimateControl => climate(current),
    }
}

fn engine(s: &SignalSnapshot) -> Vec<RuleHit> {
    let mut hits = Vec::new();

    if let Some(temp) = s.get(signal::ENGINE_TEMP) {
        if temp > CRITICAL_ENGINE_TEMP {
            hits.push(RuleHit::diagnostic(
                AnomalyType::CriticalEngineTemperature,
                Severity::Critical,
                format!("critical engine temperature: {:.1}°C", temp),
            ));
        }
    }

    if let Some(level) = s.get(signal::BATTERY_LEVEL) {
        if level < CRITICAL_BATTERY_LEVEL {
            hits.push(RuleHit::diagnostic(
                AnomalyType::CriticalBatteryLevel,
                Severity::Critical,
                format!("critical battery level: {:.1}%, charging required", level),
            ));
        } else if level < LOW_BATTERY_LEVEL {
            hits.push(RuleHit::diagnostic(
                AnomalyType::LowBatteryLevel,
                Severity::Warning,
                format!("low battery level: {:.1}%", level),
            ));
        }
    }

    hits
}

fn drivetrain(s: &SignalSnapshot) -> Vec<RuleHit> {
    let mut hits = Vec::new();
    let (Some(speed), Some(gear)) = (s.get(signal::SPEED), s.get(signal::GEAR_POSITION)) else {
        return hits;
    };
    // Standing still, any gear is fine.
    if speed <= 0.0 {
        return hits;
    }

    let gear = gear.trunc() as i64;
    let expected = expected_gear(speed);

    if (expected - gear).abs() > GEAR_TOLERANCE {
        hits.push(RuleHit::diagnostic(
            AnomalyType::GearSpeedMismatch,
            Severity::Warning,
            format!(
                "gear/speed mismatch: gear {} at {:.1} km/h, expected gear {}",
                gear, speed, expected
            ),
        ));
    }

    if speed > 100.0 && gear <= 2 {
        hits.push(RuleHit::diagnostic(
            AnomalyType::CriticalGearMismatch,
            Severity::Critical,
            format!("dangerously low gear {} at {:.1} km/h, shift up", gear, speed),
        ));
    } else if speed < 20.0 && gear >= 3 {
        hits.push(RuleHit::diagnostic(
            AnomalyType::CriticalGearMismatch,
            Severity::Critical,
            format!("dangerously high gear {} at {:.1} km/h, shift down", gear, speed),
        ));
    }

    hits
}

fn climate(s: &SignalSnapshot) -> Vec<RuleHit> {
    let Some(cabin) = s.get(signal::CABIN_TEMP) else {
        return Vec::new();
    };
    let ac_off = s.get(signal::AC_STATUS).map(|v| v.trunc() == 0.0).unwrap_or(false);

    let (anomaly_type, mut details, advice) = if cabin < CRITICAL_LOW_CABIN_TEMP {
        (
            AnomalyType::CriticalLowCabinTemperature,
            format!("critically low cabin temperature: {:.1}°C", cabin),
            "turn on climate control and heating",
        )
    } else if cabin > CRITICAL_HIGH_CABIN_TEMP {
        (
            AnomalyType::CriticalHighCabinTemperature,
            format!("critically high cabin temperature: {:.1}°C", cabin),
            "turn on climate control and cooling",
        )
    } else {
        return Vec::new();
    };

    if ac_off {
        details.push_str("; AC is off, ");
        details.push_str(advice);
    }

    vec![RuleHit::diagnostic(anomaly_type, Severity::Critical, details)]
}
