//! Human-readable reasons attached to outlier-model anomalies.
//!
//! The model only says "unusual". The reasons come from the absolute limits
//! for the message's own signals, plus a few softer hints that are only worth
//! mentioning once the model has already flagged the reading.

use crate::rules::absolute;
use crate::telemetry::{signal, MessageType, SignalSnapshot};

pub fn explain(message_type: MessageType, s: &SignalSnapshot) -> String {
    let mut reasons: Vec<String> = absolute::evaluate(message_type, s)
        .into_iter()
        .map(|hit| hit.details)
        .collect();
    reasons.extend(hints(message_type, s));

    if reasons.is_empty() {
        format!(
            "outlier model flagged {}: unusual signal combination, no individual threshold crossed",
            message_type
        )
    } else {
        format!("outlier model flagged {}: {}", message_type, reasons.join("; "))
    }
}

fn hints(message_type: MessageType, s: &SignalSnapshot) -> Vec<String> {
    let mut out = Vec::new();
    match message_type {
        MessageType::EngineData => {
            if let Some(t) = s.get(signal::ENGINE_TEMP).filter(|t| *t > 100.0) {
                out.push(format!("engine running hot ({:.1}°C), inspect cooling", t));
            }
            if let Some(rpm) = s.get(signal::ENGINE_SPEED).filter(|r| *r > 5000.0) {
                out.push(format!("engine speed very high ({:.1} rpm)", rpm));
            }
            if let Some(level) = s.get(signal::BATTERY_LEVEL).filter(|l| *l < 20.0) {
                out.push(format!("charge the vehicle ({:.1}%)", level));
            }
        }
        MessageType::VehicleData => {
            let speed = s.get(signal::SPEED);
            if let Some(v) = speed.filter(|v| *v > 120.0) {
                out.push(format!("excessive speed ({:.1} km/h), slow down", v));
            }
            if let (Some(v), Some(gear)) = (speed, s.get(signal::GEAR_POSITION)) {
                if v > 60.0 && gear <= 2.0 {
                    out.push("low gear at high speed, shift up".to_string());
                }
            }
            if let Some(volts) = s
                .get(signal::BATTERY_VOLTAGE)
                .filter(|v| !(370.0..=410.0).contains(v))
            {
                out.push(format!("abnormal battery voltage ({:.1} V)", volts));
            }
        }
        MessageType::ClimateControl => {
            let cabin = s.get(signal::CABIN_TEMP);
            let ac = s.get(signal::AC_STATUS).map(f64::trunc);
            let fan = s.get(signal::FAN_SPEED).map(f64::trunc);
            let hot_cabin = cabin.map(|c| c > 30.0).unwrap_or(false);

            if hot_cabin && ac == Some(0.0) {
                out.push("hot cabin with AC off".to_string());
            }
            if hot_cabin && fan == Some(0.0) {
                out.push("hot cabin with fan off, run the fan".to_string());
            }
            if ac == Some(1.0) && fan == Some(0.0) {
                out.push("inconsistent data: AC on while fan is off".to_string());
            }
        }
    }
    out
}
