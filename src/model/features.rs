//! Fixed projection from a snapshot to the vector its model consumes.

use crate::telemetry::{signal, MessageType, SignalSnapshot};

pub const FEATURE_DIM: usize = 3;

pub type FeatureVector = [f64; FEATURE_DIM];

/// Signals feeding each model, in vector order.
pub fn feature_names(message_type: MessageType) -> [&'static str; FEATURE_DIM] {
    match message_type {
        MessageType::EngineData => [signal::ENGINE_SPEED, signal::ENGINE_TEMP, signal::BATTERY_LEVEL],
        MessageType::VehicleData => [signal::SPEED, signal::GEAR_POSITION, signal::BATTERY_VOLTAGE],
        MessageType::ClimateControl => [signal::CABIN_TEMP, signal::FAN_SPEED, signal::AC_STATUS],
    }
}

/// Missing signals project as 0. Fan speed and AC status are discrete.
pub fn project(message_type: MessageType, snapshot: &SignalSnapshot) -> FeatureVector {
    let [a, b, c] = feature_names(message_type);
    let v = |name: &str| snapshot.value_or_zero(name);
    match message_type {
        MessageType::ClimateControl => [v(a), v(b).trunc(), v(c).trunc()],
        _ => [v(a), v(b), v(c)],
    }
}
