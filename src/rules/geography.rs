//! Geography-dependent thresholds, keyed by (geography, message type).

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::detect::AnomalyType;
use crate::rules::RuleHit;
use crate::telemetry::{signal, Geography, MessageType, SignalSnapshot};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Condition {
    Above(f64),
    Below(f64),
    Equals(f64),
}

impl Condition {
    pub fn holds(&self, value: f64) -> bool {
        match *self {
            Condition::Above(t) => value > t,
            Condition::Below(t) => value < t,
            Condition::Equals(t) => value == t,
        }
    }
}

#[derive(Debug)]
pub struct GeographyRule {
    pub geography: Geography,
    pub message_type: MessageType,
    pub signal: &'static str,
    pub condition: Condition,
    pub anomaly_type: AnomalyType,
    label: &'static str,
    unit: &'static str,
}

impl GeographyRule {
    fn details(&self, value: f64) -> String {
        if self.unit.is_empty() {
            self.label.to_string()
        } else {
            format!("{}: {:.1}{}", self.label, value, self.unit)
        }
    }
}

pub const RULES: &[GeographyRule] = &[
    GeographyRule {
        geography: Geography::Rainy,
        message_type: MessageType::VehicleData,
        signal: signal::SPEED,
        condition: Condition::Above(70.0),
        anomaly_type: AnomalyType::HighSpeedInRain,
        label: "high speed in rain",
        unit: " km/h",
    },
    GeographyRule {
        geography: Geography::Mountainous,
        message_type: MessageType::EngineData,
        signal: signal::ENGINE_TEMP,
        condition: Condition::Above(95.0),
        anomaly_type: AnomalyType::HighTemperatureInMountainous,
        label: "high engine temperature in mountainous terrain",
        unit: "°C",
    },
    GeographyRule {
        geography: Geography::Mountainous,
        message_type: MessageType::VehicleData,
        signal: signal::SPEED,
        condition: Condition::Above(70.0),
        anomaly_type: AnomalyType::HighSpeedInMountainous,
        label: "high speed in mountainous terrain",
        unit: " km/h",
    },
    GeographyRule {
        geography: Geography::Hot,
        message_type: MessageType::EngineData,
        signal: signal::ENGINE_TEMP,
        condition: Condition::Above(100.0),
        anomaly_type: AnomalyType::HighTemperatureInHot,
        label: "high engine temperature in hot climate",
        unit: "°C",
    },
    GeographyRule {
        geography: Geography::Hot,
        message_type: MessageType::ClimateControl,
        signal: signal::CABIN_TEMP,
        condition: Condition::Above(28.0),
        anomaly_type: AnomalyType::HighCabinTemperature,
        label: "high cabin temperature",
        unit: "°C",
    },
    GeographyRule {
        geography: Geography::Hot,
        message_type: MessageType::ClimateControl,
        signal: signal::AC_STATUS,
        condition: Condition::Equals(0.0),
        anomaly_type: AnomalyType::AcOffInHot,
        label: "air conditioning is off in hot climate",
        unit: "",
    },
    GeographyRule {
        geography: Geography::Snowy,
        message_type: MessageType::VehicleData,
        signal: signal::SPEED,
        condition: Condition::Above(50.0),
        anomaly_type: AnomalyType::HighSpeedInSnow,
        label: "high speed in snow",
        unit: " km/h",
    },
    GeographyRule {
        geography: Geography::Snowy,
        message_type: MessageType::ClimateControl,
        signal: signal::CABIN_TEMP,
        condition: Condition::Below(18.0),
        anomaly_type: AnomalyType::LowCabinTemperature,
        label: "low cabin temperature",
        unit: "°C",
    },
    GeographyRule {
        geography: Geography::Urban,
        message_type: MessageType::VehicleData,
        signal: signal::SPEED,
        condition: Condition::Above(60.0),
        anomaly_type: AnomalyType::HighSpeedInUrban,
        label: "urban speed limit exceeded",
        unit: " km/h",
    },
    GeographyRule {
        geography: Geography::Urban,
        message_type: MessageType::EngineData,
        signal: signal::ENGINE_SPEED,
        condition: Condition::Above(4000.0),
        anomaly_type: AnomalyType::HighEngineSpeed,
        label: "high engine speed",
        unit: " rpm",
    },
    GeographyRule {
        geography: Geography::Highway,
        message_type: MessageType::VehicleData,
        signal: signal::SPEED,
        condition: Condition::Below(60.0),
        anomaly_type: AnomalyType::LowSpeedInHighway,
        label: "low speed on highway",
        unit: " km/h",
    },
];

type RuleIndex = HashMap<(Geography, MessageType), Vec<&'static GeographyRule>>;

fn index() -> &'static RuleIndex {
    static INDEX: OnceLock<RuleIndex> = OnceLock::new();
    INDEX.get_or_init(|| {
        let mut map: RuleIndex = HashMap::new();
        for rule in RULES {
            map.entry((rule.geography, rule.message_type)).or_default().push(rule);
        }
        map
    })
}

/// Rules active for a vehicle in `geography` receiving a `message_type` message.
pub fn rules_for(geography: Geography, message_type: MessageType) -> &'static [&'static GeographyRule] {
    index()
        .get(&(geography, message_type))
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Switch-like signals are compared by their integer part.
fn discrete(name: &str, value: f64) -> f64 {
    if name == signal::AC_STATUS || name == signal::FAN_SPEED {
        value.trunc()
    } else {
        value
    }
}

pub fn evaluate(geography: Geography, message_type: MessageType, current: &SignalSnapshot) -> Vec<RuleHit> {
    rules_for(geography, message_type)
        .iter()
        .filter_map(|rule| {
            let value = discrete(rule.signal, current.get(rule.signal)?);
            rule.condition
                .holds(value)
                .then(|| RuleHit::reported(rule.anomaly_type, rule.details(value)))
        })
        .collect()
}
