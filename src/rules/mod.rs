//! Deterministic rule checks over a vehicle's signals.
//!
//! Three independent families:
//! - [`temporal`]: deltas against the previous snapshot of the same type
//! - [`geography`]: thresholds that depend on where the vehicle is
//! - [`absolute`]: hard limits and cross-signal consistency
//!
//! Every family is a pure function of its inputs. A rule whose input signal
//! is missing from the snapshot does not fire.

pub mod absolute;
pub mod explain;
pub mod geography;
pub mod temporal;

use crate::detect::{AnomalyType, Severity};
use crate::telemetry::{Geography, MessageType, SignalSnapshot};

/// Whether a rule's hits reach the sink in the base behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Always forwarded to the sink.
    Reported,
    /// Always logged; forwarded only when diagnostics are promoted.
    Diagnostic,
}

/// A single rule firing.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleHit {
    pub anomaly_type: AnomalyType,
    pub severity: Severity,
    pub tier: Tier,
    pub details: String,
}

impl RuleHit {
    pub fn reported(anomaly_type: AnomalyType, details: String) -> Self {
        Self {
            anomaly_type,
            severity: Severity::Warning,
            tier: Tier::Reported,
            details,
        }
    }

    pub fn diagnostic(anomaly_type: AnomalyType, severity: Severity, details: String) -> Self {
        Self {
            anomaly_type,
            severity,
            tier: Tier::Diagnostic,
            details,
        }
    }
}

/// Run every applicable family. `previous` is `None` for the first snapshot
/// of a type, which skips the temporal family.
pub fn evaluate(
    message_type: MessageType,
    current: &SignalSnapshot,
    previous: Option<&SignalSnapshot>,
    geography: Geography,
) -> Vec<RuleHit> {
    let mut hits = Vec::new();
    if let Some(previous) = previous {
        hits.extend(temporal::evaluate(message_type, previous, current));
    }
    hits.extend(geography::evaluate(geography, message_type, current));
    hits.extend(absolute::evaluate(message_type, current));
    hits
}
