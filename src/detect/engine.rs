//! Detection engine: state update, rule evaluation, outlier inference,
//! and hand-off to the anomaly sink.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::DetectorConfig;
use crate::detect::{Anomaly, AnomalyType, DetectError, Severity};
use crate::model::{Observation, OutlierModelManager, Verdict};
use crate::rules::{self, Tier};
use crate::sink::AnomalySink;
use crate::state::{StateUpdate, VehicleStateStore};
use crate::telemetry::{DecodedMessage, Geography, MessageType, SignalSnapshot};

/// Counters reported when the engine shuts down its sink writer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    pub written: usize,
    pub failed: usize,
    /// Records dropped because the sink queue was full or closed.
    pub dropped: usize,
}

/// Turns decoded messages into anomaly records.
///
/// Owns the vehicle state, drives the outlier models, and hands every
/// emitted record to a background writer so a slow or failing sink never
/// holds up detection.
pub struct DetectionEngine {
    states: VehicleStateStore,
    models: OutlierModelManager,
    promote_diagnostics: bool,
    tx: mpsc::Sender<Anomaly>,
    writer: JoinHandle<SinkStats>,
    dropped: AtomicUsize,
}

impl DetectionEngine {
    /// Must be called from within a Tokio runtime; spawns the sink writer.
    pub fn new(
        config: &DetectorConfig,
        models: OutlierModelManager,
        sink: Arc<dyn AnomalySink>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.sink_queue_capacity.max(1));
        let writer = tokio::spawn(drain(rx, sink));

        Self {
            states: VehicleStateStore::new(),
            models,
            promote_diagnostics: config.promote_diagnostics,
            tx,
            writer,
            dropped: AtomicUsize::new(0),
        }
    }

    pub fn states(&self) -> &VehicleStateStore {
        &self.states
    }

    pub fn models(&self) -> &OutlierModelManager {
        &self.models
    }

    /// Validate a transport message, then run detection on it.
    pub async fn ingest(&self, message: DecodedMessage) -> Result<Vec<Anomaly>, DetectError> {
        let msg = message.validate()?;
        Ok(self
            .handle(&msg.vehicle_id, msg.message_type, msg.snapshot, msg.geography)
            .await)
    }

    /// Run detection for one snapshot and return the records sent to the sink.
    pub async fn handle(
        &self,
        vehicle_id: &str,
        message_type: MessageType,
        snapshot: SignalSnapshot,
        geography: Geography,
    ) -> Vec<Anomaly> {
        let update = self
            .states
            .update(vehicle_id, message_type, snapshot.clone(), geography, Utc::now())
            .await;
        let previous = match &update {
            StateUpdate::First => None,
            StateUpdate::Previous(prev) => Some(prev),
        };

        let mut emitted = Vec::new();

        if let Observation::TrainingStarted = self.models.observe(message_type, &snapshot) {
            info!(vehicle_id, message_type = %message_type, "sample buffers full, training started");
        }
        if self.models.is_trained() {
            match self.models.predict(message_type, &snapshot) {
                Ok(Verdict::Anomaly {
                    score,
                    decision,
                    explanation,
                }) => {
                    debug!(vehicle_id, message_type = %message_type, score, decision, "outlier detected");
                    emitted.push(self.record(
                        vehicle_id,
                        AnomalyType::IsolationForest,
                        message_type,
                        geography,
                        Severity::Warning,
                        &snapshot,
                        explanation,
                    ));
                }
                Ok(Verdict::Normal) => {}
                Err(e) => debug!(vehicle_id, error = %e, "prediction skipped"),
            }
        }

        for hit in rules::evaluate(message_type, &snapshot, previous, geography) {
            if hit.tier == Tier::Diagnostic && !self.promote_diagnostics {
                info!(
                    vehicle_id,
                    anomaly_type = %hit.anomaly_type,
                    severity = hit.severity.as_str(),
                    details = %hit.details,
                    "diagnostic rule fired"
                );
                continue;
            }
            emitted.push(self.record(
                vehicle_id,
                hit.anomaly_type,
                message_type,
                geography,
                hit.severity,
                &snapshot,
                hit.details,
            ));
        }

        for anomaly in &emitted {
            warn!(
                vehicle_id,
                anomaly_type = %anomaly.anomaly_type,
                severity = anomaly.severity.as_str(),
                geography = %geography,
                details = %anomaly.details,
                "anomaly detected"
            );
            self.forward(anomaly.clone());
        }
        emitted
    }

    #[allow(clippy::too_many_arguments)]
    fn record(
        &self,
        vehicle_id: &str,
        anomaly_type: AnomalyType,
        message_type: MessageType,
        geography: Geography,
        severity: Severity,
        snapshot: &SignalSnapshot,
        details: String,
    ) -> Anomaly {
        Anomaly {
            id: Uuid::new_v4(),
            vehicle_id: vehicle_id.to_string(),
            anomaly_type,
            message_type,
            geography,
            severity,
            signals: snapshot.clone(),
            details,
            detected_at: Utc::now(),
        }
    }

    fn forward(&self, anomaly: Anomaly) {
        match self.tx.try_send(anomaly) {
            Ok(()) => {}
            Err(TrySendError::Full(a)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(id = %a.id, vehicle_id = %a.vehicle_id, "sink queue full, dropping anomaly");
            }
            Err(TrySendError::Closed(a)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                error!(id = %a.id, vehicle_id = %a.vehicle_id, "sink writer stopped, dropping anomaly");
            }
        }
    }

    /// Close the queue and wait for queued records to reach the sink.
    pub async fn shutdown(self) -> SinkStats {
        let Self {
            tx,
            writer,
            dropped,
            ..
        } = self;
        drop(tx);

        let mut stats = match writer.await {
            Ok(stats) => stats,
            Err(e) => {
                error!(error = %e, "sink writer task failed");
                SinkStats::default()
            }
        };
        stats.dropped = dropped.into_inner();
        stats
    }
}

async fn drain(mut rx: mpsc::Receiver<Anomaly>, sink: Arc<dyn AnomalySink>) -> SinkStats {
    let mut stats = SinkStats::default();
    while let Some(anomaly) = rx.recv().await {
        match sink.write(&anomaly).await {
            Ok(()) => stats.written += 1,
            Err(e) => {
                stats.failed += 1;
                error!(
                    id = %anomaly.id,
                    vehicle_id = %anomaly.vehicle_id,
                    anomaly_type = %anomaly.anomaly_type,
                    error = %e,
                    "failed to write anomaly, dropping"
                );
            }
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MemoryModelStore;
    use crate::sink::MemorySink;
    use tokio::sync::Semaphore;

    fn untrained_models() -> OutlierModelManager {
        let cfg = DetectorConfig {
            min_samples_per_type: 10_000,
            ..DetectorConfig::default()
        };
        OutlierModelManager::open(&cfg, Arc::new(MemoryModelStore::new())).unwrap()
    }

    fn engine_with(sink: Arc<dyn AnomalySink>, config: DetectorConfig) -> DetectionEngine {
        DetectionEngine::new(&config, untrained_models(), sink)
    }

    fn types(anomalies: &[Anomaly]) -> Vec<AnomalyType> {
        anomalies.iter().map(|a| a.anomaly_type).collect()
    }

    fn vehicle(speed: f64, gear: f64) -> SignalSnapshot {
        SignalSnapshot::new()
            .with("Speed", speed)
            .with("GearPosition", gear)
            .with("BatteryVoltage", 390.0)
    }

    #[tokio::test]
    async fn test_first_sample_has_no_temporal_anomaly() {
        let sink = Arc::new(MemorySink::new());
        let engine = engine_with(sink.clone(), DetectorConfig::default());

        let out = engine
            .handle("V1", MessageType::VehicleData, vehicle(90.0, 5.0), Geography::Highway)
            .await;
        assert!(out.is_empty());

        // A jump on the second sample is diffed.
        let out = engine
            .handle("V1", MessageType::VehicleData, vehicle(40.0, 5.0), Geography::Highway)
            .await;
        assert!(types(&out).contains(&AnomalyType::SuddenSpeedChange));
        assert!(types(&out).contains(&AnomalyType::LowSpeedInHighway));

        let stats = engine.shutdown().await;
        assert_eq!(stats.written, sink.len());
    }

    #[tokio::test]
    async fn test_rainy_scenario() {
        let sink = Arc::new(MemorySink::new());
        let engine = engine_with(sink.clone(), DetectorConfig::default());

        engine
            .handle("V1", MessageType::VehicleData, vehicle(60.0, 3.0), Geography::Rainy)
            .await;
        let out = engine
            .handle("V1", MessageType::VehicleData, vehicle(85.0, 3.0), Geography::Rainy)
            .await;

        assert_eq!(
            types(&out),
            vec![
                AnomalyType::SuddenSpeedChange,
                AnomalyType::HighSpeedInRain,
                AnomalyType::GearSpeedMismatch,
            ]
        );
        assert!(out.iter().all(|a| a.vehicle_id == "V1" && a.geography == Geography::Rainy));
        assert_eq!(out[0].signals.get("Speed"), Some(85.0));

        let stats = engine.shutdown().await;
        assert_eq!(stats, SinkStats { written: 3, failed: 0, dropped: 0 });
        assert_eq!(types(&sink.records()), types(&out));
    }

    #[tokio::test]
    async fn test_diagnostics_stay_in_log_when_not_promoted() {
        let sink = Arc::new(MemorySink::new());
        let config = DetectorConfig {
            promote_diagnostics: false,
            ..DetectorConfig::default()
        };
        let engine = engine_with(sink.clone(), config);

        engine
            .handle("V1", MessageType::VehicleData, vehicle(60.0, 3.0), Geography::Rainy)
            .await;
        let out = engine
            .handle("V1", MessageType::VehicleData, vehicle(85.0, 3.0), Geography::Rainy)
            .await;
        assert_eq!(
            types(&out),
            vec![AnomalyType::SuddenSpeedChange, AnomalyType::HighSpeedInRain]
        );
        engine.shutdown().await;
        assert_eq!(sink.len(), 2);
    }

    #[tokio::test]
    async fn test_hot_climate_scenario() {
        let sink = Arc::new(MemorySink::new());
        let engine = engine_with(sink.clone(), DetectorConfig::default());

        let climate = SignalSnapshot::new()
            .with("CabinTemp", 29.0)
            .with("FanSpeed", 3.0)
            .with("ACStatus", 0.0);
        let out = engine
            .handle("V7", MessageType::ClimateControl, climate, Geography::Hot)
            .await;
        assert_eq!(
            types(&out),
            vec![AnomalyType::HighCabinTemperature, AnomalyType::AcOffInHot]
        );
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_ingest_rejects_unknown_names_before_state() {
        let engine = engine_with(Arc::new(MemorySink::new()), DetectorConfig::default());

        let msg = |mt: &str, geo: &str| DecodedMessage {
            vehicle_id: "V9".to_string(),
            message_type: mt.to_string(),
            geography: geo.to_string(),
            signals: [("Speed".to_string(), 30.0)].into_iter().collect(),
        };

        assert!(matches!(
            engine.ingest(msg("BrakeData", "urban")).await,
            Err(DetectError::UnknownMessageType(_))
        ));
        assert!(matches!(
            engine.ingest(msg("VehicleData", "desert")).await,
            Err(DetectError::UnknownGeography(_))
        ));
        assert!(matches!(
            engine.ingest(msg("EngineData", "urban")).await,
            Err(DetectError::UnknownSignal { .. })
        ));
        assert!(engine.states().is_empty().await);

        let out = engine.ingest(msg("VehicleData", "urban")).await.unwrap();
        assert!(out.is_empty());
        assert_eq!(engine.states().len().await, 1);
        engine.shutdown().await;
    }

    struct FailingSink;

    #[async_trait::async_trait]
    impl AnomalySink for FailingSink {
        async fn write(&self, _anomaly: &Anomaly) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_block_detection() {
        let engine = engine_with(Arc::new(FailingSink), DetectorConfig::default());

        let hot_engine = SignalSnapshot::new()
            .with("EngineSpeed", 2500.0)
            .with("EngineTemp", 125.0)
            .with("BatteryLevel", 60.0);
        let mut total = 0;
        for i in 0..5 {
            let out = engine
                .handle(&format!("V{i}"), MessageType::EngineData, hot_engine.clone(), Geography::Hot)
                .await;
            assert_eq!(
                types(&out),
                vec![AnomalyType::HighTemperatureInHot, AnomalyType::CriticalEngineTemperature]
            );
            assert_eq!(out[1].severity, Severity::Critical);
            total += out.len();
        }

        let stats = engine.shutdown().await;
        assert_eq!(stats.written, 0);
        assert_eq!(stats.failed, total);
    }

    struct GatedSink {
        gate: Semaphore,
        inner: MemorySink,
    }

    #[async_trait::async_trait]
    impl AnomalySink for GatedSink {
        async fn write(&self, anomaly: &Anomaly) -> anyhow::Result<()> {
            self.gate.acquire().await?.forget();
            self.inner.write(anomaly).await
        }
    }

    #[tokio::test]
    async fn test_full_queue_drops_instead_of_waiting() {
        let sink = Arc::new(GatedSink {
            gate: Semaphore::new(0),
            inner: MemorySink::new(),
        });
        let config = DetectorConfig {
            sink_queue_capacity: 1,
            ..DetectorConfig::default()
        };
        let engine = engine_with(sink.clone(), config);

        let mut total = 0;
        for i in 0..6 {
            let out = engine
                .handle(
                    &format!("V{i}"),
                    MessageType::VehicleData,
                    vehicle(80.0, 4.0),
                    Geography::Urban,
                )
                .await;
            total += out.len();
        }
        assert_eq!(total, 6);

        sink.gate.add_permits(total);
        let stats = engine.shutdown().await;
        assert!(stats.dropped >= total - 2);
        assert_eq!(stats.written + stats.dropped, total);
        assert_eq!(sink.inner.len(), stats.written);
    }
}
