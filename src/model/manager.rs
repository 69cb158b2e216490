//! Outlier model lifecycle: collect samples, train once, freeze, infer.
//!
//! One isolation forest per message type. Sample buffers and the single
//! training slot live under one mutex; the fitted set is published with a
//! single write to `frozen`, so readers see either no models or all of them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Instant;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::DetectorConfig;
use crate::detect::DetectError;
use crate::model::features::{self, FeatureVector, FEATURE_DIM};
use crate::model::forest::{ForestParams, IsolationForest};
use crate::model::store::ModelStore;
use crate::rules::explain::explain;
use crate::telemetry::{MessageType, SignalSnapshot};

/// Lifecycle of a single message type's model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelState {
    Uninitialized,
    Collecting,
    Trained,
}

/// Manager-wide phase, published on a watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelPhase {
    Collecting,
    Training,
    Trained,
}

/// Outcome of feeding one snapshot to the manager.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// Appended to the type's buffer.
    Collected { samples: usize, needed: usize },
    /// The type already has a model loaded from disk.
    Skipped,
    /// A training pass is running; the sample is not kept.
    Training,
    /// This sample completed the buffers and started the training pass.
    TrainingStarted,
    /// Models are frozen; nothing more is collected.
    Frozen,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Normal,
    Anomaly {
        score: f64,
        decision: f64,
        explanation: String,
    },
}

impl Verdict {
    pub fn is_anomaly(&self) -> bool {
        matches!(self, Verdict::Anomaly { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingProgress {
    pub message_type: MessageType,
    pub state: ModelState,
    pub samples: usize,
    pub needed: usize,
}

impl TrainingProgress {
    pub fn percent(&self) -> f64 {
        match self.state {
            ModelState::Trained => 100.0,
            _ if self.needed == 0 => 100.0,
            _ => (self.samples as f64 / self.needed as f64 * 100.0).min(100.0),
        }
    }
}

/// The immutable model set served after training.
#[derive(Debug)]
pub struct FrozenModels {
    models: HashMap<MessageType, IsolationForest>,
}

impl FrozenModels {
    pub fn get(&self, message_type: MessageType) -> Option<&IsolationForest> {
        self.models.get(&message_type)
    }
}

#[derive(Default)]
struct Collection {
    states: HashMap<MessageType, ModelState>,
    buffers: HashMap<MessageType, Vec<FeatureVector>>,
    loaded: HashMap<MessageType, IsolationForest>,
    training: bool,
}

impl Collection {
    fn state(&self, message_type: MessageType) -> ModelState {
        self.states
            .get(&message_type)
            .copied()
            .unwrap_or(ModelState::Uninitialized)
    }

    fn samples(&self, message_type: MessageType) -> usize {
        self.buffers.get(&message_type).map_or(0, Vec::len)
    }

    fn collecting(&self) -> impl Iterator<Item = MessageType> + '_ {
        MessageType::ALL
            .into_iter()
            .filter(move |mt| self.state(*mt) == ModelState::Collecting)
    }

    fn ready(&self, needed: usize) -> bool {
        let mut any = false;
        for mt in self.collecting() {
            any = true;
            if self.samples(mt) < needed {
                return false;
            }
        }
        any
    }

    fn take_job(&mut self) -> TrainingJob {
        let buffers = self
            .collecting()
            .collect::<Vec<_>>()
            .into_iter()
            .map(|mt| (mt, self.buffers.remove(&mt).unwrap_or_default()))
            .collect();
        TrainingJob {
            buffers,
            loaded: self.loaded.clone(),
        }
    }
}

struct TrainingJob {
    buffers: Vec<(MessageType, Vec<FeatureVector>)>,
    loaded: HashMap<MessageType, IsolationForest>,
}

struct Shared {
    min_samples: usize,
    params: ForestParams,
    store: Arc<dyn ModelStore>,
    collection: Mutex<Collection>,
    frozen: RwLock<Option<Arc<FrozenModels>>>,
    phase: watch::Sender<ModelPhase>,
    passes: AtomicUsize,
}

/// Cloneable handle; clones share the same models.
#[derive(Clone)]
pub struct OutlierModelManager {
    shared: Arc<Shared>,
}

impl OutlierModelManager {
    /// Build a manager and load any persisted models from `store`.
    pub fn open(config: &DetectorConfig, store: Arc<dyn ModelStore>) -> Result<Self, DetectError> {
        let params = config.forest_params();
        params.validate()?;
        if config.min_samples_per_type < 2 {
            return Err(DetectError::InvalidModelParameter(format!(
                "min_samples_per_type must be at least 2, got {}",
                config.min_samples_per_type
            )));
        }

        let (phase, _) = watch::channel(ModelPhase::Collecting);
        let collection = Collection {
            states: MessageType::ALL
                .into_iter()
                .map(|mt| (mt, ModelState::Uninitialized))
                .collect(),
            ..Collection::default()
        };

        let manager = Self {
            shared: Arc::new(Shared {
                min_samples: config.min_samples_per_type,
                params,
                store,
                collection: Mutex::new(collection),
                frozen: RwLock::new(None),
                phase,
                passes: AtomicUsize::new(0),
            }),
        };
        manager.load_persisted();
        Ok(manager)
    }

    fn load_persisted(&self) {
        let shared = &self.shared;
        let mut c = shared.lock_collection();

        for mt in MessageType::ALL {
            match shared.load_model(mt) {
                Some(model) => {
                    info!(
                        message_type = %mt,
                        trees = model.n_trees(),
                        training_samples = model.n_training_samples(),
                        "loaded persisted outlier model"
                    );
                    c.loaded.insert(mt, model);
                    c.states.insert(mt, ModelState::Trained);
                }
                None => {
                    c.buffers.insert(mt, Vec::with_capacity(shared.min_samples));
                    c.states.insert(mt, ModelState::Collecting);
                }
            }
        }

        if c.loaded.len() == MessageType::ALL.len() {
            let frozen = FrozenModels {
                models: c.loaded.clone(),
            };
            drop(c);
            shared.install(frozen);
            info!("all outlier models loaded, detection active");
        } else {
            info!(
                needed = shared.min_samples,
                "collecting samples before training outlier models"
            );
        }
    }

    pub fn observe(&self, message_type: MessageType, snapshot: &SignalSnapshot) -> Observation {
        if self.is_trained() {
            return Observation::Frozen;
        }

        let shared = &self.shared;
        let mut c = shared.lock_collection();
        if c.training {
            return Observation::Training;
        }
        if c.state(message_type) != ModelState::Collecting {
            return Observation::Skipped;
        }

        let vector = features::project(message_type, snapshot);
        let samples = {
            let buf = c.buffers.entry(message_type).or_default();
            buf.push(vector);
            buf.len()
        };
        debug!(
            message_type = %message_type,
            samples,
            needed = shared.min_samples,
            "collected training sample"
        );

        if !c.ready(shared.min_samples) {
            return Observation::Collected {
                samples,
                needed: shared.min_samples,
            };
        }

        c.training = true;
        let job = c.take_job();
        drop(c);

        shared.phase.send_replace(ModelPhase::Training);
        self.spawn_training(job);
        Observation::TrainingStarted
    }

    fn spawn_training(&self, job: TrainingJob) {
        let shared = Arc::clone(&self.shared);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || shared.train(job));
            }
            Err(_) => shared.train(job),
        }
    }

    pub fn predict(
        &self,
        message_type: MessageType,
        snapshot: &SignalSnapshot,
    ) -> Result<Verdict, DetectError> {
        let frozen = self
            .frozen()
            .ok_or(DetectError::ModelNotTrained(message_type))?;
        let model = frozen
            .get(message_type)
            .ok_or(DetectError::ModelNotTrained(message_type))?;

        let x = features::project(message_type, snapshot);
        let decision = model.decision_function(&x);
        if decision < 0.0 {
            Ok(Verdict::Anomaly {
                score: model.score_sample(&x),
                decision,
                explanation: explain(message_type, snapshot),
            })
        } else {
            Ok(Verdict::Normal)
        }
    }

    pub fn is_trained(&self) -> bool {
        self.frozen().is_some()
    }

    pub fn phase(&self) -> ModelPhase {
        *self.shared.phase.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ModelPhase> {
        self.shared.phase.subscribe()
    }

    /// Resolves once every model is trained (immediately if already so).
    pub async fn wait_until_trained(&self) {
        let mut rx = self.subscribe();
        // The sender lives as long as `self`, so this cannot observe a close.
        let _ = rx.wait_for(|phase| *phase == ModelPhase::Trained).await;
    }

    pub fn progress(&self) -> Vec<TrainingProgress> {
        let c = self.shared.lock_collection();
        MessageType::ALL
            .into_iter()
            .map(|mt| TrainingProgress {
                message_type: mt,
                state: c.state(mt),
                samples: c.samples(mt),
                needed: self.shared.min_samples,
            })
            .collect()
    }

    /// Number of training passes started so far.
    pub fn training_passes(&self) -> usize {
        self.shared.passes.load(Ordering::SeqCst)
    }

    fn frozen(&self) -> Option<Arc<FrozenModels>> {
        self.shared
            .frozen
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Shared {
    fn lock_collection(&self) -> MutexGuard<'_, Collection> {
        self.collection.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load_model(&self, message_type: MessageType) -> Option<IsolationForest> {
        let blob = match self.store.load(message_type) {
            Ok(Some(blob)) => blob,
            Ok(None) => return None,
            Err(e) => {
                warn!(message_type = %message_type, error = %e, "failed to read persisted model, retraining");
                return None;
            }
        };
        let parsed = serde_json::from_slice::<IsolationForest>(&blob)
            .map_err(|e| e.to_string())
            .and_then(|model| model.validate().map(|()| model).map_err(|e| e.to_string()));
        match parsed {
            Ok(model) if model.n_features() == FEATURE_DIM => Some(model),
            Ok(model) => {
                warn!(
                    message_type = %message_type,
                    features = model.n_features(),
                    expected = FEATURE_DIM,
                    "persisted model has wrong dimension, retraining"
                );
                None
            }
            Err(e) => {
                warn!(message_type = %message_type, error = %e, "persisted model is corrupt, retraining");
                None
            }
        }
    }

    fn train(&self, job: TrainingJob) {
        let pass = self.passes.fetch_add(1, Ordering::SeqCst) + 1;
        let started = Instant::now();
        info!(
            pass,
            types = job.buffers.len(),
            "training outlier models"
        );

        let mut models = job.loaded;
        let mut failed = Vec::new();
        for (mt, samples) in job.buffers {
            match IsolationForest::fit(&self.params, &samples) {
                Ok(model) => {
                    self.persist(mt, &model);
                    models.insert(mt, model);
                }
                Err(e) => {
                    error!(message_type = %mt, error = %e, "outlier model training failed");
                    failed.push((mt, samples));
                }
            }
        }

        if !failed.is_empty() {
            // Keep the samples so the next observation retries the pass.
            let mut c = self.lock_collection();
            for (mt, samples) in failed {
                c.buffers.insert(mt, samples);
            }
            for (mt, model) in models {
                if c.state(mt) == ModelState::Collecting {
                    c.buffers.remove(&mt);
                    c.states.insert(mt, ModelState::Trained);
                }
                c.loaded.insert(mt, model);
            }
            c.training = false;
            drop(c);
            self.phase.send_replace(ModelPhase::Collecting);
            return;
        }

        {
            let mut c = self.lock_collection();
            for mt in MessageType::ALL {
                c.states.insert(mt, ModelState::Trained);
            }
            c.buffers.clear();
            c.loaded = models.clone();
            c.training = false;
        }
        self.install(FrozenModels { models });
        info!(
            pass,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "outlier models trained and frozen"
        );
    }

    fn persist(&self, message_type: MessageType, model: &IsolationForest) {
        let blob = match serde_json::to_vec(model) {
            Ok(blob) => blob,
            Err(e) => {
                error!(message_type = %message_type, error = %e, "failed to serialize outlier model");
                return;
            }
        };
        if let Err(e) = self.store.save(message_type, &blob) {
            error!(
                message_type = %message_type,
                error = %e,
                "failed to persist outlier model, serving from memory"
            );
        }
    }

    fn install(&self, models: FrozenModels) {
        *self.frozen.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(models));
        self.phase.send_replace(ModelPhase::Trained);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::store::{FileModelStore, MemoryModelStore};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::time::Duration;

    fn small_config(min_samples: usize) -> DetectorConfig {
        DetectorConfig {
            min_samples_per_type: min_samples,
            n_estimators: 25,
            ..DetectorConfig::default()
        }
    }

    fn normal_sample(rng: &mut StdRng, mt: MessageType) -> SignalSnapshot {
        match mt {
            MessageType::EngineData => SignalSnapshot::new()
                .with("EngineSpeed", 2000.0 + rng.gen_range(-200.0..200.0))
                .with("EngineTemp", 90.0 + rng.gen_range(-3.0..3.0))
                .with("BatteryLevel", 80.0 + rng.gen_range(-5.0..5.0)),
            MessageType::VehicleData => SignalSnapshot::new()
                .with("Speed", 50.0 + rng.gen_range(-5.0..5.0))
                .with("GearPosition", 3.0)
                .with("BatteryVoltage", 390.0 + rng.gen_range(-5.0..5.0)),
            MessageType::ClimateControl => SignalSnapshot::new()
                .with("CabinTemp", 22.0 + rng.gen_range(-1.0..1.0))
                .with("FanSpeed", rng.gen_range(1..4) as f64)
                .with("ACStatus", 1.0),
        }
    }

    fn feed(manager: &OutlierModelManager, mt: MessageType, n: usize, seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..n {
            manager.observe(mt, &normal_sample(&mut rng, mt));
        }
    }

    fn engine_outlier() -> SignalSnapshot {
        SignalSnapshot::new()
            .with("EngineSpeed", 7000.0)
            .with("EngineTemp", 130.0)
            .with("BatteryLevel", 5.0)
    }

    #[test]
    fn test_predict_rejected_before_training() {
        let store = Arc::new(MemoryModelStore::new());
        let manager = OutlierModelManager::open(&small_config(50), store).unwrap();

        assert_eq!(manager.phase(), ModelPhase::Collecting);
        let err = manager
            .predict(MessageType::EngineData, &engine_outlier())
            .unwrap_err();
        assert!(matches!(err, DetectError::ModelNotTrained(MessageType::EngineData)));
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let store = Arc::new(MemoryModelStore::new());
        let mut cfg = small_config(1);
        assert!(OutlierModelManager::open(&cfg, store.clone()).is_err());

        cfg.min_samples_per_type = 10;
        cfg.contamination = 0.9;
        assert!(OutlierModelManager::open(&cfg, store).is_err());
    }

    #[test]
    fn test_collecting_reports_progress() {
        let store = Arc::new(MemoryModelStore::new());
        let manager = OutlierModelManager::open(&small_config(40), store).unwrap();

        feed(&manager, MessageType::EngineData, 10, 1);
        let mut rng = StdRng::seed_from_u64(2);
        let obs = manager.observe(
            MessageType::EngineData,
            &normal_sample(&mut rng, MessageType::EngineData),
        );
        assert_eq!(obs, Observation::Collected { samples: 11, needed: 40 });

        let progress = manager.progress();
        let engine = progress
            .iter()
            .find(|p| p.message_type == MessageType::EngineData)
            .unwrap();
        assert_eq!(engine.state, ModelState::Collecting);
        assert_eq!(engine.samples, 11);
        assert!((engine.percent() - 27.5).abs() < 1e-9);
    }

    #[test]
    fn test_training_inline_without_runtime() {
        let store = Arc::new(MemoryModelStore::new());
        let manager = OutlierModelManager::open(&small_config(60), store.clone()).unwrap();

        // One type full is not enough.
        feed(&manager, MessageType::EngineData, 80, 1);
        assert_eq!(manager.phase(), ModelPhase::Collecting);

        feed(&manager, MessageType::VehicleData, 60, 2);
        feed(&manager, MessageType::ClimateControl, 60, 3);

        assert_eq!(manager.phase(), ModelPhase::Trained);
        assert_eq!(manager.training_passes(), 1);
        for mt in MessageType::ALL {
            assert!(store.contains(mt));
        }

        let verdict = manager
            .predict(MessageType::EngineData, &engine_outlier())
            .unwrap();
        match verdict {
            Verdict::Anomaly {
                decision,
                explanation,
                ..
            } => {
                assert!(decision < 0.0);
                assert!(explanation.contains("critical engine temperature"));
            }
            Verdict::Normal => panic!("far outlier classified as normal"),
        }

        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(
            manager.observe(
                MessageType::ClimateControl,
                &normal_sample(&mut rng, MessageType::ClimateControl)
            ),
            Observation::Frozen
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_observers_train_exactly_once() {
        let store = Arc::new(MemoryModelStore::new());
        let manager = OutlierModelManager::open(&small_config(100), store.clone()).unwrap();

        let mut handles = Vec::new();
        for (i, mt) in MessageType::ALL.into_iter().enumerate() {
            for worker in 0..3u64 {
                let m = manager.clone();
                handles.push(tokio::spawn(async move {
                    let mut rng = StdRng::seed_from_u64(i as u64 * 10 + worker);
                    for _ in 0..60 {
                        m.observe(mt, &normal_sample(&mut rng, mt));
                        tokio::task::yield_now().await;
                    }
                }));
            }
        }
        for h in handles {
            h.await.unwrap();
        }

        tokio::time::timeout(Duration::from_secs(30), manager.wait_until_trained())
            .await
            .expect("models never trained");

        assert_eq!(manager.training_passes(), 1);
        assert!(manager.is_trained());
        for mt in MessageType::ALL {
            assert!(store.contains(mt));
        }
        assert!(manager
            .progress()
            .iter()
            .all(|p| p.state == ModelState::Trained));
    }

    #[test]
    fn test_reloaded_models_make_same_decisions() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Arc::new(FileModelStore::new(dir.path()));
        let cfg = small_config(80);

        let first = OutlierModelManager::open(&cfg, store.clone()).unwrap();
        for (i, mt) in MessageType::ALL.into_iter().enumerate() {
            feed(&first, mt, 80, i as u64);
        }
        assert!(first.is_trained());

        let second = OutlierModelManager::open(&cfg, store).unwrap();
        assert!(second.is_trained());
        assert_eq!(second.phase(), ModelPhase::Trained);
        assert_eq!(second.training_passes(), 0);

        let mut rng = StdRng::seed_from_u64(99);
        for mt in MessageType::ALL {
            for _ in 0..20 {
                let sample = normal_sample(&mut rng, mt);
                assert_eq!(
                    first.predict(mt, &sample).unwrap(),
                    second.predict(mt, &sample).unwrap()
                );
            }
        }
        assert_eq!(
            first.predict(MessageType::EngineData, &engine_outlier()).unwrap(),
            second.predict(MessageType::EngineData, &engine_outlier()).unwrap()
        );
    }

    struct ReadOnlyStore;

    impl ModelStore for ReadOnlyStore {
        fn save(&self, message_type: MessageType, _blob: &[u8]) -> anyhow::Result<()> {
            anyhow::bail!("read-only file system: {}", message_type)
        }

        fn load(&self, _message_type: MessageType) -> anyhow::Result<Option<Vec<u8>>> {
            Ok(None)
        }
    }

    #[test]
    fn test_failed_save_still_serves_from_memory() {
        let manager = OutlierModelManager::open(&small_config(50), Arc::new(ReadOnlyStore)).unwrap();
        for (i, mt) in MessageType::ALL.into_iter().enumerate() {
            feed(&manager, mt, 50, i as u64);
        }

        assert!(manager.is_trained());
        assert_eq!(manager.training_passes(), 1);
        assert!(manager
            .progress()
            .iter()
            .all(|p| p.state == ModelState::Trained));
        for mt in MessageType::ALL {
            let mut rng = StdRng::seed_from_u64(99);
            assert!(manager.predict(mt, &normal_sample(&mut rng, mt)).is_ok());
        }
        assert!(matches!(
            manager.predict(MessageType::EngineData, &engine_outlier()),
            Ok(Verdict::Anomaly { .. })
        ));
    }

    #[test]
    fn test_structurally_broken_artifact_is_not_loaded() {
        let store = Arc::new(MemoryModelStore::new());
        let cfg = small_config(50);

        let first = OutlierModelManager::open(&cfg, store.clone()).unwrap();
        for (i, mt) in MessageType::ALL.into_iter().enumerate() {
            feed(&first, mt, 50, i as u64);
        }
        assert!(first.is_trained());

        // Parses as a forest, but the root splits on a missing feature and
        // points past the end of its tree.
        for mt in MessageType::ALL {
            let mut model: serde_json::Value =
                serde_json::from_slice(&store.load(mt).unwrap().unwrap()).unwrap();
            model["trees"][0]["nodes"][0] = serde_json::json!({
                "kind": "split", "feature": 7, "threshold": 0.0, "left": 5, "right": 9
            });
            store.save(mt, &serde_json::to_vec(&model).unwrap()).unwrap();
        }

        let second = OutlierModelManager::open(&cfg, store.clone()).unwrap();
        assert!(!second.is_trained());
        assert!(second
            .progress()
            .iter()
            .all(|p| p.state == ModelState::Collecting));
        assert!(matches!(
            second.predict(MessageType::EngineData, &engine_outlier()),
            Err(DetectError::ModelNotTrained(MessageType::EngineData))
        ));

        for (i, mt) in MessageType::ALL.into_iter().enumerate() {
            feed(&second, mt, 50, 10 + i as u64);
        }
        assert!(second.is_trained());
        assert!(second.predict(MessageType::EngineData, &engine_outlier()).is_ok());
    }

    #[test]
    fn test_corrupt_artifact_falls_back_to_collecting() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Arc::new(FileModelStore::new(dir.path()));
        let cfg = small_config(50);

        let first = OutlierModelManager::open(&cfg, store.clone()).unwrap();
        for (i, mt) in MessageType::ALL.into_iter().enumerate() {
            feed(&first, mt, 50, i as u64);
        }
        assert!(first.is_trained());

        std::fs::write(store.path_for(MessageType::EngineData), b"{not json").unwrap();

        let second = OutlierModelManager::open(&cfg, store.clone()).unwrap();
        assert!(!second.is_trained());
        let states: HashMap<_, _> = second
            .progress()
            .into_iter()
            .map(|p| (p.message_type, p.state))
            .collect();
        assert_eq!(states[&MessageType::EngineData], ModelState::Collecting);
        assert_eq!(states[&MessageType::VehicleData], ModelState::Trained);
        assert_eq!(states[&MessageType::ClimateControl], ModelState::Trained);

        // Loaded types do not collect; only the engine buffer gates training.
        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(
            second.observe(
                MessageType::VehicleData,
                &normal_sample(&mut rng, MessageType::VehicleData)
            ),
            Observation::Skipped
        );
        feed(&second, MessageType::EngineData, 50, 7);
        assert!(second.is_trained());
        assert_eq!(second.training_passes(), 1);

        let reread: IsolationForest =
            serde_json::from_slice(&std::fs::read(store.path_for(MessageType::EngineData)).unwrap())
                .unwrap();
        assert_eq!(reread.n_features(), FEATURE_DIM);
    }
}
