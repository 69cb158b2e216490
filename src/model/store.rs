//! Durable storage for trained model artifacts.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use crate::model::forest::IsolationForest;
use crate::telemetry::MessageType;

/// Key-value persistence for serialized models, one blob per message type.
pub trait ModelStore: Send + Sync {
    fn save(&self, message_type: MessageType, blob: &[u8]) -> Result<()>;
    /// `Ok(None)` when nothing has been saved for this type.
    fn load(&self, message_type: MessageType) -> Result<Option<Vec<u8>>>;
}

/// File name of the artifact for `message_type`.
pub fn artifact_name(message_type: MessageType) -> &'static str {
    match message_type {
        MessageType::EngineData => "engine_model.json",
        MessageType::VehicleData => "vehicle_model.json",
        MessageType::ClimateControl => "climate_model.json",
    }
}

/// Stores each model as a JSON file inside a directory.
pub struct FileModelStore {
    dir: PathBuf,
}

/// Summary of a persisted model, for operators.
#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub message_type: MessageType,
    pub path: PathBuf,
    pub size_kb: f64,
    pub n_trees: usize,
    pub contamination: f64,
    pub random_seed: u64,
    pub training_samples: usize,
}

impl FileModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, message_type: MessageType) -> PathBuf {
        self.dir.join(artifact_name(message_type))
    }

    /// Describe every loadable artifact. Missing, unparsable, or structurally
    /// broken files are skipped.
    pub fn describe(&self) -> Vec<ModelInfo> {
        MessageType::ALL
            .iter()
            .filter_map(|&message_type| {
                let path = self.path_for(message_type);
                let blob = std::fs::read(&path).ok()?;
                let model: IsolationForest = serde_json::from_slice(&blob).ok()?;
                model.validate().ok()?;
                Some(ModelInfo {
                    message_type,
                    path,
                    size_kb: blob.len() as f64 / 1024.0,
                    n_trees: model.n_trees(),
                    contamination: model.params().contamination,
                    random_seed: model.params().random_seed,
                    training_samples: model.n_training_samples(),
                })
            })
            .collect()
    }
}

impl ModelStore for FileModelStore {
    fn save(&self, message_type: MessageType, blob: &[u8]) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create model directory: {}", self.dir.display()))?;

        // Write beside the target and rename, so a crash never leaves half a model.
        let path = self.path_for(message_type);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, blob)
            .with_context(|| format!("failed to write model: {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("failed to move model into place: {}", path.display()))?;

        debug!(path = %path.display(), bytes = blob.len(), "model saved");
        Ok(())
    }

    fn load(&self, message_type: MessageType) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(message_type);
        match std::fs::read(&path) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("failed to read model: {}", path.display())),
        }
    }
}

/// In-process store, for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryModelStore {
    blobs: Mutex<HashMap<MessageType, Vec<u8>>>,
}

impl MemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, message_type: MessageType) -> bool {
        self.blobs
            .lock()
            .map(|b| b.contains_key(&message_type))
            .unwrap_or(false)
    }
}

impl ModelStore for MemoryModelStore {
    fn save(&self, message_type: MessageType, blob: &[u8]) -> Result<()> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| anyhow::anyhow!("model store lock poisoned"))?;
        blobs.insert(message_type, blob.to_vec());
        Ok(())
    }

    fn load(&self, message_type: MessageType) -> Result<Option<Vec<u8>>> {
        let blobs = self
            .blobs
            .lock()
            .map_err(|_| anyhow::anyhow!("model store lock poisoned"))?;
        Ok(blobs.get(&message_type).cloned())
    }
}
