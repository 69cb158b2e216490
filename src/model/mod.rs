//! Unsupervised outlier detection: one isolation forest per message type.

pub mod features;
pub mod forest;
pub mod manager;
pub mod store;

pub use forest::{ForestParams, IsolationForest};
pub use manager::{ModelPhase, ModelState, Observation, OutlierModelManager, TrainingProgress, Verdict};
pub use store::{FileModelStore, MemoryModelStore, ModelInfo, ModelStore};
