//! Destinations for emitted anomaly records.

pub mod sqlite;

pub use sqlite::SqliteSink;

use std::sync::Mutex;

use anyhow::Result;

use crate::detect::Anomaly;

/// Best-effort writer of anomaly records.
///
/// Failures are reported to the caller, which logs and drops the record.
/// Nothing is retried.
#[async_trait::async_trait]
pub trait AnomalySink: Send + Sync {
    async fn write(&self, anomaly: &Anomaly) -> Result<()>;
}

/// Collects records in memory, in arrival order.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<Anomaly>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Anomaly> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl AnomalySink for MemorySink {
    async fn write(&self, anomaly: &Anomaly) -> Result<()> {
        self.records
            .lock()
            .map_err(|_| anyhow::anyhow!("memory sink lock poisoned"))?
            .push(anomaly.clone());
        Ok(())
    }
}
