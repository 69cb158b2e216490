//! canguard -- real-time anomaly detection for vehicle telemetry.
//!
//! Decoded CAN messages flow through per-vehicle state tracking, a
//! three-family rule evaluator, and a self-training isolation forest per
//! message type. Every anomaly is handed to a pluggable sink.

pub mod config;
pub mod detect;
pub mod model;
pub mod rules;
pub mod sink;
pub mod state;
pub mod storage;
pub mod telemetry;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::config::CanguardConfig;
use crate::detect::{DetectionEngine, SinkStats};
use crate::model::{FileModelStore, ModelPhase, OutlierModelManager};
use crate::sink::SqliteSink;
use crate::telemetry::DecodedMessage;

/// Totals for one pass over an input stream.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub messages: usize,
    /// Lines that were not valid JSON messages.
    pub unparsed: usize,
    /// Messages with an unknown type, geography, or signal.
    pub rejected: usize,
    pub anomalies: usize,
    pub sink: SinkStats,
}

/// Feed JSON-lines messages from `input` through a detection engine backed
/// by the configured SQLite database and model directory.
pub async fn run<R>(config: &CanguardConfig, input: R) -> Result<RunSummary>
where
    R: AsyncBufRead + Unpin,
{
    tracing::info!(db_path = %config.storage.db_path.display(), "Initializing database");
    let pool = storage::open_pool(&config.storage.db_path)?;
    let sink = Arc::new(SqliteSink::new(pool));

    let store = Arc::new(FileModelStore::new(&config.detector.model_store_path));
    let models = OutlierModelManager::open(&config.detector, store)
        .context("failed to initialize outlier models")?;
    let engine = DetectionEngine::new(&config.detector, models.clone(), sink);

    let mut summary = RunSummary::default();
    let mut lines = input.lines();
    let mut line_no = 0usize;
    while let Some(line) = lines.next_line().await.context("failed to read input")? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let message: DecodedMessage = match serde_json::from_str(line) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(line = line_no, error = %e, "skipping unparseable input line");
                summary.unparsed += 1;
                continue;
            }
        };

        summary.messages += 1;
        match engine.ingest(message).await {
            Ok(anomalies) => summary.anomalies += anomalies.len(),
            Err(e) => {
                tracing::warn!(line = line_no, error = %e, "rejected message");
                summary.rejected += 1;
            }
        }
        // Give the sink writer a turn between messages.
        tokio::task::yield_now().await;
    }

    // Let an in-flight training pass finish so its artifacts reach disk.
    let mut phase = models.subscribe();
    let _ = phase.wait_for(|p| *p != ModelPhase::Training).await;

    summary.sink = engine.shutdown().await;
    tracing::info!(
        messages = summary.messages,
        unparsed = summary.unparsed,
        rejected = summary.rejected,
        anomalies = summary.anomalies,
        written = summary.sink.written,
        failed = summary.sink.failed,
        dropped = summary.sink.dropped,
        "input exhausted"
    );
    Ok(summary)
}
