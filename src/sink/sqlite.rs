use anyhow::{Context, Result};
use rusqlite::params;
use uuid::Uuid;

use crate::detect::{Anomaly, AnomalyType, Severity};
use crate::sink::AnomalySink;
use crate::storage::Pool;
use crate::telemetry::SignalSnapshot;

/// Writes anomalies to the `anomalies` table.
#[derive(Clone)]
pub struct SqliteSink {
    pool: Pool,
}

impl SqliteSink {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn insert(&self, anomaly: &Anomaly) -> Result<()> {
        let conn = self.pool.get()?;
        let signals_json = serde_json::to_string(&anomaly.signals)?;

        conn.execute(
            "INSERT INTO anomalies (id, vehicle_id, anomaly_type, message_type, geography, severity, signals_json, details, detected_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                anomaly.id.to_string(),
                anomaly.vehicle_id,
                anomaly.anomaly_type.as_str(),
                anomaly.message_type.as_str(),
                anomaly.geography.as_str(),
                anomaly.severity.as_str(),
                signals_json,
                anomaly.details,
                anomaly.detected_at.to_rfc3339(),
            ],
        )
        .with_context(|| format!("failed to insert anomaly {}", anomaly.id))?;

        Ok(())
    }

    /// Most recent anomalies first. Rows that no longer parse are skipped.
    pub fn list_recent(&self, limit: usize) -> Result<Vec<Anomaly>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, vehicle_id, anomaly_type, message_type, geography, severity, signals_json, details, detected_at
             FROM anomalies ORDER BY detected_at DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            Ok(RawRow {
                id: row.get(0)?,
                vehicle_id: row.get(1)?,
                anomaly_type: row.get(2)?,
                message_type: row.get(3)?,
                geography: row.get(4)?,
                severity: row.get(5)?,
                signals_json: row.get(6)?,
                details: row.get(7)?,
                detected_at: row.get(8)?,
            })
        })?;

        let mut anomalies = Vec::new();
        for row in rows {
            match row.map_err(anyhow::Error::from).and_then(RawRow::into_anomaly) {
                Ok(a) => anomalies.push(a),
                Err(e) => tracing::warn!(error = %e, "skipping unreadable anomaly row"),
            }
        }
        Ok(anomalies)
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.pool.get()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM anomalies", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

struct RawRow {
    id: String,
    vehicle_id: String,
    anomaly_type: String,
    message_type: String,
    geography: String,
    severity: String,
    signals_json: String,
    details: String,
    detected_at: String,
}

impl RawRow {
    fn into_anomaly(self) -> Result<Anomaly> {
        let anomaly_type: AnomalyType =
            serde_json::from_value(serde_json::Value::String(self.anomaly_type))?;
        let severity: Severity = serde_json::from_value(serde_json::Value::String(self.severity))?;
        let signals: SignalSnapshot = serde_json::from_str(&self.signals_json)?;

        Ok(Anomaly {
            id: Uuid::parse_str(&self.id)?,
            vehicle_id: self.vehicle_id,
            anomaly_type,
            message_type: self.message_type.parse()?,
            geography: self.geography.parse()?,
            severity,
            signals,
            details: self.details,
            detected_at: chrono::DateTime::parse_from_rfc3339(&self.detected_at)?
                .with_timezone(&chrono::Utc),
        })
    }
}

#[async_trait::async_trait]
impl AnomalySink for SqliteSink {
    async fn write(&self, anomaly: &Anomaly) -> Result<()> {
        let sink = self.clone();
        let anomaly = anomaly.clone();
        tokio::task::spawn_blocking(move || sink.insert(&anomaly)).await?
    }
}
