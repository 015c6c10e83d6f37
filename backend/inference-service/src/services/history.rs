//! Persistent log of prediction results, kept in SQLite.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::models::PredictionRecord;

pub const DEFAULT_HISTORY_LIMIT: u32 = 100;
pub const MAX_HISTORY_LIMIT: u32 = 1_000;

/// Append-only prediction log with time-based pruning.
#[derive(Clone)]
pub struct PredictionHistory {
    pool: SqlitePool,
}

impl PredictionHistory {
    /// Open (creating if needed) the database at `database_url`.
    ///
    /// A single connection is used: the prediction loop is the only writer,
    /// and `sqlite::memory:` databases are private to their connection.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// Create the results table and drop rows older than `retention`.
    pub async fn prepare(&self, retention: Duration) -> Result<u64, sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS prediction_results (
                id INTEGER PRIMARY KEY,
                timestamp TEXT NOT NULL,
                prediction REAL NOT NULL,
                elapsed_time_ms REAL NOT NULL,
                model_ids TEXT NOT NULL DEFAULT ''
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_prediction_results_timestamp \
             ON prediction_results (timestamp)",
        )
        .execute(&self.pool)
        .await?;

        let cutoff = Utc::now() - chrono::Duration::seconds(retention.as_secs() as i64);
        let pruned = self.prune_older_than(cutoff).await?;
        info!(pruned, cutoff = %cutoff, "prediction history ready");
        Ok(pruned)
    }

    pub async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM prediction_results WHERE timestamp < ?")
            .bind(format_timestamp(&cutoff))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn insert(&self, record: &PredictionRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO prediction_results (timestamp, prediction, elapsed_time_ms, model_ids)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(format_timestamp(&record.timestamp))
        .bind((f64::from(record.prediction) * 1e5).round() / 1e5)
        .bind(record.elapsed_time_ms)
        .bind(&record.model_ids)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Most recent results first.
    pub async fn recent(&self, limit: u32) -> Result<Vec<PredictionRecord>, sqlx::Error> {
        let rows: Vec<(String, f64, f64, String)> = sqlx::query_as(
            r#"
            SELECT timestamp, prediction, elapsed_time_ms, model_ids
            FROM prediction_results
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for (timestamp, prediction, elapsed_time_ms, model_ids) in rows {
            let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?
                .with_timezone(&Utc);
            records.push(PredictionRecord {
                timestamp,
                prediction: prediction as f32,
                elapsed_time_ms,
                model_ids,
            });
        }
        Ok(records)
    }
}

/// Fixed-width UTC timestamps so that text comparison orders by time.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(timestamp: DateTime<Utc>, prediction: f32) -> PredictionRecord {
        PredictionRecord {
            timestamp,
            prediction,
            elapsed_time_ms: 12.3,
            model_ids: "cnn-a,cnn-b".to_string(),
        }
    }

    async fn memory_history() -> PredictionHistory {
        let history = PredictionHistory::connect("sqlite::memory:").await.unwrap();
        history.prepare(Duration::from_secs(3600)).await.unwrap();
        history
    }

    #[tokio::test]
    async fn recent_returns_newest_first() {
        let history = memory_history().await;
        let now = Utc::now();
        for (i, score) in [0.1f32, 0.2, 0.3].into_iter().enumerate() {
            history
                .insert(&record(now + chrono::Duration::seconds(i as i64), score))
                .await
                .unwrap();
        }

        let rows = history.recent(2).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!((rows[0].prediction - 0.3).abs() < 1e-6);
        assert!((rows[1].prediction - 0.2).abs() < 1e-6);
        assert_eq!(rows[0].elapsed_time_ms, 12.3);
        assert_eq!(rows[0].model_ids, "cnn-a,cnn-b");
        assert_eq!(
            rows[0].timestamp.timestamp_micros(),
            (now + chrono::Duration::seconds(2)).timestamp_micros()
        );
    }

    #[tokio::test]
    async fn prepare_prunes_rows_past_retention() {
        let history = memory_history().await;
        let now = Utc::now();
        history
            .insert(&record(now - chrono::Duration::days(20), 0.9))
            .await
            .unwrap();
        history
            .insert(&record(now - chrono::Duration::days(1), 0.4))
            .await
            .unwrap();

        let pruned = history
            .prepare(Duration::from_secs(15 * 24 * 60 * 60))
            .await
            .unwrap();
        assert_eq!(pruned, 1);

        let rows = history.recent(10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!((rows[0].prediction - 0.4).abs() < 1e-6);
    }

    #[tokio::test]
    async fn predictions_are_rounded_to_five_places() {
        let history = memory_history().await;
        history
            .insert(&record(Utc::now(), 0.123_456_78))
            .await
            .unwrap();
        let rows = history.recent(1).await.unwrap();
        assert!((rows[0].prediction - 0.12346).abs() < 1e-6);
    }

    #[test]
    fn timestamps_are_fixed_width() {
        let a = DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        let b = a + chrono::Duration::microseconds(1);
        assert_eq!(format_timestamp(&a), "2026-01-02T03:04:05.000000Z");
        assert!(format_timestamp(&a) < format_timestamp(&b));
    }
}
