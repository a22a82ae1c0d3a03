mod memory;

pub use memory::MemoryStore;

use crate::error::{Error, Result};
use crate::models::{Party, PredictionRecord};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use log::info;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{migrate::MigrateDatabase, Row, Sqlite};

/// Append-only storage for prediction records.
///
/// Timestamps are written as fixed-width RFC 3339 text so they sort lexically.
#[async_trait]
pub trait PredictionStore: Send + Sync {
    async fn append(&self, record: &PredictionRecord) -> Result<()>;

    /// Every stored record, oldest first.
    async fn all(&self) -> Result<Vec<PredictionRecord>>;

    /// A user's records, newest first, at most `limit`.
    async fn history_for_user(&self, user_id: &str, limit: u32) -> Result<Vec<PredictionRecord>>;

    /// Removes a user's records and returns how many were deleted.
    async fn clear_user(&self, user_id: &str) -> Result<u64>;
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        // Create database if it doesn't exist
        if !db_url.contains(":memory:") && !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            info!("Creating database at {}", db_url);
            Sqlite::create_database(db_url).await?;
        }

        // An in-memory database lives per connection, so keep exactly one
        let max_connections = if db_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(db_url)
            .await?;

        Self::init_schema(&pool).await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS predictions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                party TEXT NOT NULL,
                runner_up TEXT,
                confidence REAL NOT NULL,
                region TEXT,
                timestamp TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_predictions_user
            ON predictions (user_id, timestamp);
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl PredictionStore for Database {
    async fn append(&self, record: &PredictionRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO predictions (id, user_id, party, runner_up, confidence, region, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(record.winner.code())
        .bind(record.runner_up.map(Party::code))
        .bind(record.confidence)
        .bind(&record.region)
        .bind(record.created_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn all(&self) -> Result<Vec<PredictionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, party, runner_up, confidence, region, timestamp
            FROM predictions
            ORDER BY timestamp, rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn history_for_user(&self, user_id: &str, limit: u32) -> Result<Vec<PredictionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, party, runner_up, confidence, region, timestamp
            FROM predictions
            WHERE user_id = ?
            ORDER BY timestamp DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn clear_user(&self, user_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM predictions WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn record_from_row(row: &SqliteRow) -> Result<PredictionRecord> {
    let id = row.get::<String, _>("id");
    let party = row.get::<String, _>("party");
    let runner_up: Option<String> = row.get("runner_up");
    let timestamp = row.get::<String, _>("timestamp");

    let winner = party
        .parse::<Party>()
        .map_err(|e| Error::CorruptRecord(format!("{}: {}", id, e)))?;
    let runner_up = runner_up
        .map(|code| code.parse::<Party>())
        .transpose()
        .map_err(|e| Error::CorruptRecord(format!("{}: {}", id, e)))?;
    let created_at = DateTime::parse_from_rfc3339(&timestamp)
        .map_err(|e| Error::CorruptRecord(format!("{}: failed to parse timestamp: {}", id, e)))?
        .with_timezone(&Utc);

    Ok(PredictionRecord {
        user_id: row.get("user_id"),
        winner,
        runner_up,
        confidence: row.get("confidence"),
        region: row.get("region"),
        created_at,
        id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(user: &str, winner: Party, minutes: i64) -> PredictionRecord {
        PredictionRecord {
            id: format!("{}-{}", user, minutes),
            user_id: user.to_string(),
            winner,
            runner_up: Some(Party::Other),
            confidence: 42.5,
            region: Some("wales".to_string()),
            created_at: DateTime::<Utc>::UNIX_EPOCH + Duration::minutes(minutes),
        }
    }

    async fn database() -> Database {
        Database::new("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn stores_and_reads_back_records() {
        let db = database().await;
        let first = record("alice", Party::Green, 1);
        db.append(&first).await.unwrap();
        db.append(&record("bob", Party::Con, 2)).await.unwrap();

        let all = db.all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], first);
        assert_eq!(all[1].winner, Party::Con);
    }

    #[tokio::test]
    async fn history_is_newest_first_and_limited() {
        let db = database().await;
        for minute in 0..4 {
            db.append(&record("alice", Party::Lab, minute)).await.unwrap();
        }
        db.append(&record("bob", Party::Snp, 10)).await.unwrap();

        let history = db.history_for_user("alice", 3).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].id, "alice-3");
        assert_eq!(history[2].id, "alice-1");
    }

    #[tokio::test]
    async fn clear_user_only_removes_that_user() {
        let db = database().await;
        db.append(&record("alice", Party::Lab, 0)).await.unwrap();
        db.append(&record("alice", Party::Lab, 1)).await.unwrap();
        db.append(&record("bob", Party::Ld, 2)).await.unwrap();

        assert_eq!(db.clear_user("alice").await.unwrap(), 2);
        assert_eq!(db.clear_user("alice").await.unwrap(), 0);
        let remaining = db.all().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].user_id, "bob");
    }

    #[tokio::test]
    async fn unknown_party_code_is_a_corrupt_record() {
        let db = database().await;
        sqlx::query(
            "INSERT INTO predictions (id, user_id, party, confidence, timestamp) VALUES ('x', 'u', 'whig', 1.0, '2024-07-04T22:00:00+00:00')",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let err = db.all().await.unwrap_err();
        assert!(matches!(err, Error::CorruptRecord(_)));
    }
}
