use crate::db::PredictionStore;
use crate::error::Result;
use crate::models::PredictionRecord;
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Process-local store. Records are lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Vec<PredictionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PredictionStore for MemoryStore {
    async fn append(&self, record: &PredictionRecord) -> Result<()> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn all(&self) -> Result<Vec<PredictionRecord>> {
        let mut records = self.records.read().await.clone();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }

    async fn history_for_user(&self, user_id: &str, limit: u32) -> Result<Vec<PredictionRecord>> {
        let records = self.records.read().await;
        // Later inserts win timestamp ties, matching rowid order in SQLite
        let mut history: Vec<(usize, &PredictionRecord)> = records
            .iter()
            .enumerate()
            .filter(|(_, record)| record.user_id == user_id)
            .collect();
        history.sort_by(|a, b| b.1.created_at.cmp(&a.1.created_at).then(b.0.cmp(&a.0)));
        Ok(history
            .into_iter()
            .take(limit as usize)
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn clear_user(&self, user_id: &str) -> Result<u64> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|record| record.user_id != user_id);
        Ok((before - records.len()) as u64)
    }
}
