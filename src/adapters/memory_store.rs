use crate::core::{CalculationRecord, RecordStore};
use crate::utils::error::{EngineError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<String, CalculationRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn load(&self, calculation_id: &str) -> Result<CalculationRecord> {
        self.records
            .read()
            .await
            .get(calculation_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(calculation_id.to_string()))
    }

    async fn save(&self, calculation_id: &str, record: &CalculationRecord) -> Result<u64> {
        let mut records = self.records.write().await;
        let stored = records
            .get_mut(calculation_id)
            .ok_or_else(|| EngineError::NotFound(calculation_id.to_string()))?;

        if stored.revision != record.revision {
            return Err(EngineError::Conflict {
                calculation_id: calculation_id.to_string(),
                expected: record.revision,
                actual: stored.revision,
            });
        }

        let mut next = record.clone();
        next.revision = record.revision + 1;
        *stored = next;
        Ok(stored.revision)
    }

    async fn insert(&self, record: &CalculationRecord) -> Result<()> {
        let mut records = self.records.write().await;
        if let Some(existing) = records.get(&record.calculation_id) {
            return Err(EngineError::Conflict {
                calculation_id: record.calculation_id.clone(),
                expected: 0,
                actual: existing.revision,
            });
        }
        records.insert(record.calculation_id.clone(), record.clone());
        Ok(())
    }

    async fn exists(&self, calculation_id: &str) -> Result<bool> {
        Ok(self.records.read().await.contains_key(calculation_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::BuildingProfile;

    #[tokio::test]
    async fn test_save_increments_revision() {
        let store = InMemoryRecordStore::new();
        let record = CalculationRecord::new("calc-1", BuildingProfile::new(12, 10_000.0));
        store.insert(&record).await.unwrap();

        let loaded = store.load("calc-1").await.unwrap();
        assert_eq!(store.save("calc-1", &loaded).await.unwrap(), 1);
        assert_eq!(store.load("calc-1").await.unwrap().revision, 1);
    }

    #[tokio::test]
    async fn test_stale_save_conflicts() {
        let store = InMemoryRecordStore::new();
        let record = CalculationRecord::new("calc-1", BuildingProfile::new(12, 10_000.0));
        store.insert(&record).await.unwrap();

        let first = store.load("calc-1").await.unwrap();
        let stale = first.clone();
        store.save("calc-1", &first).await.unwrap();

        let err = store.save("calc-1", &stale).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Conflict { expected: 0, actual: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_load_missing() {
        let store = InMemoryRecordStore::new();
        assert!(matches!(
            store.load("nope").await,
            Err(EngineError::NotFound(id)) if id == "nope"
        ));
        assert!(!store.exists("nope").await.unwrap());
    }
}
