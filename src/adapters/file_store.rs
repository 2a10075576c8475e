use crate::core::{CalculationRecord, RecordStore};
use crate::utils::error::{EngineError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// 每筆計算一個 JSON 檔，存放於 base_path 下
#[derive(Debug)]
pub struct JsonFileRecordStore {
    base_path: PathBuf,
    // 讀取比對與寫入必須是同一個臨界區
    write_lock: Mutex<()>,
}

impl JsonFileRecordStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn record_path(&self, calculation_id: &str) -> Result<PathBuf> {
        let valid = !calculation_id.is_empty()
            && calculation_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !calculation_id.starts_with('.');
        if !valid {
            return Err(EngineError::InvalidConfigValueError {
                field: "calculationId".to_string(),
                value: calculation_id.to_string(),
                reason: "Only ASCII letters, digits, '-', '_' and '.' are allowed".to_string(),
            });
        }
        Ok(self.base_path.join(format!("{}.json", calculation_id)))
    }

    async fn read_record(&self, path: &Path, calculation_id: &str) -> Result<CalculationRecord> {
        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(EngineError::NotFound(calculation_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&data)?)
    }

    async fn write_record(&self, path: &Path, record: &CalculationRecord) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let data = serde_json::to_vec_pretty(record)?;
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, data).await?;
        tokio::fs::rename(&tmp_path, path).await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for JsonFileRecordStore {
    async fn load(&self, calculation_id: &str) -> Result<CalculationRecord> {
        let path = self.record_path(calculation_id)?;
        self.read_record(&path, calculation_id).await
    }

    async fn save(&self, calculation_id: &str, record: &CalculationRecord) -> Result<u64> {
        let path = self.record_path(calculation_id)?;
        let _guard = self.write_lock.lock().await;

        let stored = self.read_record(&path, calculation_id).await?;
        if stored.revision != record.revision {
            return Err(EngineError::Conflict {
                calculation_id: calculation_id.to_string(),
                expected: record.revision,
                actual: stored.revision,
            });
        }

        let mut next = record.clone();
        next.revision = record.revision + 1;
        self.write_record(&path, &next).await?;
        tracing::debug!("💾 Saved '{}' to {}", calculation_id, path.display());
        Ok(next.revision)
    }

    async fn insert(&self, record: &CalculationRecord) -> Result<()> {
        let path = self.record_path(&record.calculation_id)?;
        let _guard = self.write_lock.lock().await;

        if tokio::fs::try_exists(&path).await? {
            let existing = self.read_record(&path, &record.calculation_id).await?;
            return Err(EngineError::Conflict {
                calculation_id: record.calculation_id.clone(),
                expected: 0,
                actual: existing.revision,
            });
        }
        self.write_record(&path, record).await
    }

    async fn exists(&self, calculation_id: &str) -> Result<bool> {
        let path = self.record_path(calculation_id)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }
}
