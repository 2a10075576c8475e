use crate::domain::model::{CalculationRecord, OverrideSet};
use crate::domain::service_io::{ServiceInput, ServiceOutput};
use crate::domain::service_name::ServiceName;
use crate::domain::validation::{OverrideField, ValidationReport};
use crate::utils::error::Result;
use async_trait::async_trait;

/// 計算紀錄的儲存介面。
///
/// `save` 以 `record.revision` 做樂觀鎖比對：儲存中的 revision 必須相同，
/// 成功後儲存 `revision + 1` 並回傳新值，否則回傳 `EngineError::Conflict`。
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn load(&self, calculation_id: &str) -> Result<CalculationRecord>;
    async fn save(&self, calculation_id: &str, record: &CalculationRecord) -> Result<u64>;
    async fn insert(&self, record: &CalculationRecord) -> Result<()>;
    async fn exists(&self, calculation_id: &str) -> Result<bool>;
}

/// 每個計算服務共同實作的介面
#[async_trait]
pub trait CalculationService: Send + Sync {
    fn name(&self) -> ServiceName;

    /// 可接受的覆寫欄位；未列出的欄位一律拒絕
    fn override_fields(&self) -> &'static [OverrideField];

    /// 從紀錄投影出輸入並合併覆寫值。
    /// 上游服務從未執行時回傳 `MissingRequiredUpstreamData`。
    fn build_input_from_record(
        &self,
        record: &CalculationRecord,
        overrides: Option<&OverrideSet>,
    ) -> Result<ServiceInput>;

    fn validate_input(&self, input: &ServiceInput) -> ValidationReport;

    async fn execute(&self, input: ServiceInput) -> Result<ServiceOutput>;
}
