use crate::core::cascade::{CascadeReport, CascadingExecutor, ExecutorOptions};
use crate::core::planner::{ExecutionPlan, ExecutionPlanner};
use crate::core::registry::ServiceRegistry;
use crate::domain::model::{BuildingProfile, CalculationRecord, OverrideSet, VersionStamp};
use crate::domain::ports::RecordStore;
use crate::domain::service_name::ServiceName;
use crate::utils::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;

/// 狀態查詢結果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationStatus {
    pub calculation_id: String,
    pub service_versions: BTreeMap<ServiceName, Option<VersionStamp>>,
    pub executed: BTreeMap<ServiceName, bool>,
    pub last_calculated_service: Option<ServiceName>,
    pub all_services_executed: bool,
    pub updated_at: DateTime<Utc>,
}

impl CalculationStatus {
    pub fn from_record(record: &CalculationRecord) -> Self {
        let service_versions: BTreeMap<_, _> = ServiceName::ALL
            .iter()
            .map(|service| (*service, record.version_of(*service).cloned()))
            .collect();
        let executed: BTreeMap<_, _> = ServiceName::ALL
            .iter()
            .map(|service| (*service, record.has_executed(*service)))
            .collect();
        let all_services_executed = executed.values().all(|done| *done);

        Self {
            calculation_id: record.calculation_id.clone(),
            service_versions,
            executed,
            last_calculated_service: record.last_calculated_service,
            all_services_executed,
            updated_at: record.updated_at,
        }
    }
}

/// 對外的觸發介面：全部執行、從指定服務執行、狀態查詢。
///
/// 同一 `calculationId` 的請求在本實例內依序執行；跨實例的寫入衝突由
/// RecordStore 的 revision 比對攔截。
pub struct CascadeEngine<S: RecordStore> {
    planner: ExecutionPlanner,
    executor: CascadingExecutor<S>,
    locks: LockMap,
}

impl<S: RecordStore> CascadeEngine<S> {
    pub fn new(store: Arc<S>, registry: ServiceRegistry, options: ExecutorOptions) -> Self {
        Self {
            planner: ExecutionPlanner::default(),
            executor: CascadingExecutor::new(store, registry, options),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_planner(mut self, planner: ExecutionPlanner) -> Self {
        self.planner = planner;
        self
    }

    pub fn planner(&self) -> &ExecutionPlanner {
        &self.planner
    }

    pub fn store(&self) -> &Arc<S> {
        self.executor.store()
    }

    pub async fn create_calculation(
        &self,
        calculation_id: &str,
        building: BuildingProfile,
    ) -> Result<CalculationRecord> {
        crate::utils::validation::validate_non_empty_string("calculationId", calculation_id)?;
        let record = CalculationRecord::new(calculation_id, building);
        self.store().insert(&record).await?;
        tracing::info!("🆕 Created calculation '{}'", calculation_id);
        Ok(record)
    }

    pub async fn execute_all(&self, calculation_id: &str) -> Result<CascadeReport> {
        let plan = self.planner.plan_all()?;
        self.execute_plan(calculation_id, plan, OverrideSet::new(), None)
            .await
    }

    /// 從 `service` 開始執行；`cascade` 為 true 時一併執行所有下游服務
    pub async fn execute_service(
        &self,
        calculation_id: &str,
        service: &str,
        overrides: OverrideSet,
        cascade: bool,
        actor: Option<&str>,
    ) -> Result<CascadeReport> {
        let plan = self.planner.plan_from_name(service, cascade)?;
        self.execute_plan(calculation_id, plan, overrides, actor)
            .await
    }

    pub async fn status(&self, calculation_id: &str) -> Result<CalculationStatus> {
        let record = self.store().load(calculation_id).await?;
        Ok(CalculationStatus::from_record(&record))
    }

    async fn execute_plan(
        &self,
        calculation_id: &str,
        plan: ExecutionPlan,
        overrides: OverrideSet,
        actor: Option<&str>,
    ) -> Result<CascadeReport> {
        if !self.store().exists(calculation_id).await? {
            return Err(EngineError::NotFound(calculation_id.to_string()));
        }

        let lease = self.lease(calculation_id);
        let _guard = lease.lock.lock().await;

        Ok(self
            .executor
            .run(calculation_id, &plan, &overrides, actor)
            .await)
    }

    fn lease(&self, calculation_id: &str) -> LockLease<'_> {
        let mut locks = lock_map(&self.locks);
        let lock = locks
            .entry(calculation_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        LockLease {
            locks: &self.locks,
            calculation_id: calculation_id.to_string(),
            lock,
        }
    }
}

type LockMap = Mutex<HashMap<String, Arc<AsyncMutex<()>>>>;

fn lock_map(locks: &LockMap) -> std::sync::MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
    locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 持有某個 id 的鎖；最後一個持有者釋放時一併移除表中的項目
struct LockLease<'a> {
    locks: &'a LockMap,
    calculation_id: String,
    lock: Arc<AsyncMutex<()>>,
}

impl Drop for LockLease<'_> {
    fn drop(&mut self) {
        let mut locks = lock_map(self.locks);
        // 表中一份加上自己一份：沒有其他請求在等待
        let last_holder = locks
            .get(&self.calculation_id)
            .is_some_and(|entry| Arc::ptr_eq(entry, &self.lock) && Arc::strong_count(entry) == 2);
        if last_holder {
            locks.remove(&self.calculation_id);
            tracing::trace!("released lock entry for '{}'", self.calculation_id);
        }
    }
}
