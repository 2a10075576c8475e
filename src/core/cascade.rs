//! 依執行計畫逐一執行服務。
//!
//! 每個服務：載入最新紀錄 → 建立輸入（僅第一個服務合併覆寫值）→ 驗證 → 執行 → 立即儲存。
//! 任一服務失敗即中止剩餘計畫；已儲存的上游結果不回滾。

use crate::core::overrides::OverrideValidator;
use crate::core::planner::ExecutionPlan;
use crate::core::registry::ServiceRegistry;
use crate::core::state::{StepState, StepTracker};
use crate::domain::model::{CalculationRecord, OverrideMetadata, OverrideSet, VersionStamp};
use crate::domain::ports::{CalculationService, RecordStore};
use crate::domain::service_io::{ServiceInput, ServiceOutput};
use crate::domain::service_name::ServiceName;
use crate::domain::validation::{FieldIssue, ValidationReport};
use crate::utils::error::{EngineError, Result};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_SERVICE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    pub service_timeout: Duration,
    pub default_actor: String,
    pub record_override_audit: bool,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            service_timeout: DEFAULT_SERVICE_TIMEOUT,
            default_actor: "system".to_string(),
            record_override_audit: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceWarning {
    pub service: ServiceName,
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub service: ServiceName,
    pub state: StepState,
    pub version: Option<VersionStamp>,
    pub duration_ms: u64,
    pub warnings: Vec<FieldIssue>,
    /// 失敗時所處的階段：Validating 表示尚未執行，Executing 表示執行或儲存時失敗
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<StepState>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepFailure {
    pub service: ServiceName,
    pub message: String,
    #[serde(skip)]
    pub error: EngineError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CascadeStatus {
    Succeeded,
    /// 部分服務已寫入後才失敗
    PartiallySucceeded,
    /// 沒有任何寫入
    Failed,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeReport {
    pub calculation_id: String,
    pub plan: ExecutionPlan,
    pub steps: Vec<StepResult>,
    pub warnings: Vec<ServiceWarning>,
    pub failure: Option<StepFailure>,
}

impl CascadeReport {
    fn new(calculation_id: &str, plan: ExecutionPlan) -> Self {
        Self {
            calculation_id: calculation_id.to_string(),
            plan,
            steps: Vec::new(),
            warnings: Vec::new(),
            failure: None,
        }
    }

    pub fn status(&self) -> CascadeStatus {
        match (&self.failure, self.completed_services().is_empty()) {
            (None, _) => CascadeStatus::Succeeded,
            (Some(_), false) => CascadeStatus::PartiallySucceeded,
            (Some(_), true) => CascadeStatus::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn completed_services(&self) -> Vec<ServiceName> {
        self.steps
            .iter()
            .filter(|step| step.state == StepState::Succeeded)
            .map(|step| step.service)
            .collect()
    }

    /// 因中止而未嘗試執行的服務
    pub fn not_attempted(&self) -> Vec<ServiceName> {
        self.plan
            .services()
            .iter()
            .copied()
            .filter(|service| !self.steps.iter().any(|step| step.service == *service))
            .collect()
    }

    pub fn failed_service(&self) -> Option<ServiceName> {
        self.failure.as_ref().map(|failure| failure.service)
    }

    pub fn error(&self) -> Option<&EngineError> {
        self.failure.as_ref().map(|failure| &failure.error)
    }

    pub fn into_result(self) -> Result<CascadeReport> {
        match self.failure {
            Some(failure) => Err(failure.error),
            None => Ok(self),
        }
    }

    pub fn summary(&self) -> serde_json::Value {
        let total_duration_ms: u64 = self.steps.iter().map(|s| s.duration_ms).sum();
        serde_json::json!({
            "calculationId": self.calculation_id,
            "status": self.status(),
            "plannedServices": self.plan.len(),
            "completedServices": self.completed_services(),
            "failedService": self.failed_service(),
            "warnings": self.warnings.len(),
            "totalDurationMs": total_duration_ms,
        })
    }

    fn record_success(
        &mut self,
        service: ServiceName,
        version: VersionStamp,
        duration: Duration,
        warnings: Vec<FieldIssue>,
    ) {
        self.warnings.extend(warnings.iter().map(|issue| ServiceWarning {
            service,
            field: issue.field.clone(),
            message: issue.message.clone(),
        }));
        self.steps.push(StepResult {
            service,
            state: StepState::Succeeded,
            version: Some(version),
            duration_ms: duration.as_millis() as u64,
            warnings,
            failed_at: None,
        });
    }

    fn record_failure(
        &mut self,
        service: ServiceName,
        failed_at: StepState,
        duration: Duration,
        error: EngineError,
    ) {
        self.steps.push(StepResult {
            service,
            state: StepState::Failed,
            version: None,
            duration_ms: duration.as_millis() as u64,
            warnings: Vec::new(),
            failed_at: Some(failed_at),
        });
        self.failure = Some(StepFailure {
            service,
            message: error.to_string(),
            error,
        });
    }
}

/// 已驗證、可執行的單一步驟
struct PreparedStep {
    input: ServiceInput,
    report: ValidationReport,
    audit: Vec<OverrideMetadata>,
}

pub struct CascadingExecutor<S: RecordStore> {
    store: Arc<S>,
    registry: ServiceRegistry,
    options: ExecutorOptions,
}

impl<S: RecordStore> CascadingExecutor<S> {
    pub fn new(store: Arc<S>, registry: ServiceRegistry, options: ExecutorOptions) -> Self {
        Self {
            store,
            registry,
            options,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    /// 執行計畫。失敗不以 `Err` 回傳，而是記錄在報告的 `failure` 中
    pub async fn run(
        &self,
        calculation_id: &str,
        plan: &ExecutionPlan,
        overrides: &OverrideSet,
        actor: Option<&str>,
    ) -> CascadeReport {
        let mut report = CascadeReport::new(calculation_id, plan.clone());
        let actor = actor.unwrap_or(&self.options.default_actor);

        tracing::info!(
            "🎬 Starting cascade for '{}': {} ({} overrides)",
            calculation_id,
            plan,
            overrides.len()
        );

        for (index, &service_name) in plan.services().iter().enumerate() {
            let started = Instant::now();
            let step_overrides = (index == 0 && !overrides.is_empty()).then_some(overrides);
            let mut tracker = StepTracker::new();

            let outcome = self
                .run_step(&mut tracker, calculation_id, service_name, step_overrides, actor)
                .await;

            match outcome {
                Ok((version, warnings)) => {
                    let duration = started.elapsed();
                    tracing::info!(
                        "✅ Service executed: {} (version: {}, duration: {:?})",
                        service_name,
                        version,
                        duration
                    );
                    for warning in &warnings {
                        tracing::warn!("⚠️ {}: {}", service_name, warning);
                    }
                    report.record_success(service_name, version, duration, warnings);
                }
                Err(e) => {
                    let failed_at = tracker.state();
                    tracker.advance(StepState::Failed);
                    tracing::error!(
                        "❌ Service '{}' failed while {:?}: {}",
                        service_name,
                        failed_at,
                        e
                    );
                    report.record_failure(service_name, failed_at, started.elapsed(), e);
                    break;
                }
            }
        }

        match report.status() {
            CascadeStatus::Succeeded => tracing::info!(
                "🎉 Cascade for '{}' completed: {} services",
                calculation_id,
                report.steps.len()
            ),
            status => tracing::warn!(
                "🛑 Cascade for '{}' stopped ({:?}): completed {:?}, not attempted {:?}",
                calculation_id,
                status,
                report.completed_services(),
                report.not_attempted()
            ),
        }

        report
    }

    async fn run_step(
        &self,
        tracker: &mut StepTracker,
        calculation_id: &str,
        service_name: ServiceName,
        overrides: Option<&OverrideSet>,
        actor: &str,
    ) -> Result<(VersionStamp, Vec<FieldIssue>)> {
        tracker.advance(StepState::Validating);
        tracing::debug!("🔎 {}: validating", service_name);

        let service = self.registry.get(service_name)?;
        // 每一步都重新載入，確保看到上一步剛寫入的結果
        let record = self.store.load(calculation_id).await?;
        let prepared = self.prepare(service.as_ref(), &record, overrides, actor)?;

        tracker.advance(StepState::Executing);
        tracing::debug!("⚙️ {}: executing", service_name);

        let output = self.execute_with_timeout(service.as_ref(), prepared.input).await?;
        if output.service() != service_name {
            return Err(EngineError::ComputationError {
                service: service_name,
                message: format!("service produced output for '{}'", output.service()),
            });
        }

        let mut updated = record;
        updated.apply_output(&output, Utc::now());
        updated.override_log.extend(prepared.audit);
        let revision = self.store.save(calculation_id, &updated).await?;
        tracing::debug!("💾 {}: persisted at revision {}", service_name, revision);

        tracker.advance(StepState::Succeeded);
        Ok((output.version, prepared.report.warnings))
    }

    fn prepare(
        &self,
        service: &dyn CalculationService,
        record: &CalculationRecord,
        overrides: Option<&OverrideSet>,
        actor: &str,
    ) -> Result<PreparedStep> {
        let name = service.name();
        let mut report = ValidationReport::new();
        let mut audit = Vec::new();

        if let Some(overrides) = overrides {
            report.merge(OverrideValidator::check(
                name,
                service.override_fields(),
                overrides,
            )?);

            if self.options.record_override_audit {
                let baseline = service.build_input_from_record(record, None)?;
                let timestamp = Utc::now();
                for (field, original_value) in baseline.original_values(overrides)? {
                    let new_value = overrides.get(&field).cloned().unwrap_or_default();
                    audit.push(OverrideMetadata {
                        service: name,
                        field,
                        original_value,
                        new_value,
                        timestamp,
                        actor: actor.to_string(),
                    });
                }
            }
        }

        let input = service.build_input_from_record(record, overrides)?;
        report.merge(service.validate_input(&input));

        if !report.valid {
            return Err(EngineError::ValidationFailed {
                service: name,
                errors: report.errors,
            });
        }

        Ok(PreparedStep {
            input,
            report,
            audit,
        })
    }

    async fn execute_with_timeout(
        &self,
        service: &dyn CalculationService,
        input: ServiceInput,
    ) -> Result<ServiceOutput> {
        let timeout = self.options.service_timeout;
        match tokio::time::timeout(timeout, service.execute(input)).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::ServiceTimeout {
                service: service.name(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }
}
