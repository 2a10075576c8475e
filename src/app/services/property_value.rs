use super::{mismatched_input, mismatched_report, require_upstream};
use crate::core::overrides::merge_overrides;
use crate::domain::model::{CalculationRecord, OverrideSet};
use crate::domain::ports::CalculationService;
use crate::domain::service_io::{
    PropertyValueInput, PropertyValueOutput, ServiceInput, ServiceOutput, ServiceResult,
};
use crate::domain::service_name::ServiceName;
use crate::domain::validation::{OverrideField, OverrideRule, ValidationReport};
use crate::utils::error::{EngineError, Result};
use async_trait::async_trait;

pub const DEFAULT_CAP_RATE: f64 = 0.055;
const TYPICAL_CAP_RATE: (f64, f64) = (0.03, 0.12);

const OVERRIDES: &[OverrideField] = &[OverrideField::new("capRate", OverrideRule::Rate)];

/// 以資本化率將 NOI 換算成資產價值
pub struct PropertyValueService;

#[async_trait]
impl CalculationService for PropertyValueService {
    fn name(&self) -> ServiceName {
        ServiceName::PropertyValue
    }

    fn override_fields(&self) -> &'static [OverrideField] {
        OVERRIDES
    }

    fn build_input_from_record(
        &self,
        record: &CalculationRecord,
        overrides: Option<&OverrideSet>,
    ) -> Result<ServiceInput> {
        let noi = require_upstream(record.noi.as_ref(), self.name(), ServiceName::Noi)?;

        let input = PropertyValueInput {
            noi_before: noi.noi_before,
            noi_after: noi.noi_after,
            cap_rate: record.building.cap_rate.unwrap_or(DEFAULT_CAP_RATE),
        };
        Ok(ServiceInput::PropertyValue(merge_overrides(
            self.name(),
            input,
            overrides,
        )?))
    }

    fn validate_input(&self, input: &ServiceInput) -> ValidationReport {
        let ServiceInput::PropertyValue(input) = input else {
            return mismatched_report(self.name(), input);
        };
        let mut report = ValidationReport::new();

        if !input.cap_rate.is_finite() || input.cap_rate <= 0.0 || input.cap_rate > 1.0 {
            report.error(
                "capRate",
                format!("cap rate must be in (0, 1] (got {})", input.cap_rate),
            );
        } else if input.cap_rate < TYPICAL_CAP_RATE.0 || input.cap_rate > TYPICAL_CAP_RATE.1 {
            report.warning(
                "capRate",
                format!(
                    "cap rate {} is outside the typical {}-{} range",
                    input.cap_rate, TYPICAL_CAP_RATE.0, TYPICAL_CAP_RATE.1
                ),
            );
        }

        report
    }

    async fn execute(&self, input: ServiceInput) -> Result<ServiceOutput> {
        let input = match input {
            ServiceInput::PropertyValue(input) => input,
            other => return Err(mismatched_input(self.name(), &other)),
        };

        if input.cap_rate == 0.0 {
            return Err(EngineError::ComputationError {
                service: self.name(),
                message: "cap rate of zero yields an unbounded value".to_string(),
            });
        }

        let value_before = input.noi_before / input.cap_rate;
        let value_after = input.noi_after / input.cap_rate;

        Ok(ServiceOutput::new(ServiceResult::PropertyValue(
            PropertyValueOutput {
                cap_rate: input.cap_rate,
                value_before,
                value_after,
                value_increase: value_after - value_before,
            },
        )))
    }
}
