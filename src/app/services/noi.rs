use super::{mismatched_input, mismatched_report, require_upstream};
use crate::core::overrides::merge_overrides;
use crate::domain::model::{CalculationRecord, OverrideSet};
use crate::domain::ports::CalculationService;
use crate::domain::service_io::{NoiInput, NoiOutput, ServiceInput, ServiceOutput, ServiceResult};
use crate::domain::service_name::ServiceName;
use crate::domain::validation::{OverrideField, OverrideRule, ValidationReport};
use crate::utils::error::Result;
use crate::utils::validation::{check_non_negative, check_range};
use async_trait::async_trait;

/// 未提供現況 NOI 時，每戶每年的估算值
pub const DEFAULT_NOI_PER_UNIT: f64 = 6_000.0;
const NOI_BOUND: f64 = 1e12;

const OVERRIDES: &[OverrideField] = &[
    OverrideField::new(
        "currentNoi",
        OverrideRule::Range {
            min: -NOI_BOUND,
            max: NOI_BOUND,
        },
    ),
    OverrideField::new("maintenanceSavings", OverrideRule::NonNegative),
];

/// 改造後的淨營運收入
pub struct NoiService;

#[async_trait]
impl CalculationService for NoiService {
    fn name(&self) -> ServiceName {
        ServiceName::Noi
    }

    fn override_fields(&self) -> &'static [OverrideField] {
        OVERRIDES
    }

    fn build_input_from_record(
        &self,
        record: &CalculationRecord,
        overrides: Option<&OverrideSet>,
    ) -> Result<ServiceInput> {
        let energy = require_upstream(record.energy.as_ref(), self.name(), ServiceName::Energy)?;
        let ll97 = require_upstream(record.ll97.as_ref(), self.name(), ServiceName::Ll97)?;
        let financial =
            require_upstream(record.financial.as_ref(), self.name(), ServiceName::Financial)?;

        let input = NoiInput {
            current_noi: record
                .building
                .current_noi
                .unwrap_or(record.building.total_units as f64 * DEFAULT_NOI_PER_UNIT),
            annual_energy_savings: energy.annual_savings,
            ll97_fee_avoided: ll97.annual_fee_avoided,
            annual_debt_service: financial.annual_debt_service,
            maintenance_savings: 0.0,
        };
        Ok(ServiceInput::Noi(merge_overrides(self.name(), input, overrides)?))
    }

    fn validate_input(&self, input: &ServiceInput) -> ValidationReport {
        let ServiceInput::Noi(input) = input else {
            return mismatched_report(self.name(), input);
        };
        let mut report = ValidationReport::new();

        report.check(check_range("currentNoi", input.current_noi, -NOI_BOUND, NOI_BOUND));
        report.check(check_non_negative("maintenanceSavings", input.maintenance_savings));
        report.check(check_non_negative("annualDebtService", input.annual_debt_service));

        if input.current_noi < 0.0 {
            report.warning("currentNoi", "building is operating at a loss");
        }

        report
    }

    async fn execute(&self, input: ServiceInput) -> Result<ServiceOutput> {
        let input = match input {
            ServiceInput::Noi(input) => input,
            other => return Err(mismatched_input(self.name(), &other)),
        };

        let noi_after = input.current_noi
            + input.annual_energy_savings
            + input.ll97_fee_avoided
            + input.maintenance_savings;
        let noi_increase = noi_after - input.current_noi;

        Ok(ServiceOutput::new(ServiceResult::Noi(NoiOutput {
            noi_before: input.current_noi,
            noi_after,
            noi_increase,
            cash_flow_after_debt_service: noi_increase - input.annual_debt_service,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::services::fixtures;
    use crate::utils::error::EngineError;

    #[tokio::test]
    async fn test_execute() {
        let input = NoiInput {
            current_noi: 100_000.0,
            annual_energy_savings: 10_000.0,
            ll97_fee_avoided: 5_000.0,
            annual_debt_service: 8_000.0,
            maintenance_savings: 1_000.0,
        };
        let output = NoiService.execute(ServiceInput::Noi(input)).await.unwrap();
        let ServiceResult::Noi(noi) = output.result else {
            panic!("wrong result variant");
        };
        assert_eq!(noi.noi_after, 116_000.0);
        assert_eq!(noi.noi_increase, 16_000.0);
        assert_eq!(noi.cash_flow_after_debt_service, 8_000.0);
    }

    #[test]
    fn test_requires_all_upstreams() {
        let mut record = fixtures::populated_record();
        record.financial = None;
        assert!(matches!(
            NoiService.build_input_from_record(&record, None),
            Err(EngineError::MissingRequiredUpstreamData {
                dependency: ServiceName::Financial,
                ..
            })
        ));
    }

    #[test]
    fn test_default_noi_and_override() {
        let record = fixtures::populated_record();
        let ServiceInput::Noi(built) = NoiService.build_input_from_record(&record, None).unwrap() else {
            panic!("wrong input variant");
        };
        assert_eq!(built.current_noi, 240_000.0);
        assert_eq!(built.ll97_fee_avoided, 12_168.0);

        let overrides = OverrideSet::new().with("maintenanceSavings", 2_500.0);
        let ServiceInput::Noi(built) = NoiService
            .build_input_from_record(&record, Some(&overrides))
            .unwrap()
        else {
            panic!("wrong input variant");
        };
        assert_eq!(built.maintenance_savings, 2_500.0);
    }
}
