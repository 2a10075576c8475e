use super::{mismatched_input, mismatched_report, require_upstream};
use crate::core::overrides::merge_overrides;
use crate::domain::model::{CalculationRecord, OverrideSet};
use crate::domain::ports::CalculationService;
use crate::domain::service_io::{
    FinancialInput, FinancialOutput, ServiceInput, ServiceOutput, ServiceResult,
};
use crate::domain::service_name::ServiceName;
use crate::domain::validation::{OverrideField, OverrideRule, ValidationReport};
use crate::utils::error::{EngineError, Result};
use crate::utils::validation::{check_non_negative, check_range};
use async_trait::async_trait;

/// 每台 PTHP 安裝成本（含設備與人工）
pub const DEFAULT_INSTALL_COST_PER_UNIT: f64 = 3_500.0;
/// 每台公用事業補助
pub const DEFAULT_INCENTIVE_PER_UNIT: f64 = 500.0;
pub const DEFAULT_INTEREST_RATE: f64 = 0.065;
pub const DEFAULT_LOAN_TERM_YEARS: u32 = 10;
const LONG_TERM_WARNING_YEARS: u32 = 40;

const OVERRIDES: &[OverrideField] = &[
    OverrideField::new("installCostPerUnit", OverrideRule::NonNegative),
    OverrideField::new("incentivePerUnit", OverrideRule::NonNegative),
    OverrideField::new("interestRate", OverrideRule::Rate),
    OverrideField::new("loanTermYears", OverrideRule::Count),
];

/// 專案成本、貸款年付額與回收期
pub struct FinancialService;

impl FinancialService {
    /// 等額本息年付額；利率為 0 時直接平均攤還
    pub fn annual_payment(principal: f64, rate: f64, years: u32) -> Result<f64> {
        if years == 0 {
            return Err(EngineError::ComputationError {
                service: ServiceName::Financial,
                message: "loan term must be at least one year".to_string(),
            });
        }
        if principal <= 0.0 {
            return Ok(0.0);
        }
        let n = years as f64;
        if rate == 0.0 {
            return Ok(principal / n);
        }
        Ok(principal * rate / (1.0 - (1.0 + rate).powf(-n)))
    }
}

#[async_trait]
impl CalculationService for FinancialService {
    fn name(&self) -> ServiceName {
        ServiceName::Financial
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

        let input = FinancialInput {
            ptac_units: energy.ptac_units,
            annual_savings: energy.annual_savings,
            install_cost_per_unit: DEFAULT_INSTALL_COST_PER_UNIT,
            incentive_per_unit: DEFAULT_INCENTIVE_PER_UNIT,
            interest_rate: record
                .building
                .interest_rate
                .unwrap_or(DEFAULT_INTEREST_RATE),
            loan_term_years: record
                .building
                .loan_term_years
                .unwrap_or(DEFAULT_LOAN_TERM_YEARS),
        };
        Ok(ServiceInput::Financial(merge_overrides(
            self.name(),
            input,
            overrides,
        )?))
    }

    fn validate_input(&self, input: &ServiceInput) -> ValidationReport {
        let ServiceInput::Financial(input) = input else {
            return mismatched_report(self.name(), input);
        };
        let mut report = ValidationReport::new();

        report.check(check_non_negative("installCostPerUnit", input.install_cost_per_unit));
        report.check(check_non_negative("incentivePerUnit", input.incentive_per_unit));
        report.check(check_range("interestRate", input.interest_rate, 0.0, 1.0));

        if input.loan_term_years < 1 {
            report.error("loanTermYears", "loan term must be at least one year");
        } else if input.loan_term_years > LONG_TERM_WARNING_YEARS {
            report.warning(
                "loanTermYears",
                format!("loan term of {} years is unusually long", input.loan_term_years),
            );
        }
        if input.incentive_per_unit > input.install_cost_per_unit {
            report.warning(
                "incentivePerUnit",
                "incentive exceeds install cost; net cost will be negative",
            );
        }

        report
    }

    async fn execute(&self, input: ServiceInput) -> Result<ServiceOutput> {
        let input = match input {
            ServiceInput::Financial(input) => input,
            other => return Err(mismatched_input(self.name(), &other)),
        };

        let units = input.ptac_units as f64;
        let project_cost = units * input.install_cost_per_unit;
        let incentives = units * input.incentive_per_unit;
        let net_cost = project_cost - incentives;
        let annual_debt_service =
            Self::annual_payment(net_cost, input.interest_rate, input.loan_term_years)?;
        let simple_payback_years =
            (input.annual_savings > 0.0).then(|| net_cost.max(0.0) / input.annual_savings);

        Ok(ServiceOutput::new(ServiceResult::Financial(FinancialOutput {
            project_cost,
            incentives,
            net_cost,
            annual_debt_service,
            simple_payback_years,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::services::fixtures;

    fn input() -> FinancialInput {
        FinancialInput {
            ptac_units: 10,
            annual_savings: 1_000.0,
            install_cost_per_unit: 3_000.0,
            incentive_per_unit: 1_000.0,
            interest_rate: 0.0,
            loan_term_years: 10,
        }
    }

    #[test]
    fn test_annual_payment() {
        assert_eq!(FinancialService::annual_payment(10_000.0, 0.0, 10).unwrap(), 1_000.0);
        // 10000 @ 5% 10 年 ≈ 1295.05
        let payment = FinancialService::annual_payment(10_000.0, 0.05, 10).unwrap();
        assert!((payment - 1_295.05).abs() < 0.01);
        assert_eq!(FinancialService::annual_payment(-5.0, 0.05, 10).unwrap(), 0.0);
        assert!(FinancialService::annual_payment(10_000.0, 0.05, 0).is_err());
    }

    #[tokio::test]
    async fn test_execute() {
        let output = FinancialService
            .execute(ServiceInput::Financial(input()))
            .await
            .unwrap();
        let ServiceResult::Financial(financial) = output.result else {
            panic!("wrong result variant");
        };
        assert_eq!(financial.project_cost, 30_000.0);
        assert_eq!(financial.net_cost, 20_000.0);
        assert_eq!(financial.annual_debt_service, 2_000.0);
        assert_eq!(financial.simple_payback_years, Some(20.0));
    }

    #[tokio::test]
    async fn test_no_payback_without_savings() {
        let mut flat = input();
        flat.annual_savings = 0.0;
        let output = FinancialService
            .execute(ServiceInput::Financial(flat))
            .await
            .unwrap();
        let ServiceResult::Financial(financial) = output.result else {
            panic!("wrong result variant");
        };
        assert_eq!(financial.simple_payback_years, None);
    }

    #[test]
    fn test_reads_energy_output() {
        let record = fixtures::populated_record();
        let ServiceInput::Financial(built) =
            FinancialService.build_input_from_record(&record, None).unwrap()
        else {
            panic!("wrong input variant");
        };
        assert_eq!(built.ptac_units, 92);
        assert_eq!(built.annual_savings, 37_680.0);
        assert_eq!(built.interest_rate, DEFAULT_INTEREST_RATE);
    }

    #[test]
    fn test_validation() {
        let mut bad = input();
        bad.interest_rate = 1.5;
        bad.loan_term_years = 0;
        let report = FinancialService.validate_input(&ServiceInput::Financial(bad));
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 2);

        let mut long = input();
        long.loan_term_years = 50;
        long.incentive_per_unit = 5_000.0;
        let report = FinancialService.validate_input(&ServiceInput::Financial(long));
        assert!(report.valid);
        assert_eq!(report.warnings.len(), 2);
    }
}
