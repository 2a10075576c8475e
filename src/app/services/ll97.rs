use super::{mismatched_input, mismatched_report, require_upstream};
use crate::core::overrides::merge_overrides;
use crate::domain::model::{CalculationRecord, OverrideSet};
use crate::domain::ports::CalculationService;
use crate::domain::service_io::{Ll97Input, Ll97Output, ServiceInput, ServiceOutput, ServiceResult};
use crate::domain::service_name::ServiceName;
use crate::domain::validation::{OverrideField, OverrideRule, ValidationReport};
use crate::utils::error::Result;
use crate::utils::validation::{check_non_negative, check_positive, check_range};
use async_trait::async_trait;

/// tCO2e/kWh，電網排放係數
pub const DEFAULT_CARBON_COEFFICIENT: f64 = 0.000_288_962;
/// tCO2e/sqft，多戶住宅 2024–2029 上限
pub const DEFAULT_LIMIT_2024_PER_SQFT: f64 = 0.006_75;
/// tCO2e/sqft，多戶住宅 2030–2034 上限
pub const DEFAULT_LIMIT_2030_PER_SQFT: f64 = 0.004_07;
/// $/tCO2e 超標罰款
pub const DEFAULT_PENALTY_PER_TON: f64 = 268.0;
/// 未提供基準排放時的估算強度 tCO2e/sqft
pub const DEFAULT_EMISSIONS_INTENSITY: f64 = 0.008_5;

const OVERRIDES: &[OverrideField] = &[
    OverrideField::new("baselineEmissionsTco2e", OverrideRule::NonNegative),
    OverrideField::new("carbonCoefficient", OverrideRule::Range { min: 0.0, max: 0.01 }),
    OverrideField::new("limit2024PerSqft", OverrideRule::NonNegative),
    OverrideField::new("limit2030PerSqft", OverrideRule::NonNegative),
    OverrideField::new("penaltyPerTon", OverrideRule::NonNegative),
];

/// Local Law 97 排放上限與罰款
pub struct Ll97Service;

fn fee(emissions: f64, limit: f64, penalty_per_ton: f64) -> f64 {
    (emissions - limit).max(0.0) * penalty_per_ton
}

#[async_trait]
impl CalculationService for Ll97Service {
    fn name(&self) -> ServiceName {
        ServiceName::Ll97
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
        let area = record.building.gross_floor_area_sqft;

        let input = Ll97Input {
            gross_floor_area_sqft: area,
            baseline_emissions_tco2e: record
                .building
                .baseline_emissions_tco2e
                .unwrap_or(area * DEFAULT_EMISSIONS_INTENSITY),
            kwh_savings: energy.kwh_savings,
            carbon_coefficient: DEFAULT_CARBON_COEFFICIENT,
            limit_2024_per_sqft: DEFAULT_LIMIT_2024_PER_SQFT,
            limit_2030_per_sqft: DEFAULT_LIMIT_2030_PER_SQFT,
            penalty_per_ton: DEFAULT_PENALTY_PER_TON,
        };
        Ok(ServiceInput::Ll97(merge_overrides(self.name(), input, overrides)?))
    }

    fn validate_input(&self, input: &ServiceInput) -> ValidationReport {
        let ServiceInput::Ll97(input) = input else {
            return mismatched_report(self.name(), input);
        };
        let mut report = ValidationReport::new();

        report.check(check_positive("grossFloorAreaSqft", input.gross_floor_area_sqft));
        report.check(check_non_negative(
            "baselineEmissionsTco2e",
            input.baseline_emissions_tco2e,
        ));
        report.check(check_range("carbonCoefficient", input.carbon_coefficient, 0.0, 0.01));
        report.check(check_non_negative("limit2024PerSqft", input.limit_2024_per_sqft));
        report.check(check_non_negative("limit2030PerSqft", input.limit_2030_per_sqft));
        report.check(check_non_negative("penaltyPerTon", input.penalty_per_ton));

        if input.kwh_savings * input.carbon_coefficient > input.baseline_emissions_tco2e {
            report.warning(
                "baselineEmissionsTco2e",
                "retrofit reduction exceeds baseline emissions; post-retrofit emissions clamped to zero",
            );
        }
        if input.limit_2030_per_sqft > input.limit_2024_per_sqft {
            report.warning("limit2030PerSqft", "2030 limit is looser than the 2024 limit");
        }

        report
    }

    async fn execute(&self, input: ServiceInput) -> Result<ServiceOutput> {
        let input = match input {
            ServiceInput::Ll97(input) => input,
            other => return Err(mismatched_input(self.name(), &other)),
        };

        let emissions_before = input.baseline_emissions_tco2e;
        let emissions_after =
            (emissions_before - input.kwh_savings * input.carbon_coefficient).max(0.0);
        let limit_2024 = input.gross_floor_area_sqft * input.limit_2024_per_sqft;
        let limit_2030 = input.gross_floor_area_sqft * input.limit_2030_per_sqft;

        let fee_before_2024 = fee(emissions_before, limit_2024, input.penalty_per_ton);
        let fee_after_2024 = fee(emissions_after, limit_2024, input.penalty_per_ton);

        Ok(ServiceOutput::new(ServiceResult::Ll97(Ll97Output {
            emissions_before,
            emissions_after,
            limit_2024,
            limit_2030,
            fee_before_2024,
            fee_after_2024,
            fee_before_2030: fee(emissions_before, limit_2030, input.penalty_per_ton),
            fee_after_2030: fee(emissions_after, limit_2030, input.penalty_per_ton),
            annual_fee_avoided: fee_before_2024 - fee_after_2024,
        })))
    }
}
