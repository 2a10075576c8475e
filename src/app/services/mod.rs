//! 六個計算服務的具體實作，皆為確定性的純計算。

pub mod ai_breakdown;
pub mod energy;
pub mod financial;
pub mod ll97;
pub mod noi;
pub mod property_value;

use crate::core::registry::ServiceRegistry;
use crate::domain::service_io::ServiceInput;
use crate::domain::service_name::ServiceName;
use crate::domain::validation::ValidationReport;
use crate::utils::error::{EngineError, Result};
use std::sync::Arc;

pub use ai_breakdown::AiBreakdownService;
pub use energy::EnergyService;
pub use financial::FinancialService;
pub use ll97::Ll97Service;
pub use noi::NoiService;
pub use property_value::PropertyValueService;

pub fn standard_registry() -> ServiceRegistry {
    ServiceRegistry::new()
        .with_service(Arc::new(AiBreakdownService))
        .with_service(Arc::new(EnergyService))
        .with_service(Arc::new(Ll97Service))
        .with_service(Arc::new(FinancialService))
        .with_service(Arc::new(NoiService))
        .with_service(Arc::new(PropertyValueService))
}

/// 上游欄位為 None 表示該服務從未成功執行
pub(crate) fn require_upstream<T>(
    value: Option<&T>,
    service: ServiceName,
    dependency: ServiceName,
) -> Result<&T> {
    value.ok_or(EngineError::MissingRequiredUpstreamData {
        service,
        dependency,
    })
}

pub(crate) fn mismatched_input(service: ServiceName, input: &ServiceInput) -> EngineError {
    EngineError::ComputationError {
        service,
        message: format!("received input for '{}'", input.service()),
    }
}

pub(crate) fn mismatched_report(service: ServiceName, input: &ServiceInput) -> ValidationReport {
    let mut report = ValidationReport::new();
    report.error(
        "input",
        format!("'{}' cannot validate input for '{}'", service, input.service()),
    );
    report
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::domain::model::{BuildingProfile, CalculationRecord};
    use crate::domain::service_io::{
        EnergyOutput, FinancialOutput, Ll97Output, NoiOutput, UnitMixOutput,
    };

    pub fn building() -> BuildingProfile {
        BuildingProfile::new(40, 32_000.0)
    }

    /// 上游欄位皆已填入的紀錄
    pub fn populated_record() -> CalculationRecord {
        let mut record = CalculationRecord::new("fixture", building());
        record.unit_mix = Some(UnitMixOutput {
            total_units: 40,
            studios: 8,
            one_bed: 16,
            two_bed: 12,
            three_bed: 4,
            ptac_units: 92,
        });
        record.energy = Some(EnergyOutput {
            ptac_units: 92,
            kwh_before: 322_000.0,
            kwh_after: 165_000.0,
            kwh_savings: 157_000.0,
            cost_before: 77_280.0,
            cost_after: 39_600.0,
            annual_savings: 37_680.0,
        });
        record.ll97 = Some(Ll97Output {
            emissions_before: 272.0,
            emissions_after: 226.6,
            limit_2024: 216.0,
            limit_2030: 130.24,
            fee_before_2024: 15_008.0,
            fee_after_2024: 2_840.0,
            fee_before_2030: 38_011.0,
            fee_after_2030: 25_844.0,
            annual_fee_avoided: 12_168.0,
        });
        record.financial = Some(FinancialOutput {
            project_cost: 322_000.0,
            incentives: 46_000.0,
            net_cost: 276_000.0,
            annual_debt_service: 38_000.0,
            simple_payback_years: Some(7.3),
        });
        record.noi = Some(NoiOutput {
            noi_before: 240_000.0,
            noi_after: 289_848.0,
            noi_increase: 49_848.0,
            cash_flow_after_debt_service: 11_848.0,
        });
        record
    }
}
