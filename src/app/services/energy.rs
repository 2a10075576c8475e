use super::{mismatched_input, mismatched_report, require_upstream};
use crate::core::overrides::merge_overrides;
use crate::domain::model::{CalculationRecord, OverrideSet};
use crate::domain::ports::CalculationService;
use crate::domain::service_io::{EnergyInput, EnergyOutput, ServiceInput, ServiceOutput, ServiceResult};
use crate::domain::service_name::ServiceName;
use crate::domain::validation::{OverrideField, OverrideRule, ValidationReport};
use crate::utils::error::Result;
use crate::utils::validation::{check_non_negative, check_positive, check_range};
use async_trait::async_trait;

/// PTAC 電阻式加熱，每台每年 kWh
pub const DEFAULT_HEATING_KWH_PER_PTAC: f64 = 2_400.0;
pub const DEFAULT_COOLING_KWH_PER_PTAC: f64 = 1_100.0;
pub const DEFAULT_HEAT_PUMP_COP: f64 = 2.8;
pub const DEFAULT_COOLING_EFFICIENCY_GAIN: f64 = 0.15;
/// $/kWh
pub const DEFAULT_ELECTRICITY_RATE: f64 = 0.24;

const OVERRIDES: &[OverrideField] = &[
    OverrideField::new("ptacUnits", OverrideRule::Count),
    OverrideField::new("heatingKwhPerPtac", OverrideRule::NonNegative),
    OverrideField::new("coolingKwhPerPtac", OverrideRule::NonNegative),
    OverrideField::new("heatPumpCop", OverrideRule::Positive),
    OverrideField::new("coolingEfficiencyGain", OverrideRule::Rate),
    OverrideField::new("electricityRate", OverrideRule::Positive),
];

/// PTAC 換成 PTHP 前後的用電量與電費
pub struct EnergyService;

#[async_trait]
impl CalculationService for EnergyService {
    fn name(&self) -> ServiceName {
        ServiceName::Energy
    }

    fn override_fields(&self) -> &'static [OverrideField] {
        OVERRIDES
    }

    fn build_input_from_record(
        &self,
        record: &CalculationRecord,
        overrides: Option<&OverrideSet>,
    ) -> Result<ServiceInput> {
        let unit_mix = require_upstream(record.unit_mix.as_ref(), self.name(), ServiceName::AiBreakdown)?;

        let input = EnergyInput {
            ptac_units: unit_mix.ptac_units,
            heating_kwh_per_ptac: DEFAULT_HEATING_KWH_PER_PTAC,
            cooling_kwh_per_ptac: DEFAULT_COOLING_KWH_PER_PTAC,
            heat_pump_cop: DEFAULT_HEAT_PUMP_COP,
            cooling_efficiency_gain: DEFAULT_COOLING_EFFICIENCY_GAIN,
            electricity_rate: record
                .building
                .electricity_rate
                .unwrap_or(DEFAULT_ELECTRICITY_RATE),
        };
        Ok(ServiceInput::Energy(merge_overrides(self.name(), input, overrides)?))
    }

    fn validate_input(&self, input: &ServiceInput) -> ValidationReport {
        let ServiceInput::Energy(input) = input else {
            return mismatched_report(self.name(), input);
        };
        let mut report = ValidationReport::new();

        report.check(check_non_negative("heatingKwhPerPtac", input.heating_kwh_per_ptac));
        report.check(check_non_negative("coolingKwhPerPtac", input.cooling_kwh_per_ptac));
        report.check(check_positive("heatPumpCop", input.heat_pump_cop));
        report.check(check_range(
            "coolingEfficiencyGain",
            input.cooling_efficiency_gain,
            0.0,
            1.0,
        ));
        report.check(check_positive("electricityRate", input.electricity_rate));

        if input.ptac_units == 0 {
            report.warning("ptacUnits", "no PTAC units; energy savings will be zero");
        }
        if input.heat_pump_cop > 0.0 && input.heat_pump_cop < 1.0 {
            report.warning("heatPumpCop", "COP below 1 uses more energy than resistance heat");
        }

        report
    }

    async fn execute(&self, input: ServiceInput) -> Result<ServiceOutput> {
        let input = match input {
            ServiceInput::Energy(input) => input,
            other => return Err(mismatched_input(self.name(), &other)),
        };

        let units = input.ptac_units as f64;
        let kwh_before = units * (input.heating_kwh_per_ptac + input.cooling_kwh_per_ptac);
        let kwh_after = units
            * (input.heating_kwh_per_ptac / input.heat_pump_cop
                + input.cooling_kwh_per_ptac * (1.0 - input.cooling_efficiency_gain));
        let cost_before = kwh_before * input.electricity_rate;
        let cost_after = kwh_after * input.electricity_rate;

        Ok(ServiceOutput::new(ServiceResult::Energy(EnergyOutput {
            ptac_units: input.ptac_units,
            kwh_before,
            kwh_after,
            kwh_savings: kwh_before - kwh_after,
            cost_before,
            cost_after,
            annual_savings: cost_before - cost_after,
        })))
    }
}
