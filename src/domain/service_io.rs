//! 各計算服務的輸入與輸出型別。
//!
//! 輸入欄位名稱（camelCase）即為覆寫（override）時使用的欄位名稱。

use crate::domain::model::VersionStamp;
use crate::domain::service_name::ServiceName;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitMixInput {
    pub total_units: u32,
    pub building_class: String,
    pub studios: Option<u32>,
    pub one_bed: Option<u32>,
    pub two_bed: Option<u32>,
    pub three_bed: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitMixOutput {
    pub total_units: u32,
    pub studios: u32,
    pub one_bed: u32,
    pub two_bed: u32,
    pub three_bed: u32,
    pub ptac_units: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyInput {
    pub ptac_units: u32,
    pub heating_kwh_per_ptac: f64,
    pub cooling_kwh_per_ptac: f64,
    pub heat_pump_cop: f64,
    pub cooling_efficiency_gain: f64,
    pub electricity_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyOutput {
    pub ptac_units: u32,
    pub kwh_before: f64,
    pub kwh_after: f64,
    pub kwh_savings: f64,
    pub cost_before: f64,
    pub cost_after: f64,
    pub annual_savings: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ll97Input {
    pub gross_floor_area_sqft: f64,
    pub baseline_emissions_tco2e: f64,
    pub kwh_savings: f64,
    pub carbon_coefficient: f64,
    pub limit_2024_per_sqft: f64,
    pub limit_2030_per_sqft: f64,
    pub penalty_per_ton: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ll97Output {
    pub emissions_before: f64,
    pub emissions_after: f64,
    pub limit_2024: f64,
    pub limit_2030: f64,
    pub fee_before_2024: f64,
    pub fee_after_2024: f64,
    pub fee_before_2030: f64,
    pub fee_after_2030: f64,
    pub annual_fee_avoided: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialInput {
    pub ptac_units: u32,
    pub annual_savings: f64,
    pub install_cost_per_unit: f64,
    pub incentive_per_unit: f64,
    pub interest_rate: f64,
    pub loan_term_years: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialOutput {
    pub project_cost: f64,
    pub incentives: f64,
    pub net_cost: f64,
    pub annual_debt_service: f64,
    pub simple_payback_years: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoiInput {
    pub current_noi: f64,
    pub annual_energy_savings: f64,
    pub ll97_fee_avoided: f64,
    pub annual_debt_service: f64,
    pub maintenance_savings: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoiOutput {
    pub noi_before: f64,
    pub noi_after: f64,
    pub noi_increase: f64,
    pub cash_flow_after_debt_service: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyValueInput {
    pub noi_before: f64,
    pub noi_after: f64,
    pub cap_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyValueOutput {
    pub cap_rate: f64,
    pub value_before: f64,
    pub value_after: f64,
    pub value_increase: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServiceInput {
    AiBreakdown(UnitMixInput),
    Energy(EnergyInput),
    Ll97(Ll97Input),
    Financial(FinancialInput),
    Noi(NoiInput),
    PropertyValue(PropertyValueInput),
}

impl ServiceInput {
    pub fn service(&self) -> ServiceName {
        match self {
            ServiceInput::AiBreakdown(_) => ServiceName::AiBreakdown,
            ServiceInput::Energy(_) => ServiceName::Energy,
            ServiceInput::Ll97(_) => ServiceName::Ll97,
            ServiceInput::Financial(_) => ServiceName::Financial,
            ServiceInput::Noi(_) => ServiceName::Noi,
            ServiceInput::PropertyValue(_) => ServiceName::PropertyValue,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "service", content = "fields", rename_all = "kebab-case")]
pub enum ServiceResult {
    AiBreakdown(UnitMixOutput),
    Energy(EnergyOutput),
    Ll97(Ll97Output),
    Financial(FinancialOutput),
    Noi(NoiOutput),
    PropertyValue(PropertyValueOutput),
}

impl ServiceResult {
    pub fn service(&self) -> ServiceName {
        match self {
            ServiceResult::AiBreakdown(_) => ServiceName::AiBreakdown,
            ServiceResult::Energy(_) => ServiceName::Energy,
            ServiceResult::Ll97(_) => ServiceName::Ll97,
            ServiceResult::Financial(_) => ServiceName::Financial,
            ServiceResult::Noi(_) => ServiceName::Noi,
            ServiceResult::PropertyValue(_) => ServiceName::PropertyValue,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceOutput {
    pub version: VersionStamp,
    pub result: ServiceResult,
}

impl ServiceOutput {
    pub fn new(result: ServiceResult) -> Self {
        let version = VersionStamp::issue(result.service());
        Self { version, result }
    }

    pub fn service(&self) -> ServiceName {
        self.result.service()
    }
}
