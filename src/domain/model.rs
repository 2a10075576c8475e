use crate::domain::service_io::{
    EnergyOutput, FinancialOutput, Ll97Output, NoiOutput, PropertyValueOutput, ServiceOutput,
    ServiceResult, UnitMixOutput,
};
use crate::domain::service_name::ServiceName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static VERSION_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// 服務成功執行後寫入的版本戳記，對外視為不透明字串
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionStamp(String);

impl VersionStamp {
    pub fn issue(service: ServiceName) -> Self {
        let sequence = VERSION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        Self(format!(
            "{}-{}-{:06}",
            service,
            Utc::now().timestamp_millis(),
            sequence
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 建物基本資料，由建立紀錄時提供；選填欄位由各服務套用預設值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingProfile {
    pub total_units: u32,
    pub gross_floor_area_sqft: f64,
    pub building_class: Option<String>,
    pub year_built: Option<u32>,
    pub baseline_emissions_tco2e: Option<f64>,
    pub electricity_rate: Option<f64>,
    pub current_noi: Option<f64>,
    pub interest_rate: Option<f64>,
    pub loan_term_years: Option<u32>,
    pub cap_rate: Option<f64>,
}

impl BuildingProfile {
    pub fn new(total_units: u32, gross_floor_area_sqft: f64) -> Self {
        Self {
            total_units,
            gross_floor_area_sqft,
            building_class: None,
            year_built: None,
            baseline_emissions_tco2e: None,
            electricity_rate: None,
            current_noi: None,
            interest_rate: None,
            loan_term_years: None,
            cap_rate: None,
        }
    }
}

/// 覆寫紀錄（稽核用）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideMetadata {
    pub service: ServiceName,
    pub field: String,
    pub original_value: Option<serde_json::Value>,
    pub new_value: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
}

/// 單次服務呼叫的覆寫值，欄位名稱對應服務輸入的 camelCase 名稱
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverrideSet(BTreeMap<String, serde_json::Value>);

impl OverrideSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.0.insert(field.into(), value.into());
    }

    /// 解析 `field=value` 形式；value 先以 JSON 解析，失敗則視為字串
    pub fn insert_assignment(&mut self, assignment: &str) -> Option<()> {
        let (field, raw) = assignment.split_once('=')?;
        let field = field.trim();
        if field.is_empty() {
            return None;
        }
        let raw = raw.trim();
        let value = serde_json::from_str(raw)
            .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
        self.insert(field, value);
        Some(())
    }

    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.0.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl FromIterator<(String, serde_json::Value)> for OverrideSet {
    fn from_iter<I: IntoIterator<Item = (String, serde_json::Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationRecord {
    pub calculation_id: String,
    /// 樂觀鎖版本，由 RecordStore 在每次儲存時遞增
    #[serde(default)]
    pub revision: u64,
    pub building: BuildingProfile,
    pub unit_mix: Option<UnitMixOutput>,
    pub energy: Option<EnergyOutput>,
    pub ll97: Option<Ll97Output>,
    pub financial: Option<FinancialOutput>,
    pub noi: Option<NoiOutput>,
    pub property_value: Option<PropertyValueOutput>,
    #[serde(default)]
    pub service_versions: BTreeMap<ServiceName, VersionStamp>,
    pub last_calculated_service: Option<ServiceName>,
    #[serde(default)]
    pub override_log: Vec<OverrideMetadata>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CalculationRecord {
    pub fn new(calculation_id: impl Into<String>, building: BuildingProfile) -> Self {
        let now = Utc::now();
        Self {
            calculation_id: calculation_id.into(),
            revision: 0,
            building,
            unit_mix: None,
            energy: None,
            ll97: None,
            financial: None,
            noi: None,
            property_value: None,
            service_versions: BTreeMap::new(),
            last_calculated_service: None,
            override_log: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_executed(&self, service: ServiceName) -> bool {
        self.service_versions.contains_key(&service)
    }

    pub fn version_of(&self, service: ServiceName) -> Option<&VersionStamp> {
        self.service_versions.get(&service)
    }

    /// 寫入單一服務的輸出欄位與版本戳記
    pub fn apply_output(&mut self, output: &ServiceOutput, at: DateTime<Utc>) {
        match &output.result {
            ServiceResult::AiBreakdown(fields) => self.unit_mix = Some(fields.clone()),
            ServiceResult::Energy(fields) => self.energy = Some(fields.clone()),
            ServiceResult::Ll97(fields) => self.ll97 = Some(fields.clone()),
            ServiceResult::Financial(fields) => self.financial = Some(fields.clone()),
            ServiceResult::Noi(fields) => self.noi = Some(fields.clone()),
            ServiceResult::PropertyValue(fields) => self.property_value = Some(fields.clone()),
        }
        let service = output.service();
        self.service_versions.insert(service, output.version.clone());
        self.last_calculated_service = Some(service);
        self.updated_at = at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::service_io::PropertyValueOutput;

    #[test]
    fn test_version_stamps_are_distinct() {
        let first = VersionStamp::issue(ServiceName::Energy);
        let second = VersionStamp::issue(ServiceName::Energy);
        assert_ne!(first, second);
        assert!(first.as_str().starts_with("energy-"));
    }

    #[test]
    fn test_override_assignment_parsing() {
        let mut overrides = OverrideSet::new();
        assert!(overrides.insert_assignment("ptacUnits=18").is_some());
        assert!(overrides.insert_assignment("buildingClass=D").is_some());
        assert!(overrides.insert_assignment("=3").is_none());
        assert!(overrides.insert_assignment("noEquals").is_none());

        assert_eq!(overrides.get("ptacUnits"), Some(&serde_json::json!(18)));
        assert_eq!(overrides.get("buildingClass"), Some(&serde_json::json!("D")));
        assert_eq!(overrides.len(), 2);
    }

    #[test]
    fn test_apply_output_sets_version_and_last_service() {
        let mut record = CalculationRecord::new("calc-1", BuildingProfile::new(40, 30_000.0));
        assert!(!record.has_executed(ServiceName::PropertyValue));

        let output = ServiceOutput::new(ServiceResult::PropertyValue(PropertyValueOutput {
            cap_rate: 0.05,
            value_before: 1_000_000.0,
            value_after: 1_100_000.0,
            value_increase: 100_000.0,
        }));
        let at = Utc::now();
        record.apply_output(&output, at);

        assert!(record.has_executed(ServiceName::PropertyValue));
        assert_eq!(record.version_of(ServiceName::PropertyValue), Some(&output.version));
        assert_eq!(record.last_calculated_service, Some(ServiceName::PropertyValue));
        assert_eq!(record.updated_at, at);
        assert!(record.property_value.is_some());
    }

    #[test]
    fn test_record_json_roundtrip_keeps_service_keys() {
        let mut record = CalculationRecord::new("calc-2", BuildingProfile::new(10, 8_000.0));
        record
            .service_versions
            .insert(ServiceName::AiBreakdown, VersionStamp::issue(ServiceName::AiBreakdown));
        let json = serde_json::to_value(&record).unwrap();
        assert!(json["serviceVersions"].get("ai-breakdown").is_some());
        let parsed: CalculationRecord = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, record);
    }
}
