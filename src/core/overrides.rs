//! 覆寫值的檢查與合併。
//!
//! 未知欄位一律整批拒絕，不做部分合併。

use crate::domain::model::OverrideSet;
use crate::domain::service_io::ServiceInput;
use crate::domain::service_name::ServiceName;
use crate::domain::validation::{FieldIssue, OverrideField, OverrideRule, ValidationReport};
use crate::utils::error::{EngineError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub struct OverrideValidator;

impl OverrideValidator {
    /// 回傳不在可覆寫清單中的欄位名稱
    pub fn unknown_fields(allowed: &[OverrideField], overrides: &OverrideSet) -> Vec<String> {
        overrides
            .field_names()
            .filter(|name| !allowed.iter().any(|field| field.name == *name))
            .map(str::to_string)
            .collect()
    }

    /// 範圍與型別檢查，未知欄位以錯誤列出
    pub fn validate(allowed: &[OverrideField], overrides: &OverrideSet) -> ValidationReport {
        let mut report = ValidationReport::new();

        for (name, value) in overrides.iter() {
            match allowed.iter().find(|field| field.name == name.as_str()) {
                Some(field) => check_value(field, value, &mut report),
                None => report.error(name.as_str(), "unknown override field"),
            }
        }

        report
    }

    /// 檢查並轉為錯誤：有未知欄位回傳 `UnknownOverrideField`，其餘錯誤回傳 `ValidationFailed`
    pub fn check(
        service: ServiceName,
        allowed: &[OverrideField],
        overrides: &OverrideSet,
    ) -> Result<ValidationReport> {
        let unknown = Self::unknown_fields(allowed, overrides);
        if !unknown.is_empty() {
            return Err(EngineError::UnknownOverrideField {
                service,
                fields: unknown,
            });
        }

        let report = Self::validate(allowed, overrides);
        if !report.valid {
            return Err(EngineError::ValidationFailed {
                service,
                errors: report.errors,
            });
        }
        Ok(report)
    }
}

fn check_value(field: &OverrideField, value: &Value, report: &mut ValidationReport) {
    let name = field.name;

    if value.is_null() {
        report.error(name, "override value must not be null");
        return;
    }

    match field.rule {
        OverrideRule::Text => match value.as_str() {
            Some(text) if !text.trim().is_empty() => {}
            _ => report.error(name, "must be a non-empty string"),
        },
        OverrideRule::Count => match value.as_u64() {
            Some(count) if count <= u32::MAX as u64 => {
                if count == 0 {
                    report.warning(name, "zero count; dependent results will be zero");
                }
            }
            _ => report.error(name, format!("must be a non-negative whole number (got {})", value)),
        },
        rule => {
            let Some(number) = value.as_f64() else {
                report.error(name, format!("must be a number (got {})", value));
                return;
            };
            let issue = match rule {
                OverrideRule::NonNegative => crate::utils::validation::check_non_negative(name, number),
                OverrideRule::Positive => crate::utils::validation::check_positive(name, number),
                OverrideRule::Rate => crate::utils::validation::check_range(name, number, 0.0, 1.0),
                OverrideRule::Range { min, max } => {
                    crate::utils::validation::check_range(name, number, min, max)
                }
                OverrideRule::Count | OverrideRule::Text => None,
            };
            report.check(issue);
        }
    }
}

/// 將覆寫值寫入輸入結構，覆寫值永遠優先於紀錄推導的值
pub fn merge_overrides<T>(service: ServiceName, input: T, overrides: Option<&OverrideSet>) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let Some(overrides) = overrides.filter(|o| !o.is_empty()) else {
        return Ok(input);
    };

    let mut object = match serde_json::to_value(&input)? {
        Value::Object(map) => map,
        _ => {
            return Err(EngineError::ComputationError {
                service,
                message: "service input is not a field map".to_string(),
            })
        }
    };

    let mut unknown = Vec::new();
    for (name, value) in overrides.iter() {
        match object.get_mut(name) {
            Some(slot) => *slot = value.clone(),
            None => unknown.push(name.clone()),
        }
    }
    if !unknown.is_empty() {
        return Err(EngineError::UnknownOverrideField {
            service,
            fields: unknown,
        });
    }

    serde_json::from_value(Value::Object(object)).map_err(|e| EngineError::ValidationFailed {
        service,
        errors: vec![FieldIssue::new("overrides", e.to_string())],
    })
}

impl ServiceInput {
    pub fn to_json(&self) -> Result<Value> {
        let value = match self {
            ServiceInput::AiBreakdown(input) => serde_json::to_value(input)?,
            ServiceInput::Energy(input) => serde_json::to_value(input)?,
            ServiceInput::Ll97(input) => serde_json::to_value(input)?,
            ServiceInput::Financial(input) => serde_json::to_value(input)?,
            ServiceInput::Noi(input) => serde_json::to_value(input)?,
            ServiceInput::PropertyValue(input) => serde_json::to_value(input)?,
        };
        Ok(value)
    }

    /// 覆寫欄位在套用前的值，供稽核紀錄使用
    pub fn original_values(&self, overrides: &OverrideSet) -> Result<Vec<(String, Option<Value>)>> {
        let json = self.to_json()?;
        Ok(overrides
            .field_names()
            .map(|name| {
                let original = json.get(name).filter(|v| !v.is_null()).cloned();
                (name.to_string(), original)
            })
            .collect())
    }
}
