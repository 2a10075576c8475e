use crate::domain::validation::FieldIssue;
use crate::utils::error::{EngineError, Result};

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(EngineError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(EngineError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    // 環境變數未設定時 ${VAR} 會原樣留下
    if path.contains("${") {
        return Err(EngineError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains an unresolved environment variable".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(EngineError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(EngineError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_one_of(field_name: &str, value: &str, allowed: &[&str]) -> Result<()> {
    if !allowed.contains(&value) {
        return Err(EngineError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Expected one of: {}", allowed.join(", ")),
        });
    }
    Ok(())
}

// 以下為計算輸入用的欄位檢查，回傳 FieldIssue 而非錯誤，由呼叫端決定是否阻擋

pub fn check_range(field_name: &str, value: f64, min: f64, max: f64) -> Option<FieldIssue> {
    if !value.is_finite() || value < min || value > max {
        return Some(FieldIssue::new(
            field_name,
            format!("must be between {} and {} (got {})", min, max, value),
        ));
    }
    None
}

pub fn check_non_negative(field_name: &str, value: f64) -> Option<FieldIssue> {
    if !value.is_finite() || value < 0.0 {
        return Some(FieldIssue::new(
            field_name,
            format!("must be a non-negative number (got {})", value),
        ));
    }
    None
}

pub fn check_positive(field_name: &str, value: f64) -> Option<FieldIssue> {
    if !value.is_finite() || value <= 0.0 {
        return Some(FieldIssue::new(
            field_name,
            format!("must be greater than zero (got {})", value),
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_path() {
        assert!(validate_path("store.path", "./data/calculations").is_ok());
        assert!(validate_path("store.path", "").is_err());
        assert!(matches!(
            validate_path("store.path", "${RETROFIT_DATA_DIR}/records"),
            Err(EngineError::InvalidConfigValueError { reason, .. }) if reason.contains("unresolved")
        ));
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("service_timeout_ms", 5, 1).is_ok());
        assert!(validate_positive_number("service_timeout_ms", 0, 1).is_err());
    }

    #[test]
    fn test_validate_one_of() {
        assert!(validate_one_of("store.kind", "file", &["file", "memory"]).is_ok());
        assert!(validate_one_of("store.kind", "redis", &["file", "memory"]).is_err());
    }

    #[test]
    fn test_check_range() {
        assert!(check_range("capRate", 0.05, 0.0, 1.0).is_none());
        assert!(check_range("capRate", 1.5, 0.0, 1.0).is_some());
        assert!(check_range("capRate", f64::NAN, 0.0, 1.0).is_some());
    }

    #[test]
    fn test_check_positive_and_non_negative() {
        assert!(check_positive("grossFloorAreaSqft", 0.0).is_some());
        assert!(check_non_negative("incentivePerUnit", 0.0).is_none());
        assert!(check_non_negative("incentivePerUnit", -1.0).is_some());
    }
}
