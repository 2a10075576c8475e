use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// 驗證結果：errors 阻擋執行，warnings 僅回報給呼叫端
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<FieldIssue>,
    pub warnings: Vec<FieldIssue>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldIssue::new(field, message));
        self.valid = false;
    }

    pub fn warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(FieldIssue::new(field, message));
    }

    /// 將 `check_*` 系列函式的結果併入錯誤清單
    pub fn check(&mut self, issue: Option<FieldIssue>) {
        if let Some(issue) = issue {
            self.errors.push(issue);
            self.valid = false;
        }
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.valid = self.valid && other.valid;
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

/// 可覆寫欄位的檢查規則
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverrideRule {
    /// 非負整數
    Count,
    NonNegative,
    Positive,
    /// 介於 0 與 1 之間
    Rate,
    Range { min: f64, max: f64 },
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverrideField {
    pub name: &'static str,
    pub rule: OverrideRule,
}

impl OverrideField {
    pub const fn new(name: &'static str, rule: OverrideRule) -> Self {
        Self { name, rule }
    }
}
