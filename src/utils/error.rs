use crate::domain::service_name::ServiceName;
use crate::domain::validation::FieldIssue;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unknown service: '{0}'")]
    UnknownService(String),

    #[error("Dependency graph cycle detected at service '{service}'")]
    GraphCycleDetected { service: String },

    #[error("Service '{service}' requires output of '{dependency}', which has never been calculated")]
    MissingRequiredUpstreamData {
        service: ServiceName,
        dependency: ServiceName,
    },

    #[error("Service '{service}' does not accept override field(s): {}", fields.join(", "))]
    UnknownOverrideField {
        service: ServiceName,
        fields: Vec<String>,
    },

    #[error("Validation failed for '{service}': {}", format_issues(errors))]
    ValidationFailed {
        service: ServiceName,
        errors: Vec<FieldIssue>,
    },

    #[error("Computation error in '{service}': {message}")]
    ComputationError { service: ServiceName, message: String },

    #[error("Service '{service}' exceeded its {timeout_ms}ms time budget")]
    ServiceTimeout { service: ServiceName, timeout_ms: u64 },

    #[error("Write conflict on calculation '{calculation_id}': expected revision {expected}, found {actual}")]
    Conflict {
        calculation_id: String,
        expected: u64,
        actual: u64,
    },

    #[error("Calculation '{0}' not found")]
    NotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

fn format_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(|issue| issue.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Request,
    Input,
    Dependency,
    Execution,
    Storage,
    Configuration,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EngineError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EngineError::UnknownService(_) => ErrorCategory::Request,
            EngineError::UnknownOverrideField { .. } | EngineError::ValidationFailed { .. } => {
                ErrorCategory::Input
            }
            EngineError::MissingRequiredUpstreamData { .. } => ErrorCategory::Dependency,
            EngineError::ComputationError { .. } | EngineError::ServiceTimeout { .. } => {
                ErrorCategory::Execution
            }
            EngineError::Conflict { .. }
            | EngineError::NotFound(_)
            | EngineError::IoError(_)
            | EngineError::SerializationError(_) => ErrorCategory::Storage,
            EngineError::ConfigValidationError { .. }
            | EngineError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            EngineError::GraphCycleDetected { .. } => ErrorCategory::Internal,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Request | ErrorCategory::Input | ErrorCategory::Dependency => {
                ErrorSeverity::Medium
            }
            ErrorCategory::Execution | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Storage => match self {
                EngineError::Conflict { .. } => ErrorSeverity::Medium,
                _ => ErrorSeverity::High,
            },
            ErrorCategory::Internal => ErrorSeverity::Critical,
        }
    }

    /// 錯誤發生時是否未對紀錄造成任何修改
    pub fn is_pre_execution(&self) -> bool {
        matches!(
            self,
            EngineError::UnknownService(_)
                | EngineError::GraphCycleDetected { .. }
                | EngineError::MissingRequiredUpstreamData { .. }
                | EngineError::UnknownOverrideField { .. }
                | EngineError::ValidationFailed { .. }
        )
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            EngineError::UnknownService(_) => format!(
                "Use one of: {}",
                ServiceName::ALL
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            EngineError::GraphCycleDetected { .. } => {
                "The static service graph is inconsistent; this is a build defect".to_string()
            }
            EngineError::MissingRequiredUpstreamData { dependency, .. } => {
                format!("Run '{}' first, or run with cascade from an upstream service", dependency)
            }
            EngineError::UnknownOverrideField { service, .. } => {
                format!("Check the override field names accepted by '{}'", service)
            }
            EngineError::ValidationFailed { .. } => {
                "Correct the listed fields and resubmit".to_string()
            }
            EngineError::ComputationError { .. } => {
                "Review the inputs for values that make the calculation undefined".to_string()
            }
            EngineError::ServiceTimeout { .. } => {
                "Increase engine.service_timeout_ms or retry the request".to_string()
            }
            EngineError::Conflict { .. } => {
                "Another writer updated this calculation; reload and retry".to_string()
            }
            EngineError::NotFound(_) => "Create the calculation with `init` first".to_string(),
            EngineError::IoError(_) => "Check store path permissions and disk space".to_string(),
            EngineError::SerializationError(_) => {
                "The stored record is malformed; inspect or recreate it".to_string()
            }
            EngineError::ConfigValidationError { .. }
            | EngineError::InvalidConfigValueError { .. } => {
                "Fix the configuration file and try again".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Request => format!("Invalid request: {}", self),
            ErrorCategory::Input => format!("Input rejected, nothing was changed: {}", self),
            ErrorCategory::Dependency => format!("Missing upstream results: {}", self),
            ErrorCategory::Execution => format!("Calculation failed: {}", self),
            ErrorCategory::Storage => format!("Storage problem: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Internal => format!("Internal error: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_failures_are_pre_execution() {
        let err = EngineError::ValidationFailed {
            service: ServiceName::Financial,
            errors: vec![FieldIssue::new("interestRate", "must be between 0 and 1")],
        };
        assert!(err.is_pre_execution());
        assert_eq!(err.category(), ErrorCategory::Input);
        assert!(err.to_string().contains("interestRate"));
    }

    #[test]
    fn test_timeout_is_execution_error() {
        let err = EngineError::ServiceTimeout {
            service: ServiceName::Energy,
            timeout_ms: 10,
        };
        assert!(!err.is_pre_execution());
        assert_eq!(err.severity(), ErrorSeverity::High);
    }

    #[test]
    fn test_conflict_severity() {
        let err = EngineError::Conflict {
            calculation_id: "calc-1".to_string(),
            expected: 1,
            actual: 2,
        };
        assert_eq!(err.category(), ErrorCategory::Storage);
        assert_eq!(err.severity(), ErrorSeverity::Medium);
    }
}
