use crate::core::cascade::ExecutorOptions;
use crate::utils::error::{EngineError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_one_of, validate_path, validate_positive_number, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const STORE_KINDS: [&str; 2] = ["file", "memory"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSection {
    #[serde(default = "default_service_timeout_ms")]
    pub service_timeout_ms: u64,
    #[serde(default = "default_actor")]
    pub default_actor: String,
    #[serde(default = "default_true")]
    pub record_override_audit: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_kind")]
    pub kind: String,
    #[serde(default = "default_store_path")]
    pub path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
    #[serde(default)]
    pub json: bool,
}

fn default_service_timeout_ms() -> u64 {
    5_000
}

fn default_actor() -> String {
    "system".to_string()
}

fn default_true() -> bool {
    true
}

fn default_store_kind() -> String {
    "file".to_string()
}

fn default_store_path() -> String {
    "./data/calculations".to_string()
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            service_timeout_ms: default_service_timeout_ms(),
            default_actor: default_actor(),
            record_override_audit: true,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: default_store_kind(),
            path: default_store_path(),
        }
    }
}

impl EngineConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EngineError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EngineError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${RETROFIT_DATA_DIR})，未設定的變數原樣保留，由 validate 拒絕
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EngineError::ConfigValidationError {
            field: "environment".to_string(),
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn is_memory_store(&self) -> bool {
        self.store.kind == "memory"
    }

    pub fn service_timeout(&self) -> Duration {
        Duration::from_millis(self.engine.service_timeout_ms)
    }

    pub fn executor_options(&self) -> ExecutorOptions {
        ExecutorOptions {
            service_timeout: self.service_timeout(),
            default_actor: self.engine.default_actor.clone(),
            record_override_audit: self.engine.record_override_audit,
        }
    }
}

impl Validate for EngineConfig {
    fn validate(&self) -> Result<()> {
        validate_positive_number("engine.service_timeout_ms", self.engine.service_timeout_ms, 1)?;
        validate_non_empty_string("engine.default_actor", &self.engine.default_actor)?;
        validate_one_of("store.kind", &self.store.kind, &STORE_KINDS)?;
        if !self.is_memory_store() {
            validate_path("store.path", &self.store.path)?;
        }
        if let Some(level) = &self.logging.level {
            validate_one_of(
                "logging.level",
                level,
                &["trace", "debug", "info", "warn", "error"],
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_from_empty_document() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config.engine.service_timeout_ms, 5_000);
        assert_eq!(config.engine.default_actor, "system");
        assert!(config.engine.record_override_audit);
        assert_eq!(config.store.kind, "file");
        assert_eq!(config.store.path, "./data/calculations");
        assert!(!config.logging.json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[engine]
service_timeout_ms = 250
default_actor = "analyst"
record_override_audit = false

[store]
kind = "memory"

[logging]
level = "debug"
json = true
"#;

        let config = EngineConfig::from_toml_str(toml_content).unwrap();
        assert!(config.is_memory_store());
        let options = config.executor_options();
        assert_eq!(options.service_timeout, Duration::from_millis(250));
        assert_eq!(options.default_actor, "analyst");
        assert!(!options.record_override_audit);
        assert!(config.logging.json);
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("RETROFIT_TEST_STORE_PATH", "/tmp/retrofit-records");

        let toml_content = r#"
[store]
kind = "file"
path = "${RETROFIT_TEST_STORE_PATH}"
"#;

        let config = EngineConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.store.path, "/tmp/retrofit-records");

        std::env::remove_var("RETROFIT_TEST_STORE_PATH");
    }

    #[test]
    fn test_config_validation() {
        let config = EngineConfig::from_toml_str("[engine]\nservice_timeout_ms = 0\n").unwrap();
        assert!(config.validate().is_err());

        let config = EngineConfig::from_toml_str("[store]\nkind = \"redis\"\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfigValueError { .. })
        ));

        let config = EngineConfig::from_toml_str("[engine]\ndefault_actor = \"  \"\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unset_env_var_in_store_path_fails_validation() {
        std::env::remove_var("RETROFIT_UNSET_STORE_DIR");

        let toml_content = r#"
[store]
kind = "file"
path = "${RETROFIT_UNSET_STORE_DIR}"
"#;

        let config = EngineConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.store.path, "${RETROFIT_UNSET_STORE_DIR}");
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfigValueError { field, .. }) if field == "store.path"
        ));

        // memory store 不使用路徑
        let memory = EngineConfig::from_toml_str(
            "[store]\nkind = \"memory\"\npath = \"${RETROFIT_UNSET_STORE_DIR}\"\n",
        )
        .unwrap();
        assert!(memory.validate().is_ok());
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            EngineConfig::from_toml_str("[engine\n"),
            Err(EngineError::ConfigValidationError { .. })
        ));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[engine]\ndefault_actor = \"file-test\"\n")
            .unwrap();

        let config = EngineConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.engine.default_actor, "file-test");
    }
}
