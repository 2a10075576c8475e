use crate::utils::error::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 六個計算服務的封閉集合
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ServiceName {
    #[serde(rename = "ai-breakdown")]
    AiBreakdown,
    #[serde(rename = "energy")]
    Energy,
    #[serde(rename = "ll97")]
    Ll97,
    #[serde(rename = "financial")]
    Financial,
    #[serde(rename = "noi")]
    Noi,
    #[serde(rename = "property-value")]
    PropertyValue,
}

impl ServiceName {
    pub const ALL: [ServiceName; 6] = [
        ServiceName::AiBreakdown,
        ServiceName::Energy,
        ServiceName::Ll97,
        ServiceName::Financial,
        ServiceName::Noi,
        ServiceName::PropertyValue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceName::AiBreakdown => "ai-breakdown",
            ServiceName::Energy => "energy",
            ServiceName::Ll97 => "ll97",
            ServiceName::Financial => "financial",
            ServiceName::Noi => "noi",
            ServiceName::PropertyValue => "property-value",
        }
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 大小寫敏感的精確比對
impl FromStr for ServiceName {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServiceName::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| EngineError::UnknownService(s.to_string()))
    }
}
