//! Selection controller inputs and outputs.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::capability::CapabilityType;

/// Which step of the selection procedure produced the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPath {
    UserPreference,
    SystemDefault,
    HardFallback,
    DegradedMode,
    HelperModelRouting,
}

impl SelectionPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionPath::UserPreference => "user_preference",
            SelectionPath::SystemDefault => "system_default",
            SelectionPath::HardFallback => "hard_fallback",
            SelectionPath::DegradedMode => "degraded_mode",
            SelectionPath::HelperModelRouting => "helper_model_routing",
        }
    }
}

impl fmt::Display for SelectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelectionPath {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user_preference" => Ok(SelectionPath::UserPreference),
            "system_default" => Ok(SelectionPath::SystemDefault),
            "hard_fallback" => Ok(SelectionPath::HardFallback),
            "degraded_mode" => Ok(SelectionPath::DegradedMode),
            "helper_model_routing" => Ok(SelectionPath::HelperModelRouting),
            other => Err(format!("invalid selection path: '{other}'")),
        }
    }
}

/// Raw provider/model preference as supplied by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreference {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl UserPreference {
    pub fn provider(name: impl Into<String>) -> Self {
        Self {
            provider: Some(name.into()),
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Auditable outcome of the selection controller.
///
/// `provider == None` means every step missed and the caller must enter
/// degraded mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub rationale: String,
    pub selection_path: SelectionPath,
    pub fallback_attempts: u32,
    pub health_checks_performed: u32,
    pub total_selection_time_ms: f64,
    /// Capabilities relaxed away to reach this provider.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub degraded_capabilities: BTreeSet<CapabilityType>,
}

impl SelectionResult {
    pub fn is_degraded_mode(&self) -> bool {
        self.provider.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_path_roundtrip() {
        for path in [
            SelectionPath::UserPreference,
            SelectionPath::SystemDefault,
            SelectionPath::HardFallback,
            SelectionPath::DegradedMode,
            SelectionPath::HelperModelRouting,
        ] {
            let parsed: SelectionPath = path.to_string().parse().unwrap();
            assert_eq!(path, parsed);
            let json = serde_json::to_string(&path).unwrap();
            assert_eq!(json, format!("\"{}\"", path.as_str()));
        }
    }

    #[test]
    fn test_degraded_mode_sentinel() {
        let result = SelectionResult {
            provider: None,
            model: None,
            rationale: "nothing left".to_string(),
            selection_path: SelectionPath::DegradedMode,
            fallback_attempts: 4,
            health_checks_performed: 4,
            total_selection_time_ms: 0.1,
            degraded_capabilities: BTreeSet::new(),
        };
        assert!(result.is_degraded_mode());
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("degraded_capabilities").is_none());
    }
}
