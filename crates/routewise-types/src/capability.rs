//! Provider capabilities and per-request capability requirements.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A feature a provider may declare and a request may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityType {
    Streaming,
    FunctionCalling,
    Vision,
    Embeddings,
    CodeGeneration,
    Reasoning,
    Multimodal,
    BatchProcessing,
}

impl CapabilityType {
    /// Every known capability, in declaration order.
    pub const ALL: [CapabilityType; 8] = [
        CapabilityType::Streaming,
        CapabilityType::FunctionCalling,
        CapabilityType::Vision,
        CapabilityType::Embeddings,
        CapabilityType::CodeGeneration,
        CapabilityType::Reasoning,
        CapabilityType::Multimodal,
        CapabilityType::BatchProcessing,
    ];

    /// Stable wire name used for config files and statistics.
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityType::Streaming => "streaming",
            CapabilityType::FunctionCalling => "function_calling",
            CapabilityType::Vision => "vision",
            CapabilityType::Embeddings => "embeddings",
            CapabilityType::CodeGeneration => "code_generation",
            CapabilityType::Reasoning => "reasoning",
            CapabilityType::Multimodal => "multimodal",
            CapabilityType::BatchProcessing => "batch_processing",
        }
    }
}

impl fmt::Display for CapabilityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CapabilityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        CapabilityType::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| format!("invalid capability: '{s}'"))
    }
}

/// Capabilities a single request needs.
///
/// `fallback_acceptable` holds the capabilities that have already been
/// relaxed away from `required` by the degradation planner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityRequirement {
    #[serde(default)]
    pub required: BTreeSet<CapabilityType>,
    #[serde(default)]
    pub preferred: BTreeSet<CapabilityType>,
    #[serde(default)]
    pub fallback_acceptable: BTreeSet<CapabilityType>,
}

impl CapabilityRequirement {
    /// A requirement with only hard requirements set.
    pub fn requiring(required: impl IntoIterator<Item = CapabilityType>) -> Self {
        Self {
            required: required.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Add soft preferences used only for scoring.
    pub fn with_preferred(mut self, preferred: impl IntoIterator<Item = CapabilityType>) -> Self {
        self.preferred.extend(preferred);
        self
    }

    /// Derive a relaxed copy with `capability` moved from `required` to
    /// `fallback_acceptable`.
    pub fn relax(&self, capability: CapabilityType) -> Self {
        let mut relaxed = self.clone();
        if relaxed.required.remove(&capability) {
            relaxed.fallback_acceptable.insert(capability);
        }
        relaxed
    }

    /// Whether a provider declaring `capabilities` satisfies every hard requirement.
    pub fn is_satisfied_by(&self, capabilities: &BTreeSet<CapabilityType>) -> bool {
        self.required.is_subset(capabilities)
    }
}

/// Outcome of a capability degradation attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityFallbackResult {
    pub success: bool,
    pub original_capabilities: BTreeSet<CapabilityType>,
    pub achieved_capabilities: BTreeSet<CapabilityType>,
    pub degraded_capabilities: BTreeSet<CapabilityType>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub fallback_reason: Option<String>,
}
