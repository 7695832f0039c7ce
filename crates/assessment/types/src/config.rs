//! Engine configuration.
//!
//! The governance-area catalog is configuration, not business logic: the
//! observed domain runs six areas, but nothing in the state machine assumes
//! a count.

use crate::AreaId;
use serde::{Deserialize, Serialize};

/// Which rework guard applies. Source workflow documents disagree on the
/// scope of the rework limit, so both flags are tracked on the aggregate
/// and this policy selects the one that gates requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReworkPolicy {
    /// One rework round per assessment, regardless of which area opens it.
    #[default]
    GlobalSingleRound,
    /// One rework round per governance area.
    PerAreaSingleRound,
}

/// Workflow engine configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Governance areas every assessment in the cycle is reviewed against.
    pub governance_areas: Vec<AreaId>,
    #[serde(default)]
    pub rework_policy: ReworkPolicy,
    /// Maximum final-approver re-calibration rounds per assessment.
    #[serde(default = "default_recalibration_limit")]
    pub recalibration_limit: u32,
}

fn default_recalibration_limit() -> u32 {
    1
}

impl EngineConfig {
    pub fn new(governance_areas: Vec<AreaId>) -> Self {
        Self {
            governance_areas,
            rework_policy: ReworkPolicy::default(),
            recalibration_limit: default_recalibration_limit(),
        }
    }

    pub fn with_rework_policy(mut self, policy: ReworkPolicy) -> Self {
        self.rework_policy = policy;
        self
    }

    pub fn with_recalibration_limit(mut self, limit: u32) -> Self {
        self.recalibration_limit = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::new(vec![AreaId::new("area-1")]);
        assert_eq!(config.rework_policy, ReworkPolicy::GlobalSingleRound);
        assert_eq!(config.recalibration_limit, 1);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "governance_areas": ["a", "b"] }"#).unwrap();
        assert_eq!(config.governance_areas.len(), 2);
        assert_eq!(config.rework_policy, ReworkPolicy::GlobalSingleRound);
        assert_eq!(config.recalibration_limit, 1);
    }
}
