//! Governance Modulator
//!
//! Computes how strict each named approval gate should be, given the
//! instruction mode and the issuing agent's uncertainty and calibration.
//!
//! ```text
//!   mode ─────────► mode_factor ────────┐
//!   uncertainty ──► uncertainty_factor ─┼─► T = product ──► base / T  (lower is stricter)
//!   calibration ──► calibration_factor ─┘                   base × T  (higher is stricter)
//!                                                               │
//!                                                        clamp [min, max]
//!                                                               │
//!   ImmutableFloor (checked first, independently) ──► make_gate_decision ──► allow │ hold │ block
//! ```
//!
//! A larger T always makes a gate stricter, whatever its polarity. Epistemic
//! uncertainty raises T; aleatoric uncertainty lowers it. The immutable floor
//! can only hold or block and no factor can loosen it.

pub mod decision;
pub mod immutable;
pub mod modulator;
pub mod uncertainty;

pub use decision::{decide, make_gate_decision, GateAction, GateDecision};
pub use immutable::{
    FloorAction, ImmutableCheckInput, ImmutableCheckResult, ImmutableConstraint, ImmutableFloor,
    ImmutableViolation, SensitiveDataScanner, SensitiveKind, SensitiveMatch,
};
pub use modulator::{
    calibration_factor, mode_factor, uncertainty_factor, EffectiveThresholds,
    GovernanceModulation, GovernanceModulator,
};
pub use uncertainty::{CalibrationBucket, CalibrationMetrics, UncertaintyDecomposition};

use crate::ontology::names;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of a threshold is the strict side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateDirection {
    /// Observed values must stay at or below the threshold; tightening lowers it
    LowerIsStricter,
    /// Observed values must reach the threshold; tightening raises it
    HigherIsStricter,
}

/// Named governance gates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateName {
    DriftThreshold,
    ConformanceDeviation,
    SayDoGap,
    ReviewAutoPass,
    KnowledgePromotion,
    ThreatActivation,
}

impl GateName {
    pub const ALL: [GateName; 6] = [
        GateName::DriftThreshold,
        GateName::ConformanceDeviation,
        GateName::SayDoGap,
        GateName::ReviewAutoPass,
        GateName::KnowledgePromotion,
        GateName::ThreatActivation,
    ];

    pub fn direction(self) -> GateDirection {
        match self {
            GateName::DriftThreshold | GateName::ConformanceDeviation | GateName::SayDoGap => {
                GateDirection::LowerIsStricter
            }
            GateName::ReviewAutoPass | GateName::KnowledgePromotion | GateName::ThreatActivation => {
                GateDirection::HigherIsStricter
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GateName::DriftThreshold => "drift_threshold",
            GateName::ConformanceDeviation => "conformance_deviation",
            GateName::SayDoGap => "say_do_gap",
            GateName::ReviewAutoPass => "review_auto_pass",
            GateName::KnowledgePromotion => "knowledge_promotion",
            GateName::ThreatActivation => "threat_activation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.as_str() == s)
    }
}

impl fmt::Display for GateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Governance strictness, ordered from least to most strict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GovernanceMode {
    Flexible,
    Standard,
    Strict,
    Forbidden,
}

impl GovernanceMode {
    /// Map a frame mode's canonical name. Unknown modes govern as standard.
    pub fn from_frame_mode(name: &str) -> Self {
        match name {
            names::STRICT => GovernanceMode::Strict,
            names::FLEXIBLE => GovernanceMode::Flexible,
            names::FORBIDDEN => GovernanceMode::Forbidden,
            _ => GovernanceMode::Standard,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "flexible" => Some(GovernanceMode::Flexible),
            "standard" | "neutral" => Some(GovernanceMode::Standard),
            "strict" => Some(GovernanceMode::Strict),
            "forbidden" => Some(GovernanceMode::Forbidden),
            _ => None,
        }
    }
}

impl fmt::Display for GovernanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GovernanceMode::Flexible => "flexible",
            GovernanceMode::Standard => "standard",
            GovernanceMode::Strict => "strict",
            GovernanceMode::Forbidden => "forbidden",
        };
        f.write_str(s)
    }
}

/// How much latitude the combined tightening factor leaves the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutonomyLevel {
    Supervised,
    Guided,
    Autonomous,
}

impl AutonomyLevel {
    pub fn from_tightening(t: f64) -> Self {
        if t >= 1.2 {
            AutonomyLevel::Supervised
        } else if t > 0.95 {
            AutonomyLevel::Guided
        } else {
            AutonomyLevel::Autonomous
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_directions() {
        assert_eq!(GateName::DriftThreshold.direction(), GateDirection::LowerIsStricter);
        assert_eq!(GateName::SayDoGap.direction(), GateDirection::LowerIsStricter);
        assert_eq!(GateName::ReviewAutoPass.direction(), GateDirection::HigherIsStricter);
        assert_eq!(GateName::ThreatActivation.direction(), GateDirection::HigherIsStricter);
    }

    #[test]
    fn test_gate_name_parse_roundtrip() {
        for gate in GateName::ALL {
            assert_eq!(GateName::parse(gate.as_str()), Some(gate));
        }
        assert_eq!(GateName::parse("nope"), None);
    }

    #[test]
    fn test_mode_mapping() {
        assert_eq!(GovernanceMode::from_frame_mode("strict"), GovernanceMode::Strict);
        assert_eq!(GovernanceMode::from_frame_mode("neutral"), GovernanceMode::Standard);
        assert_eq!(GovernanceMode::from_frame_mode("forbidden"), GovernanceMode::Forbidden);
        assert!(GovernanceMode::Forbidden > GovernanceMode::Strict);
    }

    #[test]
    fn test_autonomy_levels() {
        assert_eq!(AutonomyLevel::from_tightening(0.85), AutonomyLevel::Autonomous);
        assert_eq!(AutonomyLevel::from_tightening(1.1), AutonomyLevel::Guided);
        assert_eq!(AutonomyLevel::from_tightening(1.5), AutonomyLevel::Supervised);
    }
}
