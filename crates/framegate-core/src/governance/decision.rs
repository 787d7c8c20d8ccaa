//! Gate decisions

use super::immutable::{FloorAction, ImmutableCheckResult, ImmutableConstraint};
use super::modulator::GovernanceModulation;
use super::GateName;
use crate::types::{now, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateAction {
    Allow,
    Hold,
    Block,
}

impl From<FloorAction> for GateAction {
    fn from(action: FloorAction) -> Self {
        match action {
            FloorAction::Hold => GateAction::Hold,
            FloorAction::Block => GateAction::Block,
        }
    }
}

/// Outcome of one gate evaluation. Every decision carries a fresh audit id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateDecision {
    pub gate: GateName,
    pub action: GateAction,
    pub reason: String,
    pub immutable_triggered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub immutable_constraint: Option<ImmutableConstraint>,
    pub threshold: f64,
    pub observed_value: f64,
    pub audit_id: Uuid,
    pub decided_at: Timestamp,
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        self.action == GateAction::Allow
    }
}

fn threshold_outcome(observed: f64, modulation: &GovernanceModulation) -> (GateAction, String) {
    if modulation.is_violated_by(observed) {
        (
            GateAction::Hold,
            format!(
                "observed {observed} violates effective threshold {:.4} ({:?})",
                modulation.effective_threshold, modulation.direction
            ),
        )
    } else {
        (
            GateAction::Allow,
            format!(
                "observed {observed} within effective threshold {:.4}",
                modulation.effective_threshold
            ),
        )
    }
}

fn build(
    gate: GateName,
    action: GateAction,
    reason: String,
    constraint: Option<ImmutableConstraint>,
    immutable_triggered: bool,
    observed_value: f64,
    modulation: &GovernanceModulation,
) -> GateDecision {
    GateDecision {
        gate,
        action,
        reason,
        immutable_triggered,
        immutable_constraint: constraint,
        threshold: modulation.effective_threshold,
        observed_value,
        audit_id: Uuid::new_v4(),
        decided_at: now(),
    }
}

/// Decide from a bare immutable verdict. A failed floor always blocks.
pub fn make_gate_decision(
    gate: GateName,
    observed_value: f64,
    modulation: &GovernanceModulation,
    immutable_passed: bool,
) -> GateDecision {
    if !immutable_passed {
        return build(
            gate,
            GateAction::Block,
            "immutable constraint violated".to_string(),
            None,
            true,
            observed_value,
            modulation,
        );
    }
    let (action, reason) = threshold_outcome(observed_value, modulation);
    build(gate, action, reason, None, false, observed_value, modulation)
}

/// Decide from a full immutable check, honouring the violated constraint's
/// own hold or block action.
pub fn decide(
    gate: GateName,
    observed_value: f64,
    modulation: &GovernanceModulation,
    immutable: &ImmutableCheckResult,
) -> GateDecision {
    match &immutable.violation {
        Some(v) => build(
            gate,
            v.action.into(),
            format!("{}: {}", v.constraint.id(), v.message),
            Some(v.constraint),
            true,
            observed_value,
            modulation,
        ),
        None if !immutable.passed => {
            make_gate_decision(gate, observed_value, modulation, false)
        }
        None => make_gate_decision(gate, observed_value, modulation, true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governance::{
        CalibrationMetrics, GovernanceMode, GovernanceModulator, ImmutableCheckInput,
        ImmutableFloor, UncertaintyDecomposition,
    };

    fn modulation(gate: GateName, mode: GovernanceMode) -> GovernanceModulation {
        GovernanceModulator::default().modulate(
            gate,
            mode,
            &UncertaintyDecomposition::zero(),
            &CalibrationMetrics::from_ece(0.0),
            None,
        )
    }

    #[test]
    fn test_allow_and_hold() {
        let m = modulation(GateName::DriftThreshold, GovernanceMode::Standard);
        let ok = make_gate_decision(GateName::DriftThreshold, 0.05, &m, true);
        assert_eq!(ok.action, GateAction::Allow);
        assert!(!ok.immutable_triggered);

        let held = make_gate_decision(GateName::DriftThreshold, 0.49, &m, true);
        assert_eq!(held.action, GateAction::Hold);
        assert_eq!(held.threshold, m.effective_threshold);
    }

    #[test]
    fn test_immutable_failure_blocks_ideal_value() {
        let m = modulation(GateName::DriftThreshold, GovernanceMode::Forbidden);
        let d = make_gate_decision(GateName::DriftThreshold, 0.001, &m, false);
        assert_eq!(d.action, GateAction::Block);
        assert!(d.immutable_triggered);
    }

    #[test]
    fn test_audit_ids_are_fresh() {
        let m = modulation(GateName::SayDoGap, GovernanceMode::Standard);
        let a = make_gate_decision(GateName::SayDoGap, 0.1, &m, true);
        let b = make_gate_decision(GateName::SayDoGap, 0.1, &m, true);
        assert_ne!(a.audit_id, b.audit_id);
    }

    #[test]
    fn test_decide_keeps_hold_action() {
        let m = modulation(GateName::ReviewAutoPass, GovernanceMode::Standard);
        let floor = ImmutableFloor::default();
        let check = floor.check(&ImmutableCheckInput::new(GovernanceMode::Standard).with_conflict(0.9));
        let d = decide(GateName::ReviewAutoPass, 0.99, &m, &check);
        assert_eq!(d.action, GateAction::Hold);
        assert!(d.immutable_triggered);
        assert_eq!(d.immutable_constraint, Some(ImmutableConstraint::ConflictCoefficient));
    }

    #[test]
    fn test_nan_observation_holds() {
        let m = modulation(GateName::ThreatActivation, GovernanceMode::Flexible);
        let d = make_gate_decision(GateName::ThreatActivation, f64::NAN, &m, true);
        assert_eq!(d.action, GateAction::Hold);
    }
}
