//! Threshold modulation

use super::uncertainty::{CalibrationMetrics, UncertaintyDecomposition};
use super::{AutonomyLevel, GateDirection, GateName, GovernanceMode};
use crate::config::GovernanceConfig;
use crate::types::{now, Timestamp};
use serde::Serialize;
use std::collections::BTreeMap;

/// Uncertainty factor when all uncertainty is aleatoric (or there is none)
const UNCERTAINTY_RELAXED: f64 = 0.85;
/// Slope of the factor in the epistemic ratio at zero total uncertainty
const EPISTEMIC_BASE_SLOPE: f64 = 0.25;
/// Additional slope per unit of total uncertainty
const EPISTEMIC_TOTAL_SLOPE: f64 = 0.35;

/// Calibration factor for a perfectly calibrated agent
const CALIBRATION_RELAXED: f64 = 0.98;
/// Calibration factor increase from ECE 0 to ECE 1
const CALIBRATION_SPAN: f64 = 0.40;

/// Map a unit-interval input, treating non-finite values as the maximum
fn unit_or_max(x: f64) -> f64 {
    if x.is_finite() {
        x.clamp(0.0, 1.0)
    } else {
        1.0
    }
}

/// Tightening contributed by the instruction mode
pub fn mode_factor(mode: GovernanceMode) -> f64 {
    match mode {
        GovernanceMode::Flexible => 1.0,
        GovernanceMode::Standard => 1.1,
        GovernanceMode::Strict => 1.2,
        GovernanceMode::Forbidden => 1.3,
    }
}

/// Tightening contributed by uncertainty.
///
/// `0.85 + ratio × (0.25 + 0.35 × total)`: with no epistemic share the factor
/// relaxes to 0.85 whatever the magnitude, and only the epistemic share lets
/// magnitude tighten the gate. Any non-finite component yields the maximum.
pub fn uncertainty_factor(decomposition: &UncertaintyDecomposition) -> f64 {
    let d = decomposition;
    let broken = !(d.total.is_finite() && d.epistemic.is_finite() && d.aleatoric.is_finite());
    let (total, ratio) = if broken {
        (1.0, 1.0)
    } else if d.total <= 0.0 {
        (0.0, 0.0)
    } else {
        (unit_or_max(d.total), unit_or_max(d.epistemic_ratio))
    };
    UNCERTAINTY_RELAXED + ratio * (EPISTEMIC_BASE_SLOPE + EPISTEMIC_TOTAL_SLOPE * total)
}

/// Tightening contributed by miscalibration: `0.98 + 0.40 × ece`
pub fn calibration_factor(metrics: &CalibrationMetrics) -> f64 {
    CALIBRATION_RELAXED + CALIBRATION_SPAN * unit_or_max(metrics.ece)
}

/// How one gate's threshold was derived
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GovernanceModulation {
    pub gate: GateName,
    pub direction: GateDirection,
    pub base_threshold: f64,
    pub mode_factor: f64,
    pub uncertainty_factor: f64,
    pub calibration_factor: f64,
    /// Product of the three factors; above 1 tightens
    pub tightening: f64,
    pub effective_threshold: f64,
    pub min: f64,
    pub max: f64,
    /// Vocabulary floor applied, review auto-pass only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floor: Option<f64>,
    pub mode: GovernanceMode,
    pub uncertainty: f64,
    pub autonomy_level: AutonomyLevel,
}

impl GovernanceModulation {
    /// Whether an observed value violates the effective threshold
    pub fn is_violated_by(&self, observed: f64) -> bool {
        match self.direction {
            GateDirection::LowerIsStricter => !(observed <= self.effective_threshold),
            GateDirection::HigherIsStricter => !(observed >= self.effective_threshold),
        }
    }
}

/// Effective thresholds for every gate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveThresholds {
    pub thresholds: BTreeMap<GateName, f64>,
    pub modulations: BTreeMap<GateName, GovernanceModulation>,
    pub computed_at: Timestamp,
}

impl EffectiveThresholds {
    pub fn get(&self, gate: GateName) -> Option<f64> {
        self.thresholds.get(&gate).copied()
    }

    pub fn modulation(&self, gate: GateName) -> Option<&GovernanceModulation> {
        self.modulations.get(&gate)
    }
}

/// Pure threshold computation over supplied inputs
#[derive(Debug, Clone, Default)]
pub struct GovernanceModulator {
    config: GovernanceConfig,
}

impl GovernanceModulator {
    pub fn new(config: GovernanceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GovernanceConfig {
        &self.config
    }

    /// Minimum review auto-pass threshold for an action vocabulary size.
    ///
    /// Flat at the base floor up to the reference size, then rising by the
    /// configured slope per doubling, capped.
    pub fn vocabulary_floor(&self, vocabulary_size: usize) -> f64 {
        let c = &self.config;
        let ratio = vocabulary_size as f64 / c.reference_vocabulary_size.max(1) as f64;
        if ratio <= 1.0 {
            return c.vocabulary_floor;
        }
        (c.vocabulary_floor + c.vocabulary_floor_slope * ratio.log2()).min(c.vocabulary_floor_cap)
    }

    /// Modulate one gate
    pub fn modulate(
        &self,
        gate: GateName,
        mode: GovernanceMode,
        uncertainty: &UncertaintyDecomposition,
        calibration: &CalibrationMetrics,
        vocabulary_size: Option<usize>,
    ) -> GovernanceModulation {
        let spec = self.config.gates.get(gate);
        let mf = mode_factor(mode);
        let uf = uncertainty_factor(uncertainty);
        let cf = calibration_factor(calibration);
        let tightening = mf * uf * cf;

        let raw = match gate.direction() {
            GateDirection::LowerIsStricter => spec.base / tightening,
            GateDirection::HigherIsStricter => spec.base * tightening,
        };
        let mut effective = raw.clamp(spec.min, spec.max);

        let floor = match (gate, vocabulary_size) {
            (GateName::ReviewAutoPass, Some(size)) => {
                let floor = self.vocabulary_floor(size).min(spec.max);
                effective = effective.max(floor);
                Some(floor)
            }
            _ => None,
        };

        GovernanceModulation {
            gate,
            direction: gate.direction(),
            base_threshold: spec.base,
            mode_factor: mf,
            uncertainty_factor: uf,
            calibration_factor: cf,
            tightening,
            effective_threshold: effective,
            min: spec.min,
            max: spec.max,
            floor,
            mode,
            uncertainty: uncertainty.total,
            autonomy_level: AutonomyLevel::from_tightening(tightening),
        }
    }

    /// Modulate every gate
    pub fn compute_thresholds(
        &self,
        mode: GovernanceMode,
        uncertainty: &UncertaintyDecomposition,
        calibration: &CalibrationMetrics,
        vocabulary_size: Option<usize>,
    ) -> EffectiveThresholds {
        let modulations: BTreeMap<GateName, GovernanceModulation> = GateName::ALL
            .into_iter()
            .map(|gate| {
                (
                    gate,
                    self.modulate(gate, mode, uncertainty, calibration, vocabulary_size),
                )
            })
            .collect();
        let thresholds = modulations
            .iter()
            .map(|(gate, m)| (*gate, m.effective_threshold))
            .collect();

        tracing::debug!(
            %mode,
            uncertainty = uncertainty.total,
            ece = calibration.ece,
            "computed effective thresholds"
        );

        EffectiveThresholds {
            thresholds,
            modulations,
            computed_at: now(),
        }
    }
}
