//! Engine configuration
//!
//! Every section has defaults, so an empty TOML document is a valid
//! configuration. [`EngineConfig::validate`] runs at engine construction;
//! invalid values fail fast there rather than at request time.

use crate::error::{ConfigError, FrameGateError, Result, ResultExt};
use crate::governance::GateName;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Frame validator settings
    pub validator: ValidatorConfig,

    /// Baseline store and drift scoring
    pub baseline: BaselineConfig,

    /// Per-agent circuit breaker
    pub circuit_breaker: CircuitBreakerConfig,

    /// Governance gates and modulation
    pub governance: GovernanceConfig,

    /// Immutable safety floor
    pub immutable: ImmutableConfig,

    /// Tripwire probes
    pub tripwire: TripwireConfig,

    /// In-memory audit log
    pub audit: AuditConfig,
}

impl EngineConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the consecutive-failure threshold of the circuit breaker
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.circuit_breaker.failure_threshold = threshold;
        self
    }

    /// Set the drift score that forces a circuit open
    pub fn with_critical_drift(mut self, threshold: f64) -> Self {
        self.circuit_breaker.critical_drift_threshold = threshold;
        self
    }

    /// Set the minimum number of symbols per frame
    pub fn with_min_symbols(mut self, min: usize) -> Self {
        self.validator.min_symbols = min;
        self
    }

    /// Set the per-agent baseline retention
    pub fn with_max_records(mut self, max: usize) -> Self {
        self.baseline.max_records_per_agent = max;
        self
    }

    /// Parse from TOML
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(FrameGateError::from)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Serialize to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// Check every value is usable
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.validator.min_symbols == 0 {
            return Err(zero("validator.min_symbols"));
        }

        let b = &self.baseline;
        if b.max_records_per_agent == 0 {
            return Err(zero("baseline.max_records_per_agent"));
        }
        unit("baseline.frame_weight", b.frame_weight)?;
        unit("baseline.interpretation_weight", b.interpretation_weight)?;
        unit("baseline.behavior_weight", b.behavior_weight)?;
        if b.frame_weight + b.interpretation_weight + b.behavior_weight <= 0.0 {
            return Err(zero("baseline drift weights (sum)"));
        }
        unit("baseline.drift_smoothing", b.drift_smoothing)?;
        if b.drift_smoothing == 0.0 {
            return Err(zero("baseline.drift_smoothing"));
        }

        let cb = &self.circuit_breaker;
        if cb.failure_threshold == 0 {
            return Err(zero("circuit_breaker.failure_threshold"));
        }
        unit("circuit_breaker.critical_drift_threshold", cb.critical_drift_threshold)?;
        if cb.max_alerts == 0 {
            return Err(zero("circuit_breaker.max_alerts"));
        }

        let g = &self.governance;
        for gate in GateName::ALL {
            let spec = g.gates.get(gate);
            let name = gate.as_str().to_string();
            unit(&format!("governance.gates.{name}.min"), spec.min)?;
            unit(&format!("governance.gates.{name}.max"), spec.max)?;
            if spec.min <= 0.0 {
                return Err(zero(&format!("governance.gates.{name}.min")));
            }
            if spec.min > spec.max {
                return Err(ConfigError::InvertedBounds {
                    gate: name,
                    min: spec.min,
                    max: spec.max,
                });
            }
            if !spec.base.is_finite() || spec.base < spec.min || spec.base > spec.max {
                return Err(ConfigError::BaseOutOfBounds {
                    gate: name,
                    base: spec.base,
                    min: spec.min,
                    max: spec.max,
                });
            }
        }
        if g.reference_vocabulary_size == 0 {
            return Err(zero("governance.reference_vocabulary_size"));
        }
        unit("governance.vocabulary_floor", g.vocabulary_floor)?;
        unit("governance.vocabulary_floor_cap", g.vocabulary_floor_cap)?;
        if g.vocabulary_floor > g.vocabulary_floor_cap {
            return Err(ConfigError::InvertedBounds {
                gate: "vocabulary_floor".to_string(),
                min: g.vocabulary_floor,
                max: g.vocabulary_floor_cap,
            });
        }
        unit("governance.vocabulary_floor_slope", g.vocabulary_floor_slope)?;

        let im = &self.immutable;
        unit("immutable.conflict_threshold", im.conflict_threshold)?;
        unit("immutable.uncertainty_ceiling", im.uncertainty_ceiling)?;
        if im.failure_floor == 0 {
            return Err(zero("immutable.failure_floor"));
        }

        if self.tripwire.window_size == 0 {
            return Err(zero("tripwire.window_size"));
        }
        if self.audit.max_entries == 0 {
            return Err(zero("audit.max_entries"));
        }

        Ok(())
    }
}

fn zero(field: &str) -> ConfigError {
    ConfigError::Zero {
        field: field.to_string(),
    }
}

fn unit(field: &str, value: f64) -> std::result::Result<(), ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field: field.to_string(),
            value,
            min: 0.0,
            max: 1.0,
        })
    }
}

/// Validator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Minimum matched symbols for a frame to be well formed
    pub min_symbols: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self { min_symbols: 2 }
    }
}

/// Baseline store settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    /// Records kept per agent; the oldest is evicted first
    pub max_records_per_agent: usize,

    /// Weight of the frame sequence distance
    pub frame_weight: f64,

    /// Weight of the interpretation mismatch
    pub interpretation_weight: f64,

    /// Weight of the behavior mismatch
    pub behavior_weight: f64,

    /// EMA factor for the running per-agent drift score
    pub drift_smoothing: f64,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            max_records_per_agent: 256,
            frame_weight: 0.2,
            interpretation_weight: 0.4,
            behavior_weight: 0.4,
            drift_smoothing: 0.5,
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,

    /// Drift score above which the circuit opens immediately
    pub critical_drift_threshold: f64,

    /// Drift alerts retained per agent
    pub max_alerts: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            critical_drift_threshold: 0.3,
            max_alerts: 50,
        }
    }
}

/// Base threshold and clamp bounds of one gate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateSpec {
    pub base: f64,
    pub min: f64,
    pub max: f64,
}

impl GateSpec {
    pub const fn new(base: f64, min: f64, max: f64) -> Self {
        Self { base, min, max }
    }
}

/// One spec per named gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateTable {
    pub drift_threshold: GateSpec,
    pub conformance_deviation: GateSpec,
    pub say_do_gap: GateSpec,
    pub review_auto_pass: GateSpec,
    pub knowledge_promotion: GateSpec,
    pub threat_activation: GateSpec,
}

impl GateTable {
    pub fn get(&self, gate: GateName) -> &GateSpec {
        match gate {
            GateName::DriftThreshold => &self.drift_threshold,
            GateName::ConformanceDeviation => &self.conformance_deviation,
            GateName::SayDoGap => &self.say_do_gap,
            GateName::ReviewAutoPass => &self.review_auto_pass,
            GateName::KnowledgePromotion => &self.knowledge_promotion,
            GateName::ThreatActivation => &self.threat_activation,
        }
    }
}

impl Default for GateTable {
    fn default() -> Self {
        Self {
            drift_threshold: GateSpec::new(0.30, 0.10, 0.50),
            conformance_deviation: GateSpec::new(0.20, 0.05, 0.40),
            say_do_gap: GateSpec::new(0.25, 0.10, 0.50),
            review_auto_pass: GateSpec::new(0.70, 0.50, 0.95),
            knowledge_promotion: GateSpec::new(0.75, 0.50, 0.95),
            threat_activation: GateSpec::new(0.60, 0.30, 0.90),
        }
    }
}

/// Governance modulation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    pub gates: GateTable,

    /// Action vocabulary size at which the review floor starts rising
    pub reference_vocabulary_size: usize,

    /// Review auto-pass floor at or below the reference vocabulary
    pub vocabulary_floor: f64,

    /// Floor increase per doubling of the vocabulary
    pub vocabulary_floor_slope: f64,

    /// Upper limit of the vocabulary floor
    pub vocabulary_floor_cap: f64,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            gates: GateTable::default(),
            reference_vocabulary_size: 32,
            vocabulary_floor: 0.50,
            vocabulary_floor_slope: 0.05,
            vocabulary_floor_cap: 0.60,
        }
    }
}

/// Immutable floor constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImmutableConfig {
    /// Conflict coefficient above which review is forced
    pub conflict_threshold: f64,

    /// Consecutive failures that always block
    pub failure_floor: u32,

    /// Total uncertainty above which auto-pass is always blocked
    pub uncertainty_ceiling: f64,
}

impl Default for ImmutableConfig {
    fn default() -> Self {
        Self {
            conflict_threshold: 0.7,
            failure_floor: 5,
            uncertainty_ceiling: 0.9,
        }
    }
}

/// Tripwire probe settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TripwireConfig {
    /// Probes synthesized per run
    pub probes_per_run: usize,

    /// Recent outcomes kept per agent for the failure rate
    pub window_size: usize,
}

impl Default for TripwireConfig {
    fn default() -> Self {
        Self {
            probes_per_run: 8,
            window_size: 50,
        }
    }
}

/// In-memory audit log settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub max_entries: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config = EngineConfig::from_toml_str(
            r#"
            [circuit_breaker]
            failure_threshold = 3

            [governance.gates.drift_threshold]
            base = 0.2
            min = 0.1
            max = 0.4
            "#,
        )
        .unwrap();

        assert_eq!(config.circuit_breaker.failure_threshold, 3);
        assert_eq!(config.circuit_breaker.critical_drift_threshold, 0.3);
        assert_eq!(config.governance.gates.drift_threshold.base, 0.2);
        assert_eq!(config.governance.gates.review_auto_pass.base, 0.70);
    }

    #[test]
    fn test_rejects_inverted_gate_bounds() {
        let mut config = EngineConfig::default();
        config.governance.gates.say_do_gap = GateSpec::new(0.3, 0.5, 0.2);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvertedBounds { .. })
        ));
    }

    #[test]
    fn test_rejects_base_outside_bounds() {
        let mut config = EngineConfig::default();
        config.governance.gates.review_auto_pass = GateSpec::new(0.99, 0.5, 0.95);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BaseOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_rejects_zero_threshold_and_nan() {
        assert!(EngineConfig::default()
            .with_failure_threshold(0)
            .validate()
            .is_err());
        assert!(EngineConfig::default()
            .with_critical_drift(f64::NAN)
            .validate()
            .is_err());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("framegate.toml");

        let config = EngineConfig::default()
            .with_failure_threshold(7)
            .with_min_symbols(3);
        config.to_file(&path).unwrap();

        let loaded = EngineConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
