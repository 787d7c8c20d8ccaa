//! Engine facade
//!
//! [`FrameGovernanceEngine`] wires the resolver, validator, baseline store,
//! circuit breaker, tripwires and governance together behind one shareable
//! value. It is `Send + Sync`; hand it to worker threads behind an `Arc`.

use crate::audit::{AuditEventType, AuditRecord, AuditSink, InMemoryAuditLog};
use crate::circuit_breaker::{CircuitBreakerRegistry, CircuitBreakerState, CircuitState, CircuitTransition};
use crate::config::EngineConfig;
use crate::drift::{
    BaselineStore, DriftComparison, FrameInterpreter, Observation, TripwireInjector, TripwireRun,
};
use crate::error::Result;
use crate::frame::{FrameResolver, ParsedFrame, PolicyOverlay, ResolvedFrame};
use crate::governance::{
    decide, CalibrationMetrics, EffectiveThresholds, GateAction, GateDecision, GateName,
    GovernanceMode, GovernanceModulator, ImmutableCheckInput, ImmutableCheckResult, ImmutableFloor,
    UncertaintyDecomposition,
};
use crate::ontology::Ontology;
use crate::types::{now, AgentId};
use crate::validation::{FrameValidator, ValidationReport};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Inputs of one gate evaluation
#[derive(Debug, Clone)]
pub struct GateRequest {
    pub gate: GateName,
    pub observed_value: f64,
    pub mode: GovernanceMode,
    /// Agent whose breaker state feeds the failure floor
    pub agent: Option<AgentId>,
    pub uncertainty: UncertaintyDecomposition,
    pub calibration: CalibrationMetrics,
    pub vocabulary_size: Option<usize>,
    /// Content scanned for sensitive data
    pub content: Option<String>,
    pub conflict_coefficient: f64,
}

impl GateRequest {
    /// Request with no uncertainty, perfect calibration and no content
    pub fn new(gate: GateName, observed_value: f64, mode: GovernanceMode) -> Self {
        Self {
            gate,
            observed_value,
            mode,
            agent: None,
            uncertainty: UncertaintyDecomposition::zero(),
            calibration: CalibrationMetrics::from_ece(0.0),
            vocabulary_size: None,
            content: None,
            conflict_coefficient: 0.0,
        }
    }

    pub fn for_agent(mut self, agent: AgentId) -> Self {
        self.agent = Some(agent);
        self
    }

    pub fn with_uncertainty(mut self, uncertainty: UncertaintyDecomposition) -> Self {
        self.uncertainty = uncertainty;
        self
    }

    pub fn with_calibration(mut self, calibration: CalibrationMetrics) -> Self {
        self.calibration = calibration;
        self
    }

    pub fn with_vocabulary_size(mut self, size: usize) -> Self {
        self.vocabulary_size = Some(size);
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_conflict(mut self, coefficient: f64) -> Self {
        self.conflict_coefficient = coefficient;
        self
    }
}

/// What `record_operation` did with one outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationOutcome {
    pub agent: AgentId,
    pub success: bool,
    pub baseline_recorded: bool,
    pub comparison: Option<DriftComparison>,
    pub transition: Option<CircuitTransition>,
    /// Breaker verdict after the operation
    pub allowed: bool,
}

/// Builder for [`FrameGovernanceEngine`]
pub struct EngineBuilder {
    config: EngineConfig,
    ontology: Option<Arc<Ontology>>,
    overlay: Option<Arc<PolicyOverlay>>,
    audit: Option<Arc<dyn AuditSink>>,
    tripwire_seed: Option<u64>,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            ontology: None,
            overlay: None,
            audit: None,
            tripwire_seed: None,
        }
    }

    pub fn ontology(mut self, ontology: Arc<Ontology>) -> Self {
        self.ontology = Some(ontology);
        self
    }

    pub fn overlay(mut self, overlay: Arc<PolicyOverlay>) -> Self {
        self.overlay = Some(overlay);
        self
    }

    /// Replace the default in-memory audit log
    pub fn audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    pub fn tripwire_seed(mut self, seed: u64) -> Self {
        self.tripwire_seed = Some(seed);
        self
    }

    /// Validate the configuration and overlay, then build
    pub fn build(self) -> Result<FrameGovernanceEngine> {
        let config = self.config;
        config.validate()?;

        let ontology = self.ontology.unwrap_or_else(|| Arc::new(Ontology::builtin()));
        let mut resolver = FrameResolver::new(Arc::clone(&ontology));
        if let Some(overlay) = self.overlay {
            resolver = resolver.with_overlay(overlay)?;
        }

        let (audit, audit_log): (Arc<dyn AuditSink>, Option<Arc<InMemoryAuditLog>>) = match self.audit {
            Some(sink) => (sink, None),
            None => {
                let log = Arc::new(InMemoryAuditLog::new(config.audit.max_entries));
                let sink: Arc<dyn AuditSink> = log.clone();
                (sink, Some(log))
            }
        };

        let tripwires = match self.tripwire_seed {
            Some(seed) => TripwireInjector::with_seed(Arc::clone(&ontology), config.tripwire.clone(), seed),
            None => TripwireInjector::new(Arc::clone(&ontology), config.tripwire.clone()),
        };

        tracing::info!(
            symbols = ontology.len(),
            overlay = resolver.overlay().map(|o| o.name.as_str()),
            "frame governance engine ready"
        );

        Ok(FrameGovernanceEngine {
            validator: FrameValidator::new(resolver.clone(), config.validator.clone()),
            baselines: BaselineStore::new(config.baseline.clone()),
            breakers: CircuitBreakerRegistry::new(config.circuit_breaker.clone()),
            modulator: GovernanceModulator::new(config.governance.clone()),
            floor: ImmutableFloor::new(config.immutable.clone()),
            tripwires,
            resolver,
            audit,
            audit_log,
            config,
        })
    }
}

pub struct FrameGovernanceEngine {
    config: EngineConfig,
    resolver: FrameResolver,
    validator: FrameValidator,
    baselines: BaselineStore,
    breakers: CircuitBreakerRegistry,
    tripwires: TripwireInjector,
    modulator: GovernanceModulator,
    floor: ImmutableFloor,
    audit: Arc<dyn AuditSink>,
    audit_log: Option<Arc<InMemoryAuditLog>>,
}

impl FrameGovernanceEngine {
    /// Engine over the built-in ontology with the default audit log
    pub fn new(config: EngineConfig) -> Result<Self> {
        EngineBuilder::new(config).build()
    }

    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ontology(&self) -> &Arc<Ontology> {
        self.resolver.ontology()
    }

    pub fn resolver(&self) -> &FrameResolver {
        &self.resolver
    }

    /// The built-in audit log, absent when a custom sink was supplied
    pub fn audit_log(&self) -> Option<&Arc<InMemoryAuditLog>> {
        self.audit_log.as_ref()
    }

    fn emit(&self, event_type: AuditEventType, agent: Option<&AgentId>, details: serde_json::Value) {
        self.audit.record(AuditRecord::new(event_type, agent, details));
    }

    fn emit_transition(&self, transition: &Option<CircuitTransition>) {
        if let Some(t) = transition {
            let event = match t.to {
                CircuitState::Open => AuditEventType::CircuitOpened,
                CircuitState::Closed => AuditEventType::CircuitClosed,
            };
            self.emit(event, Some(&t.agent), json!({ "from": t.from, "to": t.to, "reason": t.reason }));
        }
    }

    // ------------------------------------------------------------------
    // Frames
    // ------------------------------------------------------------------

    pub fn parse(&self, raw: &str) -> Option<ParsedFrame> {
        self.resolver.parse(raw)
    }

    pub fn resolve(&self, raw: &str) -> Option<ResolvedFrame> {
        self.resolver.parse_and_resolve(raw)
    }

    /// Governance mode implied by a frame's effective mode
    pub fn governance_mode(&self, raw: &str) -> Option<GovernanceMode> {
        self.resolve(raw)
            .map(|r| GovernanceMode::from_frame_mode(r.mode.canonical_name()))
    }

    pub fn validate(&self, raw: &str, parent: Option<&str>) -> ValidationReport {
        self.validator.validate(raw, parent)
    }

    pub fn validate_chain(&self, frames: &[&str]) -> Vec<ValidationReport> {
        self.validator.validate_chain(frames)
    }

    // ------------------------------------------------------------------
    // Baselines and drift
    // ------------------------------------------------------------------

    /// Record a baseline. `None` when the frame has no recognized symbols.
    pub fn record_baseline<S: AsRef<str>>(
        &self,
        agent: &AgentId,
        raw: &str,
        expected_interpretation: &str,
        expected_behaviors: &[S],
    ) -> Option<usize> {
        let frame = self.parse(raw)?;
        let count = self.baselines.record_baseline(
            agent,
            &frame,
            expected_interpretation,
            expected_behaviors.iter().map(|b| b.as_ref().to_string()),
        );
        self.emit(
            AuditEventType::BaselineRecorded,
            Some(agent),
            json!({ "frame": raw, "identity": frame.identity().to_hex() }),
        );
        Some(count)
    }

    /// Compare without touching the breaker. `None` for an unparseable frame.
    pub fn compare_to_baseline<S: AsRef<str>>(
        &self,
        agent: &AgentId,
        raw: &str,
        interpretation: &str,
        behaviors: &[S],
    ) -> Option<DriftComparison> {
        let frame = self.parse(raw)?;
        Some(self.baselines.compare_to_baseline(agent, &frame, interpretation, behaviors))
    }

    pub fn agent_drift(&self, agent: &AgentId) -> f64 {
        self.baselines.agent_drift(agent)
    }

    /// Feed one operation outcome through breaker and baseline.
    ///
    /// Failures count toward the breaker. A success resets the failure
    /// counter and then either records the first baseline for the frame
    /// (valid frame, closed circuit only) or scores drift against it.
    ///
    /// The learned record holds only the first action label. Any other label
    /// on the same frame is drift; to accept several behaviors, record them
    /// with [`Self::record_baseline`], whose newest record supersedes.
    pub fn record_operation(
        &self,
        agent: &AgentId,
        raw: &str,
        action_label: &str,
        success: bool,
    ) -> OperationOutcome {
        let mut outcome = OperationOutcome {
            agent: agent.clone(),
            success,
            baseline_recorded: false,
            comparison: None,
            transition: None,
            allowed: true,
        };

        if !success {
            outcome.transition = self.record_failure(agent, &format!("operation failed: {action_label}"));
            outcome.allowed = self.is_allowed(agent);
            return outcome;
        }

        self.breakers.record_success(agent);
        let Some(frame) = self.parse(raw) else {
            outcome.allowed = self.is_allowed(agent);
            return outcome;
        };
        let interpretation = self.ontology().describe(&frame);

        let may_learn = self.validate(raw, None).valid && self.is_allowed(agent);
        match self
            .baselines
            .observe(agent, &frame, &interpretation, &[action_label], may_learn)
        {
            Observation::Learned(records) => {
                self.emit(
                    AuditEventType::BaselineRecorded,
                    Some(agent),
                    json!({ "frame": raw, "identity": frame.identity().to_hex(), "records": records }),
                );
                outcome.baseline_recorded = true;
            }
            Observation::Compared(comparison) => {
                if comparison.drift_score > 0.0 {
                    outcome.transition = self.record_drift(
                        agent,
                        comparison.drift_score,
                        &format!("operation {action_label} drifted on {raw}"),
                    );
                }
                outcome.comparison = Some(comparison);
            }
            Observation::Unknown => {}
        }

        outcome.allowed = self.is_allowed(agent);
        outcome
    }

    // ------------------------------------------------------------------
    // Circuit breaker
    // ------------------------------------------------------------------

    pub fn record_failure(&self, agent: &AgentId, reason: &str) -> Option<CircuitTransition> {
        let transition = self.breakers.record_failure(agent, reason);
        self.emit_transition(&transition);
        transition
    }

    pub fn record_drift(&self, agent: &AgentId, score: f64, reason: &str) -> Option<CircuitTransition> {
        let transition = self.breakers.record_drift(agent, score, reason);
        if score > 0.0 || score.is_nan() {
            self.emit(
                AuditEventType::DriftDetected,
                Some(agent),
                json!({ "score": score, "reason": reason }),
            );
        }
        self.emit_transition(&transition);
        transition
    }

    pub fn halt_agent(&self, agent: &AgentId, reason: &str) -> Option<CircuitTransition> {
        self.emit(AuditEventType::AgentHalted, Some(agent), json!({ "reason": reason }));
        let transition = self.breakers.halt_agent(agent, reason);
        self.emit_transition(&transition);
        transition
    }

    pub fn resume_agent(&self, agent: &AgentId) -> Option<CircuitTransition> {
        let transition = self.breakers.resume_agent(agent);
        self.emit_transition(&transition);
        transition
    }

    /// Accept the agent's current behavior as the new normal: zero its
    /// drift score and close its circuit.
    pub fn recalibrate_agent(&self, agent: &AgentId) -> Option<CircuitTransition> {
        self.baselines.recalibrate_agent(agent);
        self.emit(AuditEventType::AgentRecalibrated, Some(agent), json!({}));
        let transition = self.breakers.close_circuit(agent, "recalibrated");
        self.emit_transition(&transition);
        transition
    }

    pub fn is_allowed(&self, agent: &AgentId) -> bool {
        self.breakers.is_allowed(agent)
    }

    pub fn get_state(&self, agent: &AgentId) -> CircuitBreakerState {
        self.breakers.get_state(agent)
    }

    // ------------------------------------------------------------------
    // Governance
    // ------------------------------------------------------------------

    pub fn compute_thresholds(
        &self,
        mode: GovernanceMode,
        uncertainty: &UncertaintyDecomposition,
        calibration: &CalibrationMetrics,
        vocabulary_size: Option<usize>,
    ) -> EffectiveThresholds {
        self.modulator
            .compute_thresholds(mode, uncertainty, calibration, vocabulary_size)
    }

    pub fn check_immutable(&self, input: &ImmutableCheckInput<'_>) -> ImmutableCheckResult {
        let result = self.floor.check(input);
        if let Some(v) = &result.violation {
            self.emit(
                AuditEventType::ImmutableViolation,
                None,
                json!({ "constraint": v.constraint.id(), "action": v.action, "message": v.message }),
            );
        }
        result
    }

    /// Immutable floor first, then the modulated threshold. An agent with an
    /// open circuit is blocked even when the floor passes.
    pub fn evaluate_gate(&self, request: &GateRequest) -> GateDecision {
        let failures = request
            .agent
            .as_ref()
            .map_or(0, |a| self.breakers.consecutive_failures(a));
        let mut input = ImmutableCheckInput::new(request.mode)
            .with_conflict(request.conflict_coefficient)
            .with_failures(failures)
            .with_uncertainty(request.uncertainty.total);
        if let Some(content) = request.content.as_deref() {
            input = input.with_content(content);
        }
        let immutable = self.check_immutable(&input);

        let modulation = self.modulator.modulate(
            request.gate,
            request.mode,
            &request.uncertainty,
            &request.calibration,
            request.vocabulary_size,
        );

        let circuit_open = request.agent.as_ref().is_some_and(|a| !self.is_allowed(a));
        let decision = if immutable.passed && circuit_open {
            GateDecision {
                gate: request.gate,
                action: GateAction::Block,
                reason: "agent circuit is open".to_string(),
                immutable_triggered: false,
                immutable_constraint: None,
                threshold: modulation.effective_threshold,
                observed_value: request.observed_value,
                audit_id: Uuid::new_v4(),
                decided_at: now(),
            }
        } else {
            decide(request.gate, request.observed_value, &modulation, &immutable)
        };

        self.emit(
            AuditEventType::GateDecision,
            request.agent.as_ref(),
            serde_json::to_value(&decision).unwrap_or_default(),
        );
        decision
    }

    // ------------------------------------------------------------------
    // Tripwires
    // ------------------------------------------------------------------

    pub fn run_tripwires(&self, agent: &AgentId, interpreter: &dyn FrameInterpreter) -> TripwireRun {
        let run = self.tripwires.run(agent, interpreter);
        self.emit(
            AuditEventType::TripwireRun,
            Some(agent),
            json!({ "passed": run.passed, "failed": run.failed, "failure_rate": run.failure_rate }),
        );
        run
    }

    pub fn tripwire_failure_rate(&self, agent: &AgentId) -> f64 {
        self.tripwires.failure_rate(agent)
    }
}
