//! End-to-end tests for the governance engine.
//!
//! These tests drive a single engine through realistic agent lifecycles:
//! configuration from disk, baselines learned from live operations, drift,
//! operator recovery, tripwires and concurrent agents.

use framegate_core::audit::{AuditEventType, InMemoryAuditLog};
use framegate_core::drift::ProbeAnswer;
use framegate_core::{
    AgentId, CalibrationMetrics, CircuitState, EngineConfig, FrameGovernanceEngine,
    FrameInterpreter, GateAction, GateName, GateRequest, GovernanceMode, Ontology,
    UncertaintyDecomposition,
};
use std::sync::Arc;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn temp_dir() -> TempDir {
    tempfile::Builder::new()
        .prefix("framegate_e2e_")
        .tempdir()
        .expect("should create tempdir")
}

fn engine_with_log(config: EngineConfig) -> (FrameGovernanceEngine, Arc<InMemoryAuditLog>) {
    let log = Arc::new(InMemoryAuditLog::new(1_000));
    let engine = FrameGovernanceEngine::builder(config)
        .audit_sink(log.clone())
        .tripwire_seed(42)
        .build()
        .expect("engine should build");
    (engine, log)
}

/// Reads every frame as strict/financial/execute
struct StuckInterpreter;

impl FrameInterpreter for StuckInterpreter {
    fn interpret(&self, _frame: &str) -> Option<ProbeAnswer> {
        Some(ProbeAnswer {
            mode: "strict".into(),
            domain: "financial".into(),
            action: "execute".into(),
        })
    }
}

// ---------------------------------------------------------------------------
// Test 1: configuration and ontology loaded from disk
// ---------------------------------------------------------------------------
#[test]
fn test_engine_from_files() {
    let dir = temp_dir();
    let config_path = dir.path().join("framegate.toml");
    let ontology_path = dir.path().join("ontology.toml");

    std::fs::write(
        &config_path,
        r#"
        [circuit_breaker]
        failure_threshold = 2

        [validator]
        min_symbols = 3
        "#,
    )
    .unwrap();
    std::fs::write(&ontology_path, Ontology::builtin().to_toml_string().unwrap()).unwrap();

    let config = EngineConfig::from_file(&config_path).unwrap();
    let ontology = Ontology::from_file(&ontology_path).unwrap();
    let engine = FrameGovernanceEngine::builder(config)
        .ontology(Arc::new(ontology))
        .build()
        .unwrap();

    assert!(!engine.validate("⊕◊", None).valid);
    assert!(engine.validate("⊕◊▷", None).valid);

    let agent = AgentId::new("disk-agent");
    engine.record_failure(&agent, "first");
    engine.record_failure(&agent, "second");
    assert!(!engine.is_allowed(&agent));
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let dir = temp_dir();
    let path = dir.path().join("bad.toml");
    std::fs::write(
        &path,
        r#"
        [governance.gates.drift_threshold]
        base = 0.9
        min = 0.1
        max = 0.5
        "#,
    )
    .unwrap();
    let err = EngineConfig::from_file(&path).unwrap_err().to_string();
    assert!(err.contains("Invalid config"), "{err}");
    assert!(err.contains("bad.toml"), "{err}");
}

#[test]
fn test_file_errors_name_the_path() {
    let dir = temp_dir();
    let missing = dir.path().join("missing.toml");
    let err = Ontology::from_file(&missing).unwrap_err().to_string();
    assert!(err.contains("Failed to read ontology"), "{err}");
    assert!(err.contains("missing.toml"), "{err}");

    let broken = dir.path().join("ontology.toml");
    std::fs::write(&broken, "[[symbols]]\ntoken = \"\"\n").unwrap();
    let err = Ontology::from_file(&broken).unwrap_err().to_string();
    assert!(err.contains("Invalid ontology"), "{err}");
}

// ---------------------------------------------------------------------------
// Test 2: full agent lifecycle with drift, halt and recalibration
// ---------------------------------------------------------------------------
#[test]
fn test_agent_lifecycle() {
    let (engine, log) = engine_with_log(EngineConfig::default());
    let agent = AgentId::new("payments-bot");

    // learn
    let outcome = engine.record_operation(&agent, "⊕◊▶β", "transfer", true);
    assert!(outcome.baseline_recorded);

    // steady state
    for _ in 0..3 {
        let outcome = engine.record_operation(&agent, "⊕◊▶β", "transfer", true);
        assert_eq!(outcome.comparison.as_ref().unwrap().drift_score, 0.0);
        assert!(outcome.allowed);
    }

    // explicit comparison with a different interpretation
    let cmp = engine
        .compare_to_baseline(&agent, "⊕◊▶β", "refuse the transfer", &["transfer"])
        .unwrap();
    assert!(cmp.has_baseline);
    assert!(!cmp.interpretation_match);
    assert!(cmp.behavior_match);

    // drift
    let outcome = engine.record_operation(&agent, "⊕◊▶β", "delete_audit_trail", true);
    assert!(!outcome.allowed);
    let state = engine.get_state(&agent);
    assert_eq!(state.state, CircuitState::Open);
    assert!(!state.drift_alerts.is_empty());

    // recovery keeps history
    engine.recalibrate_agent(&agent);
    let state = engine.get_state(&agent);
    assert_eq!(state.state, CircuitState::Closed);
    assert!(!state.drift_alerts.is_empty());
    assert_eq!(engine.agent_drift(&agent), 0.0);

    assert!(!log.of_type(AuditEventType::CircuitOpened).is_empty());
    assert!(!log.of_type(AuditEventType::CircuitClosed).is_empty());
    assert!(!log.of_type(AuditEventType::AgentRecalibrated).is_empty());
}

// ---------------------------------------------------------------------------
// Test 3: manual baselines
// ---------------------------------------------------------------------------
#[test]
fn test_manual_baseline() {
    let (engine, _log) = engine_with_log(EngineConfig::default());
    let agent = AgentId::new("analyst");

    assert_eq!(engine.record_baseline(&agent, "⊙✚▷α", "review chart", &["read_chart"]), Some(1));
    assert_eq!(engine.record_baseline(&agent, "nothing known", "x", &["y"]), None);

    let cmp = engine
        .compare_to_baseline(&agent, "⊙✚▷α", "Review   chart", &["read_chart", "email_chart"])
        .unwrap();
    assert!(cmp.interpretation_match);
    assert!(!cmp.behavior_match);
    assert!(cmp.drift_score > 0.0);

    let unknown = engine
        .compare_to_baseline(&agent, "⊙§▷α", "review", &["read"])
        .unwrap();
    assert!(!unknown.has_baseline);
}

// ---------------------------------------------------------------------------
// Test 4: thresholds respond to mode, uncertainty and calibration
// ---------------------------------------------------------------------------
#[test]
fn test_gate_decisions_follow_modulation() {
    let (engine, log) = engine_with_log(EngineConfig::default());

    // observed drift of 0.28 passes a relaxed gate...
    let relaxed = GateRequest::new(GateName::DriftThreshold, 0.28, GovernanceMode::Flexible)
        .with_uncertainty(UncertaintyDecomposition::new(0.0, 0.4, "ensemble"));
    assert_eq!(engine.evaluate_gate(&relaxed).action, GateAction::Allow);

    // ...and is held under strict mode with epistemic uncertainty and poor calibration
    let tight = GateRequest::new(GateName::DriftThreshold, 0.28, GovernanceMode::Strict)
        .with_uncertainty(UncertaintyDecomposition::new(0.4, 0.0, "ensemble"))
        .with_calibration(CalibrationMetrics::from_ece(0.4));
    let decision = engine.evaluate_gate(&tight);
    assert_eq!(decision.action, GateAction::Hold);
    assert!(!decision.immutable_triggered);
    assert!(decision.threshold < 0.28);

    // uncertainty above the ceiling blocks outright
    let noisy = GateRequest::new(GateName::ReviewAutoPass, 0.99, GovernanceMode::Standard)
        .with_uncertainty(UncertaintyDecomposition::new(0.5, 0.45, "ensemble"));
    let decision = engine.evaluate_gate(&noisy);
    assert_eq!(decision.action, GateAction::Block);
    assert!(decision.immutable_triggered);

    assert_eq!(log.of_type(AuditEventType::GateDecision).len(), 3);
    assert_eq!(log.of_type(AuditEventType::ImmutableViolation).len(), 1);
}

#[test]
fn test_vocabulary_floor_in_engine() {
    let (engine, _log) = engine_with_log(EngineConfig::default());
    let thresholds = engine.compute_thresholds(
        GovernanceMode::Flexible,
        &UncertaintyDecomposition::zero(),
        &CalibrationMetrics::from_ece(0.0),
        Some(256),
    );
    let review = thresholds.get(GateName::ReviewAutoPass).unwrap();
    assert!((review - 0.60).abs() < 1e-9);
}

// ---------------------------------------------------------------------------
// Test 5: tripwires
// ---------------------------------------------------------------------------
#[test]
fn test_tripwires_track_interpreter_quality() {
    let (engine, log) = engine_with_log(EngineConfig::default());
    let good = AgentId::new("good");
    let stuck = AgentId::new("stuck");

    let run = engine.run_tripwires(&good, engine.resolver());
    assert_eq!(run.failed, 0);
    assert_eq!(engine.tripwire_failure_rate(&good), 0.0);

    let run = engine.run_tripwires(&stuck, &StuckInterpreter);
    assert!(run.failed > 0);
    assert!(engine.tripwire_failure_rate(&stuck) > 0.0);

    // tripwire failures are a separate signal: drift and breaker untouched
    assert_eq!(engine.agent_drift(&stuck), 0.0);
    assert!(engine.is_allowed(&stuck));
    assert_eq!(log.of_type(AuditEventType::TripwireRun).len(), 2);
}

// ---------------------------------------------------------------------------
// Test 6: many agents on many threads
// ---------------------------------------------------------------------------
#[test]
fn test_concurrent_agents_are_isolated() {
    let engine = FrameGovernanceEngine::new(EngineConfig::default()).unwrap();

    std::thread::scope(|s| {
        for worker in 0..8 {
            let engine = &engine;
            s.spawn(move || {
                let agent = AgentId::new(format!("worker-{worker}"));
                engine.record_operation(&agent, "⊕◊▶β", "transfer", true);
                for _ in 0..50 {
                    engine.record_operation(&agent, "⊕◊▶β", "transfer", true);
                }
                // odd workers fail until their circuit opens
                if worker % 2 == 1 {
                    for _ in 0..5 {
                        engine.record_operation(&agent, "⊕◊▶β", "transfer", false);
                    }
                }
            });
        }
    });

    for worker in 0..8 {
        let agent = AgentId::new(format!("worker-{worker}"));
        let state = engine.get_state(&agent);
        if worker % 2 == 1 {
            assert_eq!(state.state, CircuitState::Open, "{agent}");
            assert_eq!(state.total_failures, 5);
        } else {
            assert_eq!(state.state, CircuitState::Closed, "{agent}");
            assert_eq!(state.total_failures, 0);
        }
        assert_eq!(engine.agent_drift(&agent), 0.0);
    }
}

// ---------------------------------------------------------------------------
// Test 7: racing first sightings of one frame learn a single baseline
// ---------------------------------------------------------------------------
#[test]
fn test_concurrent_first_operations_learn_one_baseline() {
    let engine = FrameGovernanceEngine::new(EngineConfig::default()).unwrap();
    let agent = AgentId::new("shared");

    let learned = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| s.spawn(|| engine.record_operation(&agent, "⊕◊▶β", "transfer", true)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap().baseline_recorded)
            .filter(|recorded| *recorded)
            .count()
    });

    assert_eq!(learned, 1);
    assert!(engine.is_allowed(&agent));
    assert_eq!(engine.agent_drift(&agent), 0.0);
}
