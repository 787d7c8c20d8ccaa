//! FrameGate Core - Frame validation and adaptive governance for agent delegation
//!
//! Agents hand each other work as compact symbolic *frames*: a string of
//! symbols stating how strictly to act (mode), in which area (domain), under
//! which constraints, what to do (action) and who does it (entity). This crate
//! checks those frames, watches how agents behave on them over time, and
//! decides how much latitude each agent gets.
//!
//! # Architecture
//!
//! ```text
//!   raw frame "⊕◊⛔▶β"
//!         │
//!   ┌─────▼──────────────┐     ┌──────────────────────┐
//!   │ Ontology + Resolver │────►│ Validator            │  SR-* / SM-* / CH-*
//!   │ (frame)             │     │ structural, semantic,│
//!   └─────┬──────────────┘     │ chain                │
//!         │                     └──────────────────────┘
//!   ┌─────▼──────────────┐     ┌──────────────────────┐
//!   │ Baseline Store      │────►│ Circuit Breaker      │  closed ⇄ open
//!   │ drift + tripwires   │     │ per agent            │  (operator recovery)
//!   └────────────────────┘     └──────────┬───────────┘
//!                                          │ consecutive failures
//!   mode, uncertainty, calibration   ┌─────▼───────────────┐
//!   ────────────────────────────────►│ Governance          │──► allow │ hold │ block
//!                                    │ immutable floor +   │
//!                                    │ modulated gates     │
//!                                    └─────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use framegate_core::{AgentId, EngineConfig, FrameGovernanceEngine};
//!
//! let engine = FrameGovernanceEngine::new(EngineConfig::default()).unwrap();
//!
//! let report = engine.validate("⊖◊▶β", Some("⊕◊⛔▼α"));
//! assert!(!report.valid);
//!
//! let agent = AgentId::new("agent-7");
//! engine.record_operation(&agent, "⊕◊▶β", "transfer", true);
//! assert!(engine.is_allowed(&agent));
//! ```
//!
//! # Modules
//!
//! - [`ontology`]: symbol table, tokenizer
//! - [`frame`]: parsing, policy overlays, resolution
//! - [`validation`]: the three validation tiers
//! - [`drift`]: baselines, drift scoring, tripwire probes
//! - [`circuit_breaker`]: per-agent interlock
//! - [`governance`]: threshold modulation and the immutable floor
//! - [`engine`]: facade over all of the above

#![deny(unsafe_code)]
#![warn(rust_2018_idioms, clippy::all)]

pub mod audit;
pub mod circuit_breaker;
pub mod config;
pub mod drift;
pub mod engine;
pub mod error;
pub mod frame;
pub mod governance;
pub mod ontology;
pub mod types;
pub mod validation;

pub use audit::{AuditEventType, AuditRecord, AuditSink, InMemoryAuditLog, NullAuditSink};
pub use circuit_breaker::{
    CircuitBreakerRegistry, CircuitBreakerState, CircuitState, CircuitTransition, DriftAlert,
};
pub use config::EngineConfig;
pub use drift::{BaselineStore, DriftComparison, FrameInterpreter, TripwireInjector, TripwireRun};
pub use engine::{EngineBuilder, FrameGovernanceEngine, GateRequest, OperationOutcome};
pub use error::{FrameGateError, Result, ResultExt};
pub use frame::{FrameResolver, ParsedFrame, PolicyOverlay, ResolvedFrame};
pub use governance::{
    CalibrationMetrics, EffectiveThresholds, GateAction, GateDecision, GateName, GovernanceMode,
    ImmutableCheckInput, ImmutableCheckResult, UncertaintyDecomposition,
};
pub use ontology::{Ontology, Symbol, SymbolCategory, SymbolKind};
pub use types::{AgentId, FrameHash, Timestamp};
pub use validation::{FrameValidator, Severity, ValidationFinding, ValidationReport};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
