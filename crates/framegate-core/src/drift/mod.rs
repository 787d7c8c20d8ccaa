//! Baseline Store & Drift Detection
//!
//! Remembers how each agent interpreted and acted on a frame, and scores later
//! runs of the same frame against that memory.
//!
//! ```text
//!   record_baseline(agent, frame, interpretation, behaviors)
//!         │
//!         ▼
//!   ┌──────────────────────────────┐
//!   │ BaselineStore (DashMap)      │
//!   │  agent ─► ring of records    │
//!   │         + running drift EMA  │
//!   └──────────────────────────────┘
//!         │ compare_to_baseline
//!         ▼
//!   DriftComparison ──► circuit breaker (record_drift)
//!
//!   TripwireInjector ──► known-answer probes ──► failure rate (kept apart from drift)
//! ```

pub mod baseline;
pub mod tripwire;

pub use baseline::{AgentBaselines, BaselineRecord, BaselineStore, DriftComparison, Observation};
pub use tripwire::{
    FrameInterpreter, ProbeAnswer, ProbeOutcome, TripwireInjector, TripwireProbe, TripwireRun,
    TripwireStats,
};
