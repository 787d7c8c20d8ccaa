//! Tripwire probes
//!
//! Known-answer frames are synthesized from the ontology and handed to an
//! agent's interpreter. A wrong reading is a failure; the recent failure rate
//! is kept per agent and is never folded into the drift score.

use crate::config::TripwireConfig;
use crate::frame::FrameResolver;
use crate::ontology::{Ontology, Symbol, SymbolCategory};
use crate::types::{now, AgentId, Timestamp};
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use uuid::Uuid;

/// Canonical reading of a probe frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeAnswer {
    pub mode: String,
    pub domain: String,
    pub action: String,
}

/// Anything that can read a frame: an agent's interpreter under test
pub trait FrameInterpreter: Send + Sync {
    /// `None` when the interpreter cannot read the frame at all
    fn interpret(&self, frame: &str) -> Option<ProbeAnswer>;
}

/// The resolver is the reference interpreter
impl FrameInterpreter for FrameResolver {
    fn interpret(&self, frame: &str) -> Option<ProbeAnswer> {
        let resolved = self.parse_and_resolve(frame)?;
        Some(ProbeAnswer {
            mode: resolved.mode.canonical_name().to_string(),
            domain: resolved.domain.canonical_name().to_string(),
            action: resolved.action.canonical_name().to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripwireProbe {
    pub id: Uuid,
    pub frame: String,
    pub expected: ProbeAnswer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub probe: TripwireProbe,
    pub observed: Option<ProbeAnswer>,
    pub passed: bool,
}

/// Result of one probe run for one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripwireRun {
    pub agent: AgentId,
    pub passed: usize,
    pub failed: usize,
    /// Window failure rate after this run
    pub failure_rate: f64,
    pub outcomes: Vec<ProbeOutcome>,
    pub ran_at: Timestamp,
}

/// Per-agent probe history
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TripwireStats {
    pub total_probes: u64,
    pub total_failures: u64,
    /// Most recent outcomes, `true` for a pass
    pub recent: VecDeque<bool>,
    pub last_run: Option<Timestamp>,
}

impl TripwireStats {
    pub fn failure_rate(&self) -> f64 {
        if self.recent.is_empty() {
            return 0.0;
        }
        let failures = self.recent.iter().filter(|passed| !**passed).count();
        failures as f64 / self.recent.len() as f64
    }
}

pub struct TripwireInjector {
    ontology: Arc<Ontology>,
    config: TripwireConfig,
    rng: Mutex<StdRng>,
    stats: DashMap<AgentId, TripwireStats>,
}

impl TripwireInjector {
    pub fn new(ontology: Arc<Ontology>, config: TripwireConfig) -> Self {
        Self::with_rng(ontology, config, StdRng::from_entropy())
    }

    /// Deterministic probe selection
    pub fn with_seed(ontology: Arc<Ontology>, config: TripwireConfig, seed: u64) -> Self {
        Self::with_rng(ontology, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(ontology: Arc<Ontology>, config: TripwireConfig, rng: StdRng) -> Self {
        Self {
            ontology,
            config,
            rng: Mutex::new(rng),
            stats: DashMap::new(),
        }
    }

    /// Draw `count` random mode/domain/action probes
    pub fn synthesize(&self, count: usize) -> Vec<TripwireProbe> {
        let modes: Vec<&Symbol> = self.ontology.by_category(SymbolCategory::Mode).collect();
        let domains: Vec<&Symbol> = self.ontology.by_category(SymbolCategory::Domain).collect();
        let actions: Vec<&Symbol> = self.ontology.by_category(SymbolCategory::Action).collect();

        let mut rng = self.rng.lock();
        (0..count)
            .filter_map(|_| {
                let mode = modes.choose(&mut *rng)?;
                let domain = domains.choose(&mut *rng)?;
                let action = actions.choose(&mut *rng)?;
                Some(TripwireProbe {
                    id: Uuid::new_v4(),
                    frame: format!("{}{}{}", mode.token, domain.token, action.token),
                    expected: ProbeAnswer {
                        mode: mode.canonical_name.clone(),
                        domain: domain.canonical_name.clone(),
                        action: action.canonical_name.clone(),
                    },
                })
            })
            .collect()
    }

    /// Run a fresh batch of probes against an interpreter and record the outcomes
    pub fn run(&self, agent: &AgentId, interpreter: &dyn FrameInterpreter) -> TripwireRun {
        let probes = self.synthesize(self.config.probes_per_run);
        self.run_probes(agent, interpreter, probes)
    }

    /// Run the given probes
    pub fn run_probes(
        &self,
        agent: &AgentId,
        interpreter: &dyn FrameInterpreter,
        probes: Vec<TripwireProbe>,
    ) -> TripwireRun {
        let outcomes: Vec<ProbeOutcome> = probes
            .into_iter()
            .map(|probe| {
                let observed = interpreter.interpret(&probe.frame);
                let passed = observed.as_ref() == Some(&probe.expected);
                ProbeOutcome {
                    probe,
                    observed,
                    passed,
                }
            })
            .collect();

        let passed = outcomes.iter().filter(|o| o.passed).count();
        let failed = outcomes.len() - passed;
        let ran_at = now();

        let mut stats = self.stats.entry(agent.clone()).or_default();
        for outcome in &outcomes {
            stats.recent.push_back(outcome.passed);
            while stats.recent.len() > self.config.window_size {
                stats.recent.pop_front();
            }
        }
        stats.total_probes += outcomes.len() as u64;
        stats.total_failures += failed as u64;
        stats.last_run = Some(ran_at);
        let failure_rate = stats.failure_rate();
        drop(stats);

        if failed > 0 {
            tracing::warn!(%agent, failed, failure_rate, "tripwire probes failed");
        } else {
            tracing::debug!(%agent, passed, "tripwire probes passed");
        }

        TripwireRun {
            agent: agent.clone(),
            passed,
            failed,
            failure_rate,
            outcomes,
            ran_at,
        }
    }

    pub fn failure_rate(&self, agent: &AgentId) -> f64 {
        self.stats.get(agent).map_or(0.0, |s| s.failure_rate())
    }

    pub fn stats(&self, agent: &AgentId) -> Option<TripwireStats> {
        self.stats.get(agent).map(|s| s.clone())
    }

    pub fn reset_agent(&self, agent: &AgentId) -> bool {
        self.stats.remove(agent).is_some()
    }
}
