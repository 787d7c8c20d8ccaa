//! Per-agent Circuit Breaker
//!
//! Stops an agent whose operations keep failing or whose behavior drifts
//! past a critical score. There is no half-open state: an open circuit stays
//! open until an operator closes it.
//!
//! ```text
//!            failures ≥ threshold
//!            drift > critical
//!            halt
//!   Closed ───────────────────────► Open
//!     ▲                              │
//!     └──── close / resume ──────────┘
//! ```

use crate::config::CircuitBreakerConfig;
use crate::types::{now, AgentId, Timestamp};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CircuitState {
    /// Normal operation
    Closed,
    /// Agent blocked until an operator closes the circuit
    Open,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => f.write_str("closed"),
            CircuitState::Open => f.write_str("open"),
        }
    }
}

/// A drift observation kept for the audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftAlert {
    pub score: f64,
    pub reason: String,
    /// Score exceeded the critical threshold
    pub critical: bool,
    pub at: Timestamp,
}

/// State change caused by one breaker operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitTransition {
    pub agent: AgentId,
    pub from: CircuitState,
    pub to: CircuitState,
    pub reason: String,
}

/// Snapshot of one agent's breaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    pub agent: AgentId,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub total_failures: u64,
    pub opened_at: Option<Timestamp>,
    pub open_reason: Option<String>,
    pub last_failure_at: Option<Timestamp>,
    pub drift_alerts: VecDeque<DriftAlert>,
    pub updated_at: Timestamp,
}

impl CircuitBreakerState {
    fn new(agent: AgentId) -> Self {
        Self {
            agent,
            state: CircuitState::Closed,
            consecutive_failures: 0,
            total_failures: 0,
            opened_at: None,
            open_reason: None,
            last_failure_at: None,
            drift_alerts: VecDeque::new(),
            updated_at: now(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == CircuitState::Open
    }

    fn open(&mut self, reason: String) -> Option<CircuitTransition> {
        self.updated_at = now();
        if self.is_open() {
            return None;
        }
        self.state = CircuitState::Open;
        self.opened_at = Some(self.updated_at);
        self.open_reason = Some(reason.clone());
        tracing::warn!(agent = %self.agent, %reason, "circuit opened");
        Some(CircuitTransition {
            agent: self.agent.clone(),
            from: CircuitState::Closed,
            to: CircuitState::Open,
            reason,
        })
    }

    fn close(&mut self, reason: String) -> Option<CircuitTransition> {
        let from = self.state;
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
        self.opened_at = None;
        self.open_reason = None;
        self.updated_at = now();
        if from == CircuitState::Closed {
            return None;
        }
        tracing::info!(agent = %self.agent, %reason, "circuit closed");
        Some(CircuitTransition {
            agent: self.agent.clone(),
            from,
            to: CircuitState::Closed,
            reason,
        })
    }
}

/// Registry of breakers keyed by agent
pub struct CircuitBreakerRegistry {
    breakers: DashMap<AgentId, CircuitBreakerState>,
    config: CircuitBreakerConfig,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Count a failure; opens the circuit at the threshold
    pub fn record_failure(&self, agent: &AgentId, reason: &str) -> Option<CircuitTransition> {
        let mut breaker = self
            .breakers
            .entry(agent.clone())
            .or_insert_with(|| CircuitBreakerState::new(agent.clone()));
        breaker.consecutive_failures = breaker.consecutive_failures.saturating_add(1);
        breaker.total_failures += 1;
        breaker.last_failure_at = Some(now());
        breaker.updated_at = now();

        tracing::debug!(
            %agent,
            consecutive = breaker.consecutive_failures,
            %reason,
            "failure recorded"
        );

        if breaker.consecutive_failures >= self.config.failure_threshold {
            let failures = breaker.consecutive_failures;
            breaker.open(format!("{failures} consecutive failures, last: {reason}"))
        } else {
            None
        }
    }

    /// Reset the consecutive-failure counter of a closed circuit
    pub fn record_success(&self, agent: &AgentId) {
        if let Some(mut breaker) = self.breakers.get_mut(agent) {
            if breaker.state == CircuitState::Closed && breaker.consecutive_failures > 0 {
                breaker.consecutive_failures = 0;
                breaker.updated_at = now();
            }
        }
    }

    /// Append a drift alert; a score above the critical threshold opens the circuit
    pub fn record_drift(&self, agent: &AgentId, score: f64, reason: &str) -> Option<CircuitTransition> {
        let critical = !(score <= self.config.critical_drift_threshold);
        let mut breaker = self
            .breakers
            .entry(agent.clone())
            .or_insert_with(|| CircuitBreakerState::new(agent.clone()));
        breaker.drift_alerts.push_back(DriftAlert {
            score,
            reason: reason.to_string(),
            critical,
            at: now(),
        });
        while breaker.drift_alerts.len() > self.config.max_alerts {
            breaker.drift_alerts.pop_front();
        }
        breaker.updated_at = now();

        if critical {
            tracing::warn!(%agent, score, %reason, "critical drift");
            breaker.open(format!("critical drift {score:.3}: {reason}"))
        } else {
            None
        }
    }

    /// Operator override: open unconditionally
    pub fn halt_agent(&self, agent: &AgentId, reason: &str) -> Option<CircuitTransition> {
        tracing::info!(%agent, %reason, "operator halt");
        self.breakers
            .entry(agent.clone())
            .or_insert_with(|| CircuitBreakerState::new(agent.clone()))
            .open(format!("halted: {reason}"))
    }

    /// Close the circuit and zero the failure counter. Drift alerts are kept.
    pub fn close_circuit(&self, agent: &AgentId, reason: &str) -> Option<CircuitTransition> {
        self.breakers
            .get_mut(agent)
            .and_then(|mut breaker| breaker.close(reason.to_string()))
    }

    /// Operator resume
    pub fn resume_agent(&self, agent: &AgentId) -> Option<CircuitTransition> {
        self.close_circuit(agent, "operator resume")
    }

    /// True iff the agent's circuit is closed. Unknown agents are allowed.
    pub fn is_allowed(&self, agent: &AgentId) -> bool {
        self.breakers
            .get(agent)
            .map_or(true, |b| b.state == CircuitState::Closed)
    }

    pub fn get_state(&self, agent: &AgentId) -> CircuitBreakerState {
        self.breakers
            .get(agent)
            .map(|b| b.clone())
            .unwrap_or_else(|| CircuitBreakerState::new(agent.clone()))
    }

    pub fn consecutive_failures(&self, agent: &AgentId) -> u32 {
        self.breakers.get(agent).map_or(0, |b| b.consecutive_failures)
    }

    /// Forget the agent entirely, alert history included
    pub fn reset_agent(&self, agent: &AgentId) -> bool {
        self.breakers.remove(agent).is_some()
    }

    pub fn open_agents(&self) -> Vec<AgentId> {
        let mut open: Vec<AgentId> = self
            .breakers
            .iter()
            .filter(|b| b.is_open())
            .map(|b| b.key().clone())
            .collect();
        open.sort();
        open
    }

    pub fn agent_count(&self) -> usize {
        self.breakers.len()
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
