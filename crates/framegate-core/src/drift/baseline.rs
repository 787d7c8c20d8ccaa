//! Per-agent baselines and drift scoring

use crate::config::BaselineConfig;
use crate::frame::ParsedFrame;
use crate::types::{now, AgentId, FrameHash, Timestamp};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};

/// Expected interpretation and behaviors of one frame for one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineRecord {
    pub frame_hash: FrameHash,
    pub frame: String,
    /// Matched symbol tokens in frame order
    pub tokens: Vec<String>,
    pub expected_interpretation: String,
    pub expected_behaviors: BTreeSet<String>,
    pub recorded_at: Timestamp,
}

/// Everything the store keeps for one agent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentBaselines {
    pub records: VecDeque<BaselineRecord>,
    /// Running drift score (EMA over comparisons with a baseline)
    pub drift_score: f64,
    pub comparisons: u64,
    pub recalibrated_at: Option<Timestamp>,
}

/// Result of comparing one observed run against the agent's baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftComparison {
    pub agent: AgentId,
    pub frame_hash: FrameHash,
    pub has_baseline: bool,
    /// Drift of this observation; 0 without a baseline
    pub drift_score: f64,
    /// Agent's running drift after this observation
    pub agent_drift: f64,
    pub interpretation_match: bool,
    pub behavior_match: bool,
    pub frame_distance: f64,
    /// Share of observed behaviors outside the recorded set
    pub behavior_mismatch: f64,
    pub baseline_recorded_at: Option<Timestamp>,
}

/// What [`BaselineStore::observe`] did with one operation
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// First sighting of the frame; a record was stored. Holds the record count.
    Learned(usize),
    /// Scored against the existing record
    Compared(DriftComparison),
    /// No record for the frame and learning was not permitted
    Unknown,
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Positional mismatch between two token sequences, in [0, 1]
fn sequence_distance(a: &[String], b: &[String]) -> f64 {
    let len = a.len().max(b.len());
    if len == 0 {
        return 0.0;
    }
    let mismatched = (0..len).filter(|&i| a.get(i) != b.get(i)).count();
    mismatched as f64 / len as f64
}

/// Share of observed behaviors outside the expected set. Observing nothing
/// when something was expected counts as fully outside.
fn behavior_mismatch(expected: &BTreeSet<String>, observed: &[String]) -> f64 {
    if observed.is_empty() {
        return if expected.is_empty() { 0.0 } else { 1.0 };
    }
    let outside = observed.iter().filter(|b| !expected.contains(*b)).count();
    outside as f64 / observed.len() as f64
}

fn new_record<I, S>(frame: &ParsedFrame, interpretation: &str, behaviors: I) -> BaselineRecord
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    BaselineRecord {
        frame_hash: frame.identity(),
        frame: frame.raw().to_string(),
        tokens: frame.tokens().map(str::to_string).collect(),
        expected_interpretation: interpretation.to_string(),
        expected_behaviors: behaviors.into_iter().map(Into::into).collect(),
        recorded_at: now(),
    }
}

/// Sharded per-agent baseline memory
pub struct BaselineStore {
    agents: DashMap<AgentId, AgentBaselines>,
    config: BaselineConfig,
}

impl BaselineStore {
    pub fn new(config: BaselineConfig) -> Self {
        Self {
            agents: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &BaselineConfig {
        &self.config
    }

    /// Append a baseline record, evicting the oldest beyond capacity.
    /// Returns the number of records now held for the agent.
    pub fn record_baseline<I, S>(
        &self,
        agent: &AgentId,
        frame: &ParsedFrame,
        expected_interpretation: &str,
        expected_behaviors: I,
    ) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let record = new_record(frame, expected_interpretation, expected_behaviors);
        let mut entry = self.agents.entry(agent.clone()).or_default();
        self.push_record(agent, &mut entry, record)
    }

    fn push_record(&self, agent: &AgentId, entry: &mut AgentBaselines, record: BaselineRecord) -> usize {
        let raw = record.frame.clone();
        entry.records.push_back(record);
        while entry.records.len() > self.config.max_records_per_agent {
            entry.records.pop_front();
        }
        tracing::debug!(%agent, frame = %raw, records = entry.records.len(), "baseline recorded");
        entry.records.len()
    }

    /// Learn the frame on first sight, otherwise score against it.
    ///
    /// The lookup and the insert happen under one per-agent guard, so two
    /// concurrent first sightings of a frame store a single record.
    pub fn observe<S: AsRef<str>>(
        &self,
        agent: &AgentId,
        frame: &ParsedFrame,
        interpretation: &str,
        behaviors: &[S],
        may_learn: bool,
    ) -> Observation {
        let hash = frame.identity();
        if !may_learn {
            return match self.agents.get_mut(agent) {
                Some(mut entry) => self
                    .score(agent, &mut entry, frame, interpretation, behaviors)
                    .map_or(Observation::Unknown, Observation::Compared),
                None => Observation::Unknown,
            };
        }

        let mut entry = self.agents.entry(agent.clone()).or_default();
        if entry.records.iter().any(|r| r.frame_hash == hash) {
            return self
                .score(agent, &mut entry, frame, interpretation, behaviors)
                .map_or(Observation::Unknown, Observation::Compared);
        }
        let record = new_record(frame, interpretation, behaviors.iter().map(|b| b.as_ref()));
        Observation::Learned(self.push_record(agent, &mut entry, record))
    }

    /// Whether the agent has a record for this frame identity
    pub fn has_baseline(&self, agent: &AgentId, frame: &ParsedFrame) -> bool {
        let hash = frame.identity();
        self.agents
            .get(agent)
            .map_or(false, |a| a.records.iter().any(|r| r.frame_hash == hash))
    }

    /// Score an observed run against the most recent record of the same frame
    pub fn compare_to_baseline<S: AsRef<str>>(
        &self,
        agent: &AgentId,
        frame: &ParsedFrame,
        interpretation: &str,
        behaviors: &[S],
    ) -> DriftComparison {
        let hash = frame.identity();
        let Some(mut entry) = self.agents.get_mut(agent) else {
            return self.no_baseline(agent, hash, 0.0);
        };
        match self.score(agent, &mut entry, frame, interpretation, behaviors) {
            Some(comparison) => comparison,
            None => {
                let running = entry.drift_score;
                self.no_baseline(agent, hash, running)
            }
        }
    }

    /// Score against the agent's most recent record of the frame and fold the
    /// result into the running drift. `None` when the frame was never recorded.
    fn score<S: AsRef<str>>(
        &self,
        agent: &AgentId,
        entry: &mut AgentBaselines,
        frame: &ParsedFrame,
        interpretation: &str,
        behaviors: &[S],
    ) -> Option<DriftComparison> {
        let hash = frame.identity();
        let record = entry.records.iter().rev().find(|r| r.frame_hash == hash)?;

        let observed_tokens: Vec<String> = frame.tokens().map(str::to_string).collect();
        let observed_behaviors: Vec<String> =
            behaviors.iter().map(|b| b.as_ref().to_string()).collect();

        let frame_distance = sequence_distance(&record.tokens, &observed_tokens);
        let interpretation_match =
            normalize(&record.expected_interpretation) == normalize(interpretation);
        let mismatch = behavior_mismatch(&record.expected_behaviors, &observed_behaviors);
        let recorded_at = record.recorded_at;

        let c = &self.config;
        let weight_sum = c.frame_weight + c.interpretation_weight + c.behavior_weight;
        let interpretation_term = if interpretation_match { 0.0 } else { 1.0 };
        let drift_score = ((c.frame_weight * frame_distance
            + c.interpretation_weight * interpretation_term
            + c.behavior_weight * mismatch)
            / weight_sum)
            .clamp(0.0, 1.0);

        entry.drift_score = c.drift_smoothing * drift_score + (1.0 - c.drift_smoothing) * entry.drift_score;
        entry.comparisons += 1;
        let agent_drift = entry.drift_score;

        if drift_score > 0.0 {
            tracing::debug!(%agent, drift_score, agent_drift, "drift observed");
        }

        Some(DriftComparison {
            agent: agent.clone(),
            frame_hash: hash,
            has_baseline: true,
            drift_score,
            agent_drift,
            interpretation_match,
            behavior_match: mismatch == 0.0,
            frame_distance,
            behavior_mismatch: mismatch,
            baseline_recorded_at: Some(recorded_at),
        })
    }

    fn no_baseline(&self, agent: &AgentId, hash: FrameHash, running: f64) -> DriftComparison {
        DriftComparison {
            agent: agent.clone(),
            frame_hash: hash,
            has_baseline: false,
            drift_score: 0.0,
            agent_drift: running,
            interpretation_match: true,
            behavior_match: true,
            frame_distance: 0.0,
            behavior_mismatch: 0.0,
            baseline_recorded_at: None,
        }
    }

    /// Zero the running drift score, keeping all records.
    /// Returns false when the agent has no baselines.
    pub fn recalibrate_agent(&self, agent: &AgentId) -> bool {
        match self.agents.get_mut(agent) {
            Some(mut entry) => {
                entry.drift_score = 0.0;
                entry.recalibrated_at = Some(now());
                tracing::info!(%agent, records = entry.records.len(), "agent recalibrated");
                true
            }
            None => false,
        }
    }

    /// Drop every record for the agent
    pub fn clear_agent(&self, agent: &AgentId) -> bool {
        self.agents.remove(agent).is_some()
    }

    pub fn records(&self, agent: &AgentId) -> Vec<BaselineRecord> {
        self.agents
            .get(agent)
            .map(|a| a.records.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn agent_drift(&self, agent: &AgentId) -> f64 {
        self.agents.get(agent).map_or(0.0, |a| a.drift_score)
    }

    pub fn snapshot(&self, agent: &AgentId) -> Option<AgentBaselines> {
        self.agents.get(agent).map(|a| a.clone())
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }
}

impl Default for BaselineStore {
    fn default() -> Self {
        Self::new(BaselineConfig::default())
    }
}
