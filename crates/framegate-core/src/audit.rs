//! Audit trail
//!
//! Gate decisions, immutable violations, breaker transitions and operator
//! actions are handed to an [`AuditSink`]. Persisting them is the sink's
//! business; the engine only emits.

use crate::types::{now, AgentId, Timestamp};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    GateDecision,
    ImmutableViolation,
    CircuitOpened,
    CircuitClosed,
    AgentHalted,
    AgentRecalibrated,
    BaselineRecorded,
    DriftDetected,
    TripwireRun,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: Timestamp,
    pub event_type: AuditEventType,
    pub agent: Option<AgentId>,
    pub details: serde_json::Value,
}

impl AuditRecord {
    pub fn new(event_type: AuditEventType, agent: Option<&AgentId>, details: serde_json::Value) -> Self {
        Self {
            timestamp: now(),
            event_type,
            agent: agent.cloned(),
            details,
        }
    }
}

/// Destination for audit records
pub trait AuditSink: Send + Sync {
    fn record(&self, record: AuditRecord);
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _record: AuditRecord) {}
}

/// Bounded in-memory log, oldest entries dropped first
pub struct InMemoryAuditLog {
    entries: RwLock<VecDeque<AuditRecord>>,
    max_entries: usize,
}

impl InMemoryAuditLog {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            max_entries,
        }
    }

    /// Most recent records, newest first
    pub fn recent(&self, count: usize) -> Vec<AuditRecord> {
        self.entries.read().iter().rev().take(count).cloned().collect()
    }

    /// All records, oldest first
    pub fn all(&self) -> Vec<AuditRecord> {
        self.entries.read().iter().cloned().collect()
    }

    pub fn of_type(&self, event_type: AuditEventType) -> Vec<AuditRecord> {
        self.entries
            .read()
            .iter()
            .filter(|r| r.event_type == event_type)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl AuditSink for InMemoryAuditLog {
    fn record(&self, record: AuditRecord) {
        let mut entries = self.entries.write();
        entries.push_back(record);
        while entries.len() > self.max_entries {
            entries.pop_front();
        }
    }
}
