//! Three-Tier Frame Validator
//!
//! ```text
//!   ResolvedFrame ──► structural (SR-*)  frame-local shape
//!                 ──► semantic   (SM-*)  cross-symbol consistency
//!   + parent      ──► chain      (CH-*)  inheritance across delegation
//!                         │
//!                         ▼
//!                  ValidationReport (valid = no Error-severity finding)
//! ```
//!
//! Every evaluated rule yields a finding. Passing rules are recorded with
//! `Severity::Info` so audit trails show what was checked, not only what
//! failed. Warnings never make a report invalid.

pub mod chain;
pub mod semantic;
pub mod structural;

use crate::config::ValidatorConfig;
use crate::frame::{FrameResolver, ResolvedFrame};
use crate::types::{now, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable rule identifiers
pub mod rules {
    pub const SR_UNPARSEABLE: &str = "SR-000";
    pub const SR_MIN_LENGTH: &str = "SR-001";
    pub const SR_MODE_FIRST: &str = "SR-002";
    pub const SR_DUPLICATE_MODE: &str = "SR-003";
    pub const SR_UNRECOGNIZED: &str = "SR-004";
    pub const SR_DUPLICATE_SLOT: &str = "SR-005";

    pub const SM_OPPOSING_MODES: &str = "SM-001";
    pub const SM_FORBIDDEN_MODE_EXECUTE: &str = "SM-002";
    pub const SM_FORBIDDEN_CONSTRAINT_EXECUTE: &str = "SM-003";
    pub const SM_DELEGATE_WITHOUT_ENTITY: &str = "SM-004";
    pub const SM_BLOCKED_SYMBOL: &str = "SM-005";

    pub const CH_UNPARSEABLE_PARENT: &str = "CH-000";
    pub const CH_MODE_WEAKENED: &str = "CH-001";
    pub const CH_FORBIDDEN_DROPPED: &str = "CH-002";
    pub const CH_DOMAIN_CHANGED: &str = "CH-003";
    pub const CH_CONSTRAINT_DROPPED: &str = "CH-004";
}

/// Validation tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationTier {
    Structural,
    Semantic,
    Chain,
}

/// Finding severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(s)
    }
}

/// One rule evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFinding {
    pub rule_id: String,
    pub tier: ValidationTier,
    pub passed: bool,
    pub severity: Severity,
    pub message: String,
}

impl ValidationFinding {
    pub fn pass(rule_id: &str, tier: ValidationTier, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            tier,
            passed: true,
            severity: Severity::Info,
            message: message.into(),
        }
    }

    pub fn fail(
        rule_id: &str,
        tier: ValidationTier,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            tier,
            passed: false,
            severity,
            message: message.into(),
        }
    }

    /// Pass, or fail with the given severity
    pub fn check(
        ok: bool,
        rule_id: &str,
        tier: ValidationTier,
        severity: Severity,
        pass_msg: impl Into<String>,
        fail_msg: impl Into<String>,
    ) -> Self {
        if ok {
            Self::pass(rule_id, tier, pass_msg)
        } else {
            Self::fail(rule_id, tier, severity, fail_msg)
        }
    }
}

/// Aggregated findings for one frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub frame: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub findings: Vec<ValidationFinding>,
    pub valid: bool,
    pub validated_at: Timestamp,
}

impl ValidationReport {
    pub fn new(frame: impl Into<String>, parent: Option<String>, findings: Vec<ValidationFinding>) -> Self {
        let valid = !findings.iter().any(|f| f.severity == Severity::Error);
        Self {
            frame: frame.into(),
            parent,
            findings,
            valid,
            validated_at: now(),
        }
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationFinding> {
        self.findings.iter().filter(|f| f.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationFinding> {
        self.findings.iter().filter(|f| f.severity == Severity::Warning)
    }

    pub fn failed(&self) -> impl Iterator<Item = &ValidationFinding> {
        self.findings.iter().filter(|f| !f.passed)
    }

    /// Whether the given rule failed
    pub fn violates(&self, rule_id: &str) -> bool {
        self.failed().any(|f| f.rule_id == rule_id)
    }

    pub fn tier_passed(&self, tier: ValidationTier) -> bool {
        !self
            .findings
            .iter()
            .any(|f| f.tier == tier && f.severity == Severity::Error)
    }
}

/// Runs all three tiers
#[derive(Debug, Clone)]
pub struct FrameValidator {
    resolver: FrameResolver,
    config: ValidatorConfig,
}

impl FrameValidator {
    pub fn new(resolver: FrameResolver, config: ValidatorConfig) -> Self {
        Self { resolver, config }
    }

    pub fn resolver(&self) -> &FrameResolver {
        &self.resolver
    }

    /// Validate a raw frame, optionally against its parent
    pub fn validate(&self, raw: &str, parent: Option<&str>) -> ValidationReport {
        let resolved = match self.resolver.parse_and_resolve(raw) {
            Some(resolved) => resolved,
            None => {
                let finding = ValidationFinding::fail(
                    rules::SR_UNPARSEABLE,
                    ValidationTier::Structural,
                    Severity::Error,
                    format!("no recognized symbols in {raw:?}"),
                );
                return ValidationReport::new(raw, parent.map(str::to_string), vec![finding]);
            }
        };

        match parent {
            None => self.validate_resolved(&resolved, None),
            Some(parent_raw) => match self.resolver.parse_and_resolve(parent_raw) {
                Some(parent_resolved) => self.validate_resolved(&resolved, Some(&parent_resolved)),
                None => {
                    let mut findings = self.local_findings(&resolved);
                    findings.push(ValidationFinding::fail(
                        rules::CH_UNPARSEABLE_PARENT,
                        ValidationTier::Chain,
                        Severity::Error,
                        format!("parent frame {parent_raw:?} has no recognized symbols"),
                    ));
                    ValidationReport::new(raw, Some(parent_raw.to_string()), findings)
                }
            },
        }
    }

    /// Validate an already resolved frame
    pub fn validate_resolved(
        &self,
        frame: &ResolvedFrame,
        parent: Option<&ResolvedFrame>,
    ) -> ValidationReport {
        let mut findings = self.local_findings(frame);
        if let Some(parent) = parent {
            findings.extend(chain::check(parent, frame));
        }

        let report = ValidationReport::new(
            frame.frame.raw(),
            parent.map(|p| p.frame.raw().to_string()),
            findings,
        );
        if !report.valid {
            tracing::debug!(
                frame = frame.frame.raw(),
                errors = report.errors().count(),
                "frame rejected"
            );
        }
        report
    }

    /// Validate a delegation chain root-first; one report per frame, each
    /// checked against its predecessor.
    pub fn validate_chain(&self, frames: &[&str]) -> Vec<ValidationReport> {
        frames
            .iter()
            .enumerate()
            .map(|(i, raw)| {
                let parent = if i == 0 { None } else { Some(frames[i - 1]) };
                self.validate(raw, parent)
            })
            .collect()
    }

    fn local_findings(&self, frame: &ResolvedFrame) -> Vec<ValidationFinding> {
        let mut findings = structural::check(frame, &self.config);
        findings.extend(semantic::check(frame));
        findings
    }
}
