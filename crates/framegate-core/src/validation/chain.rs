//! Chain tier: a delegated child may not weaken what its parent imposed

use super::{rules, Severity, ValidationFinding, ValidationTier};
use crate::frame::ResolvedFrame;
use crate::ontology::names;

const TIER: ValidationTier = ValidationTier::Chain;

pub fn check(parent: &ResolvedFrame, child: &ResolvedFrame) -> Vec<ValidationFinding> {
    let mut findings = Vec::with_capacity(4);

    // Effective modes: a frame without a mode counts as neutral.
    let parent_mode = parent.mode.canonical_name();
    let child_mode = child.mode.canonical_name();
    let weakened = match (parent.mode_strength(), child.mode_strength()) {
        (Some(p), Some(c)) => c > p,
        _ => false,
    };
    findings.push(ValidationFinding::check(
        !weakened,
        rules::CH_MODE_WEAKENED,
        TIER,
        Severity::Error,
        format!("child mode {child_mode} preserves parent mode {parent_mode}"),
        format!(
            "child mode {child_mode} (strength {}) is weaker than parent mode {parent_mode} (strength {})",
            child.mode_strength().unwrap_or_default(),
            parent.mode_strength().unwrap_or_default()
        ),
    ));

    findings.push(ValidationFinding::check(
        !parent.has_forbidden_constraint() || child.has_forbidden_constraint(),
        rules::CH_FORBIDDEN_DROPPED,
        TIER,
        Severity::Error,
        "forbidden constraint propagated",
        "parent carries the forbidden constraint but the child does not",
    ));

    let domain_changed = match (parent.frame.domain(), child.frame.domain()) {
        (Some(p), Some(c)) => p.canonical_name != c.canonical_name,
        _ => false,
    };
    findings.push(ValidationFinding::check(
        !domain_changed,
        rules::CH_DOMAIN_CHANGED,
        TIER,
        Severity::Warning,
        "domain continuous",
        format!(
            "domain changed from {} to {}",
            parent.domain.canonical_name(),
            child.domain.canonical_name()
        ),
    ));

    let dropped: Vec<&str> = parent
        .frame
        .constraints()
        .iter()
        .map(|c| c.canonical_name.as_str())
        .filter(|name| *name != names::FORBIDDEN && !child.frame.has_constraint(name))
        .collect();
    findings.push(ValidationFinding::check(
        dropped.is_empty(),
        rules::CH_CONSTRAINT_DROPPED,
        TIER,
        Severity::Warning,
        "inherited constraints kept",
        format!("inherited constraint(s) dropped: {}", dropped.join(", ")),
    ));

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameResolver;
    use crate::ontology::Ontology;
    use std::sync::Arc;

    fn failed(parent: &str, child: &str) -> Vec<(String, Severity)> {
        let resolver = FrameResolver::new(Arc::new(Ontology::builtin()));
        let p = resolver.parse_and_resolve(parent).unwrap();
        let c = resolver.parse_and_resolve(child).unwrap();
        check(&p, &c)
            .into_iter()
            .filter(|f| !f.passed)
            .map(|f| (f.rule_id, f.severity))
            .collect()
    }

    fn ids(parent: &str, child: &str) -> Vec<String> {
        failed(parent, child).into_iter().map(|(id, _)| id).collect()
    }

    #[test]
    fn test_mode_weakening_and_forbidden_drop() {
        assert_eq!(
            ids("⊕◊⛔▼α", "⊖◊▶β"),
            vec![rules::CH_MODE_WEAKENED, rules::CH_FORBIDDEN_DROPPED]
        );
    }

    #[test]
    fn test_tightening_is_allowed() {
        assert!(ids("⊖◊▼α", "⊕◊▶β").is_empty());
        assert!(ids("⊙◊▼α", "⊙◊▶β").is_empty());
    }

    #[test]
    fn test_missing_child_mode_counts_as_neutral() {
        // strict parent, modeless child (neutral 2 > strict 1)
        assert_eq!(ids("⊕◊▼α", "◊▶β"), vec![rules::CH_MODE_WEAKENED]);
        // flexible parent, modeless child is fine
        assert!(ids("⊖◊▼α", "◊▶β").is_empty());
    }

    #[test]
    fn test_domain_change_is_warning() {
        assert_eq!(
            failed("⊕◊▼α", "⊕§▶β"),
            vec![(rules::CH_DOMAIN_CHANGED.to_string(), Severity::Warning)]
        );
        // absent child domain is not a change
        assert!(ids("⊕◊▼α", "⊕▶β").is_empty());
    }

    #[test]
    fn test_dropped_constraint_is_warning() {
        assert_eq!(
            failed("⊕◊🔒⚠▼α", "⊕◊🔒▶β"),
            vec![(rules::CH_CONSTRAINT_DROPPED.to_string(), Severity::Warning)]
        );
    }

    #[test]
    fn test_forbidden_drop_reported_once() {
        // CH-002 covers the forbidden constraint; CH-004 must not repeat it
        assert_eq!(ids("⊕◊⛔▼α", "⊕◊▶β"), vec![rules::CH_FORBIDDEN_DROPPED]);
    }
}
