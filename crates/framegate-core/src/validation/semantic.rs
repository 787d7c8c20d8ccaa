//! Semantic tier: cross-symbol consistency within one frame

use super::{rules, Severity, ValidationFinding, ValidationTier};
use crate::frame::ResolvedFrame;
use crate::ontology::{names, SymbolCategory};

const TIER: ValidationTier = ValidationTier::Semantic;

/// Mode pairs of opposite strictness that may not appear together
pub const INCOMPATIBLE_MODES: &[(&str, &str)] = &[
    (names::STRICT, names::FLEXIBLE),
    (names::STRICT, names::FORBIDDEN),
];

pub fn check(frame: &ResolvedFrame) -> Vec<ValidationFinding> {
    let parsed = &frame.frame;
    let mut findings = Vec::with_capacity(5);

    let modes: Vec<&str> = parsed
        .symbols_of(SymbolCategory::Mode)
        .map(|s| s.canonical_name.as_str())
        .collect();
    let clash = INCOMPATIBLE_MODES
        .iter()
        .find(|(a, b)| modes.contains(a) && modes.contains(b));
    findings.push(match clash {
        None => ValidationFinding::pass(rules::SM_OPPOSING_MODES, TIER, "no opposing modes"),
        Some((a, b)) => ValidationFinding::fail(
            rules::SM_OPPOSING_MODES,
            TIER,
            Severity::Error,
            format!("modes {a} and {b} are of opposite strictness"),
        ),
    });

    let executes = parsed.has_action(names::EXECUTE);
    let forbidden_mode = modes.contains(&names::FORBIDDEN);
    findings.push(ValidationFinding::check(
        !(forbidden_mode && executes),
        rules::SM_FORBIDDEN_MODE_EXECUTE,
        TIER,
        Severity::Error,
        "no execution under forbidden mode",
        "execute action under the forbidden (exploratory) mode",
    ));

    findings.push(ValidationFinding::check(
        !(parsed.has_constraint(names::FORBIDDEN) && executes),
        rules::SM_FORBIDDEN_CONSTRAINT_EXECUTE,
        TIER,
        Severity::Warning,
        "no execution alongside forbidden constraint",
        "execute action alongside the forbidden constraint; execution may be vetoed downstream",
    ));

    findings.push(ValidationFinding::check(
        !parsed.has_action(names::DELEGATE) || parsed.entity().is_some(),
        rules::SM_DELEGATE_WITHOUT_ENTITY,
        TIER,
        Severity::Warning,
        "delegation target named",
        "delegate action without a target entity",
    ));

    let blocked = frame.blocked_symbols_present();
    findings.push(ValidationFinding::check(
        blocked.is_empty(),
        rules::SM_BLOCKED_SYMBOL,
        TIER,
        Severity::Error,
        "no overlay-blocked symbols",
        format!(
            "symbol(s) {} blocked by overlay {}",
            blocked.join(" "),
            frame.overlay.as_deref().unwrap_or("-")
        ),
    ));

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameResolver, PolicyOverlay};
    use crate::ontology::Ontology;
    use std::sync::Arc;

    fn resolver() -> FrameResolver {
        FrameResolver::new(Arc::new(Ontology::builtin()))
    }

    fn failed_with(resolver: &FrameResolver, raw: &str) -> Vec<(String, Severity)> {
        let resolved = resolver.parse_and_resolve(raw).unwrap();
        check(&resolved)
            .into_iter()
            .filter(|f| !f.passed)
            .map(|f| (f.rule_id, f.severity))
            .collect()
    }

    fn failed(raw: &str) -> Vec<(String, Severity)> {
        failed_with(&resolver(), raw)
    }

    #[test]
    fn test_consistent_frame() {
        assert!(failed("⊕◊▶β").is_empty());
    }

    #[test]
    fn test_opposing_modes() {
        assert_eq!(
            failed("⊕⊖◊▷"),
            vec![(rules::SM_OPPOSING_MODES.to_string(), Severity::Error)]
        );
        // neutral + flexible are not opposites
        assert!(failed("⊙⊖◊▷").is_empty());
    }

    #[test]
    fn test_forbidden_mode_with_execute() {
        assert_eq!(
            failed("⊗◊▶"),
            vec![(rules::SM_FORBIDDEN_MODE_EXECUTE.to_string(), Severity::Error)]
        );
        assert!(failed("⊗◊▷").is_empty());
    }

    #[test]
    fn test_forbidden_constraint_with_execute_is_warning() {
        assert_eq!(
            failed("⊕◊⛔▶"),
            vec![(
                rules::SM_FORBIDDEN_CONSTRAINT_EXECUTE.to_string(),
                Severity::Warning
            )]
        );
    }

    #[test]
    fn test_delegate_without_entity() {
        assert_eq!(
            failed("⊕◊▼"),
            vec![(rules::SM_DELEGATE_WITHOUT_ENTITY.to_string(), Severity::Warning)]
        );
        assert!(failed("⊕◊▼β").is_empty());
    }

    #[test]
    fn test_overlay_blocked_symbol() {
        let overlay = PolicyOverlay::new("no-delete").block_symbol("✗");
        let r = resolver().with_overlay(Arc::new(overlay)).unwrap();
        assert_eq!(
            failed_with(&r, "⊕◊✗"),
            vec![(rules::SM_BLOCKED_SYMBOL.to_string(), Severity::Error)]
        );
    }
}
