//! Structural tier: frame-local shape, no prior knowledge required

use super::{rules, Severity, ValidationFinding, ValidationTier};
use crate::config::ValidatorConfig;
use crate::frame::ResolvedFrame;
use crate::ontology::SymbolCategory;

const TIER: ValidationTier = ValidationTier::Structural;

/// Categories that fill a single slot; extra occurrences are ignored by the parser
const SINGLE_SLOTS: &[SymbolCategory] = &[
    SymbolCategory::Domain,
    SymbolCategory::Action,
    SymbolCategory::Source,
    SymbolCategory::Entity,
];

pub fn check(frame: &ResolvedFrame, config: &ValidatorConfig) -> Vec<ValidationFinding> {
    let parsed = &frame.frame;
    let mut findings = Vec::with_capacity(5);

    let len = parsed.symbols().len();
    findings.push(ValidationFinding::check(
        len >= config.min_symbols,
        rules::SR_MIN_LENGTH,
        TIER,
        Severity::Error,
        format!("frame has {len} symbols"),
        format!(
            "frame has {len} symbols, minimum is {}",
            config.min_symbols
        ),
    ));

    let mode_count = parsed.symbols_of(SymbolCategory::Mode).count();
    let first_is_mode = parsed
        .symbols()
        .first()
        .is_some_and(|s| s.category() == SymbolCategory::Mode);
    let mode_first_msg = if mode_count == 0 {
        "frame has no mode symbol".to_string()
    } else {
        "mode symbol must be the first token".to_string()
    };
    findings.push(ValidationFinding::check(
        first_is_mode,
        rules::SR_MODE_FIRST,
        TIER,
        Severity::Error,
        "mode leads the frame",
        mode_first_msg,
    ));

    findings.push(ValidationFinding::check(
        mode_count <= 1,
        rules::SR_DUPLICATE_MODE,
        TIER,
        Severity::Error,
        "single mode symbol",
        format!("frame has {mode_count} mode symbols, at most one is allowed"),
    ));

    let unknown = parsed.unrecognized();
    findings.push(ValidationFinding::check(
        unknown.is_empty(),
        rules::SR_UNRECOGNIZED,
        TIER,
        Severity::Warning,
        "all tokens recognized",
        format!(
            "{} unrecognized token(s) discarded: {}",
            unknown.len(),
            unknown.join(" ")
        ),
    ));

    let crowded: Vec<String> = SINGLE_SLOTS
        .iter()
        .filter(|category| parsed.symbols_of(**category).count() > 1)
        .map(|category| category.to_string())
        .collect();
    findings.push(ValidationFinding::check(
        crowded.is_empty(),
        rules::SR_DUPLICATE_SLOT,
        TIER,
        Severity::Warning,
        "single-slot categories appear at most once",
        format!(
            "multiple symbols for {}; only the first is used",
            crowded.join(", ")
        ),
    ));

    findings
}
