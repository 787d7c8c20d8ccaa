//! Frame parsing

use crate::ontology::{Ontology, Symbol, SymbolCategory, Token};
use crate::types::FrameHash;
use serde::{Deserialize, Serialize};

/// Confidence bonus for each of mode, domain and action being present
const SLOT_BONUS: f64 = 0.1;

/// Immutable structured view of a raw frame string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedFrame {
    raw: String,
    symbols: Vec<Symbol>,
    mode: Option<Symbol>,
    domain: Option<Symbol>,
    constraints: Vec<Symbol>,
    action: Option<Symbol>,
    modifiers: Vec<Symbol>,
    source: Option<Symbol>,
    entity: Option<Symbol>,
    unrecognized: Vec<String>,
    total_tokens: usize,
    confidence: f64,
    identity: FrameHash,
}

/// Parse a raw frame against an ontology.
///
/// Unrecognized tokens are dropped but still count against confidence.
/// Returns `None` when no token matched.
pub fn parse_frame(ontology: &Ontology, raw: &str) -> Option<ParsedFrame> {
    let tokens = ontology.tokenize(raw);
    let total_tokens = tokens.len();

    let mut symbols = Vec::new();
    let mut unrecognized = Vec::new();
    for token in tokens {
        match token {
            Token::Known(symbol) => symbols.push(symbol.clone()),
            Token::Unknown(text) => unrecognized.push(text),
        }
    }

    if symbols.is_empty() {
        tracing::debug!(raw, "frame has no recognized tokens");
        return None;
    }

    let first_of = |category: SymbolCategory| symbols.iter().find(|s| s.category() == category).cloned();
    let all_of = |category: SymbolCategory| -> Vec<Symbol> {
        symbols
            .iter()
            .filter(|s| s.category() == category)
            .cloned()
            .collect()
    };

    let mode = first_of(SymbolCategory::Mode);
    let domain = first_of(SymbolCategory::Domain);
    let action = first_of(SymbolCategory::Action);
    let source = first_of(SymbolCategory::Source);
    let entity = first_of(SymbolCategory::Entity);
    let constraints = all_of(SymbolCategory::Constraint);
    let modifiers = all_of(SymbolCategory::Modifier);

    let mut confidence = symbols.len() as f64 / total_tokens as f64;
    for present in [mode.is_some(), domain.is_some(), action.is_some()] {
        if present {
            confidence += SLOT_BONUS;
        }
    }
    // the bonus never lifts a frame with discarded tokens to full confidence
    let unrecognized_share = unrecognized.len() as f64 / total_tokens as f64;
    let confidence = confidence.min(1.0 - SLOT_BONUS * unrecognized_share);

    let identity = FrameHash::of_tokens(symbols.iter().map(|s| s.token.as_str()));

    tracing::debug!(raw, matched = symbols.len(), total_tokens, confidence, "parsed frame");

    Some(ParsedFrame {
        raw: raw.to_string(),
        symbols,
        mode,
        domain,
        constraints,
        action,
        modifiers,
        source,
        entity,
        unrecognized,
        total_tokens,
        confidence,
        identity,
    })
}

impl ParsedFrame {
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Matched symbols in frame order
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn mode(&self) -> Option<&Symbol> {
        self.mode.as_ref()
    }

    pub fn domain(&self) -> Option<&Symbol> {
        self.domain.as_ref()
    }

    pub fn constraints(&self) -> &[Symbol] {
        &self.constraints
    }

    pub fn action(&self) -> Option<&Symbol> {
        self.action.as_ref()
    }

    pub fn modifiers(&self) -> &[Symbol] {
        &self.modifiers
    }

    pub fn source(&self) -> Option<&Symbol> {
        self.source.as_ref()
    }

    pub fn entity(&self) -> Option<&Symbol> {
        self.entity.as_ref()
    }

    /// Tokens that did not match the ontology
    pub fn unrecognized(&self) -> &[String] {
        &self.unrecognized
    }

    /// Matched plus unrecognized tokens
    pub fn total_tokens(&self) -> usize {
        self.total_tokens
    }

    /// Parse confidence in [0, 1]
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Content-addressed identity over the matched symbol set
    pub fn identity(&self) -> FrameHash {
        self.identity
    }

    /// All matched symbols of a category, in frame order
    pub fn symbols_of(&self, category: SymbolCategory) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter().filter(move |s| s.category() == category)
    }

    pub fn has_constraint(&self, name: &str) -> bool {
        self.constraints.iter().any(|c| c.canonical_name == name)
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.action.as_ref().is_some_and(|a| a.canonical_name == name)
    }

    /// Matched tokens in frame order
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.symbols.iter().map(|s| s.token.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ontology::names;

    fn parse(raw: &str) -> Option<ParsedFrame> {
        parse_frame(&Ontology::builtin(), raw)
    }

    #[test]
    fn test_parse_full_frame() {
        let frame = parse("⊕◊▶β").unwrap();

        assert_eq!(frame.mode().unwrap().canonical_name, names::STRICT);
        assert_eq!(frame.domain().unwrap().canonical_name, "financial");
        assert_eq!(frame.action().unwrap().canonical_name, names::EXECUTE);
        assert_eq!(frame.entity().unwrap().canonical_name, "secondary_agent");
        assert!(frame.confidence() > 0.9);
        assert!(frame.unrecognized().is_empty());
    }

    #[test]
    fn test_parse_returns_none_without_matches() {
        assert!(parse("hello").is_none());
        assert!(parse("").is_none());
        assert!(parse("   ").is_none());
    }

    #[test]
    fn test_unrecognized_tokens_lower_confidence() {
        let clean = parse("⊕◊▶").unwrap();
        let noisy = parse("⊕xyz◊▶").unwrap();

        assert_eq!(noisy.symbols().len(), 3);
        assert_eq!(noisy.total_tokens(), 6);
        assert_eq!(noisy.unrecognized(), &["x", "y", "z"]);
        assert!(noisy.confidence() < clean.confidence());
        // 3/6 + 0.3 bonus
        assert!((noisy.confidence() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_noise_lowers_confidence_even_with_full_bonus() {
        let clean = parse("⊕◊▶β").unwrap();
        let noisy = parse("⊕◊x▶β").unwrap();
        assert_eq!(clean.confidence(), 1.0);
        // 4/5 + 0.3 bonus, held under 1 - 0.1 * 1/5
        assert!((noisy.confidence() - 0.98).abs() < 1e-9);
    }

    #[test]
    fn test_slot_bonus_only_for_present_slots() {
        let frame = parse("α?").unwrap();
        assert!((frame.confidence() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_slots_take_first_occurrence() {
        let frame = parse("⊕◊§▶⛔⚠").unwrap();
        assert_eq!(frame.domain().unwrap().canonical_name, "financial");
        assert_eq!(frame.constraints().len(), 2);
        assert_eq!(frame.symbols_of(SymbolCategory::Domain).count(), 2);
        assert!(frame.has_constraint(names::FORBIDDEN));
    }

    #[test]
    fn test_identity_depends_on_symbol_set_only() {
        let a = parse("⊕◊▶β").unwrap();
        let b = parse("⊕ β ▶ ◊").unwrap();
        let c = parse("⊕◊▶γ").unwrap();

        assert_eq!(a.identity(), b.identity());
        assert_ne!(a.identity(), c.identity());
    }

    #[test]
    fn test_parse_is_idempotent() {
        let a = parse("⊖§✍δ↑").unwrap();
        let b = parse("⊖§✍δ↑").unwrap();
        assert_eq!(a, b);
    }
}
