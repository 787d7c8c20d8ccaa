//! Symbol Ontology
//!
//! A fixed table mapping every frame token to one of seven semantic
//! categories. Modes and constraints carry a numeric strength; for modes the
//! strengths are distinct and totally ordered from most restrictive (low) to
//! most permissive (high).
//!
//! ```text
//!   token ──► Symbol { canonical_name, kind }
//!                          │
//!            ┌─────────────┼──────────────────────────────┐
//!            ▼             ▼                              ▼
//!     Mode{strength}   Constraint{strength}   Domain │ Action │ Modifier │ Source │ Entity
//! ```
//!
//! Ontologies are immutable once built and are shared behind `Arc`. A corrupt
//! table is rejected at construction time with an [`OntologyError`].

mod builtin;

pub use builtin::builtin_symbols;

use crate::error::{FrameGateError, OntologyError, Result, ResultExt};
use crate::frame::ParsedFrame;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

/// Canonical names the validator and resolver rely on
pub mod names {
    pub const STRICT: &str = "strict";
    pub const NEUTRAL: &str = "neutral";
    pub const FLEXIBLE: &str = "flexible";
    pub const FORBIDDEN: &str = "forbidden";
    pub const EXECUTE: &str = "execute";
    pub const WRITE: &str = "write";
    pub const DELETE: &str = "delete";
    pub const DELEGATE: &str = "delegate";
    pub const PROPOSE: &str = "propose";
    pub const OPERATIONAL: &str = "operational";
}

/// Semantic category of a symbol, without category-specific attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolCategory {
    Mode,
    Domain,
    Constraint,
    Action,
    Modifier,
    Source,
    Entity,
}

impl fmt::Display for SymbolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SymbolCategory::Mode => "mode",
            SymbolCategory::Domain => "domain",
            SymbolCategory::Constraint => "constraint",
            SymbolCategory::Action => "action",
            SymbolCategory::Modifier => "modifier",
            SymbolCategory::Source => "source",
            SymbolCategory::Entity => "entity",
        };
        f.write_str(s)
    }
}

/// Category plus the attributes only that category carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum SymbolKind {
    Mode { strength: u8 },
    Domain,
    Constraint { strength: u8 },
    Action,
    Modifier,
    Source,
    Entity,
}

impl SymbolKind {
    pub fn category(&self) -> SymbolCategory {
        match self {
            SymbolKind::Mode { .. } => SymbolCategory::Mode,
            SymbolKind::Domain => SymbolCategory::Domain,
            SymbolKind::Constraint { .. } => SymbolCategory::Constraint,
            SymbolKind::Action => SymbolCategory::Action,
            SymbolKind::Modifier => SymbolCategory::Modifier,
            SymbolKind::Source => SymbolCategory::Source,
            SymbolKind::Entity => SymbolCategory::Entity,
        }
    }

    /// Strength for modes and constraints, `None` otherwise
    pub fn strength(&self) -> Option<u8> {
        match self {
            SymbolKind::Mode { strength } | SymbolKind::Constraint { strength } => Some(*strength),
            SymbolKind::Domain
            | SymbolKind::Action
            | SymbolKind::Modifier
            | SymbolKind::Source
            | SymbolKind::Entity => None,
        }
    }
}

/// One ontology entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    /// The token as it appears in a frame
    pub token: String,

    /// Stable machine name (e.g. `strict`, `financial`, `execute`)
    pub canonical_name: String,

    /// Human readable gloss
    #[serde(default)]
    pub description: String,

    /// Category and category-specific attributes
    #[serde(flatten)]
    pub kind: SymbolKind,
}

impl Symbol {
    pub fn new(token: impl Into<String>, canonical_name: impl Into<String>, kind: SymbolKind) -> Self {
        Self {
            token: token.into(),
            canonical_name: canonical_name.into(),
            description: String::new(),
            kind,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn category(&self) -> SymbolCategory {
        self.kind.category()
    }

    pub fn strength(&self) -> Option<u8> {
        self.kind.strength()
    }

    pub fn is(&self, category: SymbolCategory, name: &str) -> bool {
        self.category() == category && self.canonical_name == name
    }
}

/// On-disk representation of an ontology
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OntologyFile {
    symbols: Vec<Symbol>,
}

/// One scanned token: either an ontology hit or an unrecognized run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    Known(&'a Symbol),
    Unknown(String),
}

/// Immutable symbol table
#[derive(Debug, Clone)]
pub struct Ontology {
    symbols: Vec<Symbol>,
    by_token: HashMap<String, usize>,
    max_token_chars: usize,
}

/// Characters that never form tokens on their own
fn is_ignorable(c: char) -> bool {
    c.is_whitespace() || matches!(c, '\u{FE0E}' | '\u{FE0F}' | '\u{200D}')
}

fn normalize_token(token: &str) -> String {
    token.chars().filter(|c| !is_ignorable(*c)).collect()
}

/// Symbols every ontology must define, since validation rules refer to them
const REQUIRED: &[(SymbolCategory, &str)] = &[
    (SymbolCategory::Mode, names::STRICT),
    (SymbolCategory::Mode, names::NEUTRAL),
    (SymbolCategory::Mode, names::FORBIDDEN),
    (SymbolCategory::Constraint, names::FORBIDDEN),
    (SymbolCategory::Domain, names::OPERATIONAL),
    (SymbolCategory::Action, names::EXECUTE),
    (SymbolCategory::Action, names::PROPOSE),
];

impl Ontology {
    /// The built-in symbol table
    pub fn builtin() -> Self {
        Self::index(builtin_symbols())
    }

    /// Build an ontology from a list of symbols, validating every invariant
    pub fn from_symbols(symbols: Vec<Symbol>) -> std::result::Result<Self, OntologyError> {
        if symbols.is_empty() {
            return Err(OntologyError::Empty);
        }

        let mut symbols = symbols;
        let mut tokens = HashSet::new();
        let mut names = HashSet::new();
        let mut mode_strengths: HashMap<u8, String> = HashMap::new();

        for symbol in symbols.iter_mut() {
            symbol.token = normalize_token(&symbol.token);
            if symbol.token.is_empty() {
                return Err(OntologyError::EmptyToken(symbol.canonical_name.clone()));
            }
            if !tokens.insert(symbol.token.clone()) {
                return Err(OntologyError::DuplicateToken(symbol.token.clone()));
            }
            if !names.insert((symbol.category(), symbol.canonical_name.clone())) {
                return Err(OntologyError::DuplicateName {
                    category: symbol.category().to_string(),
                    name: symbol.canonical_name.clone(),
                });
            }
            if let SymbolKind::Mode { strength } = symbol.kind {
                if let Some(first) = mode_strengths.insert(strength, symbol.canonical_name.clone()) {
                    return Err(OntologyError::NonDistinctModeStrength {
                        first,
                        second: symbol.canonical_name.clone(),
                        strength,
                    });
                }
            }
        }

        for (category, name) in REQUIRED {
            if !names.contains(&(*category, name.to_string())) {
                return Err(OntologyError::MissingRequired {
                    category: category.to_string(),
                    name: name.to_string(),
                });
            }
        }

        Ok(Self::index(symbols))
    }

    /// Parse an ontology from TOML (`[[symbols]]` tables)
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let file: OntologyFile = toml::from_str(s)?;
        Ok(Self::from_symbols(file.symbols)?)
    }

    /// Load an ontology from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(FrameGateError::from)
            .with_context(|| format!("Failed to read ontology {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid ontology {}", path.display()))
    }

    /// Serialize the ontology to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        let file = OntologyFile {
            symbols: self.symbols.clone(),
        };
        Ok(toml::to_string_pretty(&file)?)
    }

    fn index(symbols: Vec<Symbol>) -> Self {
        let by_token = symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (s.token.clone(), i))
            .collect();
        let max_token_chars = symbols
            .iter()
            .map(|s| s.token.chars().count())
            .max()
            .unwrap_or(1);

        Self {
            symbols,
            by_token,
            max_token_chars,
        }
    }

    /// Look up a single token
    pub fn lookup(&self, token: &str) -> Option<&Symbol> {
        self.by_token.get(token).map(|&i| &self.symbols[i])
    }

    /// Find a symbol by category and canonical name
    pub fn find(&self, category: SymbolCategory, name: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.is(category, name))
    }

    /// Strength of the named mode
    pub fn mode_strength(&self, name: &str) -> Option<u8> {
        self.find(SymbolCategory::Mode, name).and_then(Symbol::strength)
    }

    /// All symbols in table order
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Symbols of one category
    pub fn by_category(&self, category: SymbolCategory) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter().filter(move |s| s.category() == category)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Split a raw frame into tokens, matching the longest known token first.
    ///
    /// Whitespace, variation selectors and zero-width joiners are skipped.
    /// Every unmatched character becomes its own `Token::Unknown`.
    pub fn tokenize(&self, raw: &str) -> Vec<Token<'_>> {
        let chars: Vec<char> = raw.chars().filter(|c| !is_ignorable(*c)).collect();
        let mut tokens = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            let longest = self.max_token_chars.min(chars.len() - i);
            let hit = (1..=longest).rev().find_map(|len| {
                let candidate: String = chars[i..i + len].iter().collect();
                self.lookup(&candidate).map(|symbol| (symbol, len))
            });

            match hit {
                Some((symbol, len)) => {
                    tokens.push(Token::Known(symbol));
                    i += len;
                }
                None => {
                    tokens.push(Token::Unknown(chars[i].to_string()));
                    i += 1;
                }
            }
        }

        tokens
    }

    /// Deterministic textual interpretation of a frame.
    ///
    /// Used as the default expected interpretation when a baseline is
    /// recorded automatically.
    pub fn describe(&self, frame: &ParsedFrame) -> String {
        let mut parts = Vec::new();
        let mode = frame.mode().map_or(names::NEUTRAL, |s| s.canonical_name.as_str());
        parts.push(format!("mode={mode}"));
        if let Some(domain) = frame.domain() {
            parts.push(format!("domain={}", domain.canonical_name));
        }
        let mut constraints: Vec<&str> = frame
            .constraints()
            .iter()
            .map(|s| s.canonical_name.as_str())
            .collect();
        constraints.sort_unstable();
        if !constraints.is_empty() {
            parts.push(format!("constraints={}", constraints.join(",")));
        }
        if let Some(action) = frame.action() {
            parts.push(format!("action={}", action.canonical_name));
        }
        if let Some(entity) = frame.entity() {
            parts.push(format!("entity={}", entity.canonical_name));
        }
        parts.join(" ")
    }
}

impl Default for Ontology {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_passes_validation() {
        let validated = Ontology::from_symbols(builtin_symbols());
        assert!(validated.is_ok(), "{:?}", validated.err());
        assert_eq!(validated.unwrap().len(), Ontology::builtin().len());
    }

    #[test]
    fn test_mode_strengths_strictly_ordered() {
        let ontology = Ontology::builtin();
        let strict = ontology.mode_strength(names::STRICT).unwrap();
        let neutral = ontology.mode_strength(names::NEUTRAL).unwrap();
        let flexible = ontology.mode_strength(names::FLEXIBLE).unwrap();
        let forbidden = ontology.mode_strength(names::FORBIDDEN).unwrap();
        assert!(strict < neutral && neutral < flexible && flexible < forbidden);
    }

    #[test]
    fn test_rejects_duplicate_token() {
        let mut symbols = builtin_symbols();
        symbols.push(Symbol::new("⊕", "another", SymbolKind::Modifier));
        assert_eq!(
            Ontology::from_symbols(symbols).unwrap_err(),
            OntologyError::DuplicateToken("⊕".to_string())
        );
    }

    #[test]
    fn test_rejects_shared_mode_strength() {
        let mut symbols = builtin_symbols();
        symbols.push(Symbol::new("⊚", "cautious", SymbolKind::Mode { strength: 1 }));
        assert!(matches!(
            Ontology::from_symbols(symbols),
            Err(OntologyError::NonDistinctModeStrength { strength: 1, .. })
        ));
    }

    #[test]
    fn test_rejects_missing_required_symbol() {
        let symbols: Vec<Symbol> = builtin_symbols()
            .into_iter()
            .filter(|s| !s.is(SymbolCategory::Action, names::EXECUTE))
            .collect();
        assert!(matches!(
            Ontology::from_symbols(symbols),
            Err(OntologyError::MissingRequired { .. })
        ));
    }

    #[test]
    fn test_variation_selector_is_stripped() {
        let ontology = Ontology::builtin();
        let tokens = ontology.tokenize("⊕ ⚠\u{FE0F}▶");
        assert_eq!(tokens.len(), 3);
        assert!(tokens.iter().all(|t| matches!(t, Token::Known(_))));
    }

    #[test]
    fn test_unknown_characters_are_single_tokens() {
        let ontology = Ontology::builtin();
        let tokens = ontology.tokenize("⊕xy");
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1], Token::Unknown("x".to_string()));
    }

    #[test]
    fn test_multi_char_tokens_match_longest_first() {
        let mut symbols = builtin_symbols();
        symbols.push(Symbol::new("▶▶", "execute_batch", SymbolKind::Action));
        let ontology = Ontology::from_symbols(symbols).unwrap();

        let tokens = ontology.tokenize("⊕▶▶▶");
        let names: Vec<&str> = tokens
            .iter()
            .filter_map(|t| match t {
                Token::Known(s) => Some(s.canonical_name.as_str()),
                Token::Unknown(_) => None,
            })
            .collect();
        assert_eq!(names, vec!["strict", "execute_batch", "execute"]);
    }

    #[test]
    fn test_toml_roundtrip() {
        let ontology = Ontology::builtin();
        let toml = ontology.to_toml_string().unwrap();
        let loaded = Ontology::from_toml_str(&toml).unwrap();
        assert_eq!(loaded.symbols(), ontology.symbols());
    }

    #[test]
    fn test_toml_corrupt_table_fails_fast() {
        let toml = r#"
            [[symbols]]
            token = "⊕"
            canonical_name = "strict"
            category = "mode"
            strength = 1

            [[symbols]]
            token = "⊕"
            canonical_name = "neutral"
            category = "mode"
            strength = 2
        "#;
        assert!(Ontology::from_toml_str(toml).is_err());
    }
}
