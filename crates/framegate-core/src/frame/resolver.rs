//! Frame resolution: ontology defaults + overlay overrides + tool policy

use super::overlay::{pattern_matches, PolicyOverlay};
use super::parser::{parse_frame, ParsedFrame};
use crate::error::Result;
use crate::ontology::{names, Ontology, Symbol, SymbolCategory, SymbolKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Tool patterns blocked whenever a frame carries the forbidden constraint
pub const FORBIDDEN_TOOL_PATTERNS: &[&str] = &["*exec*", "*write*", "*delete*"];

/// A symbol after overlay overrides have been applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveSymbol {
    pub symbol: Symbol,
    pub description: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// An overlay override was applied
    pub overridden: bool,
    /// The frame lacked this slot and the default was substituted
    pub defaulted: bool,
}

impl EffectiveSymbol {
    fn from_symbol(symbol: &Symbol, overlay: Option<&PolicyOverlay>, defaulted: bool) -> Self {
        let over = overlay.and_then(|o| o.get(&symbol.token));
        Self {
            symbol: symbol.clone(),
            description: over
                .and_then(|o| o.description.clone())
                .unwrap_or_else(|| symbol.description.clone()),
            metadata: over.map(|o| o.metadata.clone()).unwrap_or_default(),
            overridden: over.is_some(),
            defaulted,
        }
    }

    pub fn canonical_name(&self) -> &str {
        &self.symbol.canonical_name
    }
}

/// A parsed frame with effective definitions and tool policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedFrame {
    pub frame: ParsedFrame,
    pub mode: EffectiveSymbol,
    pub domain: EffectiveSymbol,
    pub constraints: Vec<EffectiveSymbol>,
    pub action: EffectiveSymbol,
    /// Tokens the active overlay blocks
    pub blocked_symbols: BTreeSet<String>,
    pub allowed_tools: BTreeSet<String>,
    pub blocked_tools: BTreeSet<String>,
    /// Name of the overlay in force, if any
    pub overlay: Option<String>,
}

impl ResolvedFrame {
    /// Effective mode strength
    pub fn mode_strength(&self) -> Option<u8> {
        self.mode.symbol.strength()
    }

    /// Frame tokens the overlay blocks
    pub fn blocked_symbols_present(&self) -> Vec<&str> {
        self.frame
            .tokens()
            .filter(|t| self.blocked_symbols.contains(*t))
            .collect()
    }

    pub fn has_forbidden_constraint(&self) -> bool {
        self.frame.has_constraint(names::FORBIDDEN)
    }

    /// Whether a tool may be invoked under this frame.
    ///
    /// Block patterns win over allow patterns. Without an overlay everything
    /// not blocked is allowed; with an overlay a tool needs a matching allow
    /// pattern.
    pub fn is_tool_allowed(&self, tool_name: &str) -> bool {
        if self.blocked_tools.iter().any(|p| pattern_matches(p, tool_name)) {
            return false;
        }
        if self.overlay.is_none() {
            return true;
        }
        self.allowed_tools.iter().any(|p| pattern_matches(p, tool_name))
    }
}

/// Free-function form of [`ResolvedFrame::is_tool_allowed`]
pub fn is_tool_allowed(resolved: &ResolvedFrame, tool_name: &str) -> bool {
    resolved.is_tool_allowed(tool_name)
}

fn default_symbol(ontology: &Ontology, category: SymbolCategory, name: &str) -> Symbol {
    ontology.find(category, name).cloned().unwrap_or_else(|| {
        let kind = match category {
            SymbolCategory::Mode => SymbolKind::Mode {
                strength: ontology.mode_strength(names::NEUTRAL).unwrap_or(2),
            },
            SymbolCategory::Domain => SymbolKind::Domain,
            _ => SymbolKind::Action,
        };
        Symbol::new("", name, kind)
    })
}

/// Resolve a parsed frame against an ontology and optional overlay
pub fn resolve_frame(
    ontology: &Ontology,
    parsed: &ParsedFrame,
    overlay: Option<&PolicyOverlay>,
) -> ResolvedFrame {
    let effective = |slot: Option<&Symbol>, category: SymbolCategory, default: &str| match slot {
        Some(symbol) => EffectiveSymbol::from_symbol(symbol, overlay, false),
        None => EffectiveSymbol::from_symbol(&default_symbol(ontology, category, default), overlay, true),
    };

    let mode = effective(parsed.mode(), SymbolCategory::Mode, names::NEUTRAL);
    let domain = effective(parsed.domain(), SymbolCategory::Domain, names::OPERATIONAL);
    let action = effective(parsed.action(), SymbolCategory::Action, names::PROPOSE);
    let constraints = parsed
        .constraints()
        .iter()
        .map(|c| EffectiveSymbol::from_symbol(c, overlay, false))
        .collect();

    let mut allowed_tools = BTreeSet::new();
    let mut blocked_tools = BTreeSet::new();
    let mut blocked_symbols = BTreeSet::new();

    if let Some(overlay) = overlay {
        blocked_symbols.extend(overlay.blocked_tokens().map(str::to_string));
        for symbol in parsed.symbols() {
            if let Some(over) = overlay.get(&symbol.token) {
                allowed_tools.extend(over.tools.allow.iter().cloned());
                blocked_tools.extend(over.tools.block.iter().cloned());
            }
        }
    }

    // Applied last: can only add restrictions.
    if parsed.has_constraint(names::FORBIDDEN) {
        blocked_tools.extend(FORBIDDEN_TOOL_PATTERNS.iter().map(|p| p.to_string()));
    }

    tracing::debug!(
        raw = parsed.raw(),
        mode = mode.canonical_name(),
        overlay = overlay.map(|o| o.name.as_str()),
        blocked_tools = blocked_tools.len(),
        "resolved frame"
    );

    ResolvedFrame {
        frame: parsed.clone(),
        mode,
        domain,
        constraints,
        action,
        blocked_symbols,
        allowed_tools,
        blocked_tools,
        overlay: overlay.map(|o| o.name.clone()),
    }
}

/// Parser + resolver bound to one ontology and, optionally, one overlay
#[derive(Debug, Clone)]
pub struct FrameResolver {
    ontology: Arc<Ontology>,
    overlay: Option<Arc<PolicyOverlay>>,
}

impl FrameResolver {
    pub fn new(ontology: Arc<Ontology>) -> Self {
        Self {
            ontology,
            overlay: None,
        }
    }

    /// A resolver with the given overlay in force. The overlay is checked
    /// against the ontology first.
    pub fn with_overlay(&self, overlay: Arc<PolicyOverlay>) -> Result<Self> {
        overlay.check_against(&self.ontology)?;
        Ok(Self {
            ontology: Arc::clone(&self.ontology),
            overlay: Some(overlay),
        })
    }

    pub fn without_overlay(&self) -> Self {
        Self::new(Arc::clone(&self.ontology))
    }

    pub fn ontology(&self) -> &Arc<Ontology> {
        &self.ontology
    }

    pub fn overlay(&self) -> Option<&PolicyOverlay> {
        self.overlay.as_deref()
    }

    pub fn parse(&self, raw: &str) -> Option<ParsedFrame> {
        parse_frame(&self.ontology, raw)
    }

    pub fn resolve(&self, parsed: &ParsedFrame) -> ResolvedFrame {
        resolve_frame(&self.ontology, parsed, self.overlay.as_deref())
    }

    pub fn parse_and_resolve(&self, raw: &str) -> Option<ResolvedFrame> {
        self.parse(raw).map(|parsed| self.resolve(&parsed))
    }
}
