//! Per-deployment policy overlays
//!
//! An overlay extends ontology symbols with deployment metadata, blocks
//! symbols outright, and binds tool-name patterns to symbols. Overlays are
//! plain immutable values; a deployment swaps overlays by building a new
//! resolver.

use crate::error::{FrameGateError, OverlayError, Result, ResultExt};
use crate::ontology::Ontology;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Tool-name patterns a symbol allows or blocks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolBinding {
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub block: Vec<String>,
}

/// Deployment-specific extension of one ontology symbol
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolOverride {
    /// Replaces the ontology description when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Free-form deployment metadata
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,

    /// Tool bindings contributed by this symbol
    #[serde(default)]
    pub tools: ToolBinding,

    /// Frames using this symbol are rejected
    #[serde(default)]
    pub blocked: bool,
}

/// A named set of symbol overrides, keyed by token
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyOverlay {
    pub name: String,
    #[serde(default)]
    pub symbols: BTreeMap<String, SymbolOverride>,
}

impl PolicyOverlay {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbols: BTreeMap::new(),
        }
    }

    /// Add or replace the override for a token
    pub fn with_override(mut self, token: impl Into<String>, over: SymbolOverride) -> Self {
        self.symbols.insert(token.into(), over);
        self
    }

    /// Allow tool patterns under a token
    pub fn allow_tools<I, S>(mut self, token: impl Into<String>, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.symbols.entry(token.into()).or_default();
        entry.tools.allow.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Block tool patterns under a token
    pub fn block_tools<I, S>(mut self, token: impl Into<String>, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.symbols.entry(token.into()).or_default();
        entry.tools.block.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Block a symbol outright
    pub fn block_symbol(mut self, token: impl Into<String>) -> Self {
        self.symbols.entry(token.into()).or_default().blocked = true;
        self
    }

    pub fn get(&self, token: &str) -> Option<&SymbolOverride> {
        self.symbols.get(token)
    }

    /// Tokens this overlay blocks
    pub fn blocked_tokens(&self) -> impl Iterator<Item = &str> {
        self.symbols
            .iter()
            .filter(|(_, o)| o.blocked)
            .map(|(t, _)| t.as_str())
    }

    /// Check every override refers to a known symbol and has usable patterns
    pub fn check_against(&self, ontology: &Ontology) -> std::result::Result<(), OverlayError> {
        for (token, over) in &self.symbols {
            if ontology.lookup(token).is_none() {
                return Err(OverlayError::UnknownSymbol {
                    overlay: self.name.clone(),
                    token: token.clone(),
                });
            }
            let patterns = over.tools.allow.iter().chain(over.tools.block.iter());
            if patterns.into_iter().any(|p| p.trim().is_empty()) {
                return Err(OverlayError::EmptyPattern {
                    overlay: self.name.clone(),
                    token: token.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Load from a file, choosing the format by extension (`.json` or TOML)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(FrameGateError::from)
            .with_context(|| format!("Failed to read overlay {}", path.display()))?;
        let overlay = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_toml_str(&content),
        };
        overlay.with_context(|| format!("Invalid overlay {}", path.display()))
    }
}

/// Match a tool name against a pattern.
///
/// `*` alone matches everything. A pattern with embedded wildcards is an
/// anchored match: the text before the first `*` must prefix the name, the
/// text after the last `*` must suffix it, and inner segments must appear in
/// order between them. Anything else is an exact comparison.
pub fn pattern_matches(pattern: &str, name: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if !pattern.contains('*') {
        return pattern == name;
    }

    let segments: Vec<&str> = pattern.split('*').collect();
    let (first, rest) = match segments.split_first() {
        Some(parts) => parts,
        None => return false,
    };
    let (last, middle) = match rest.split_last() {
        Some(parts) => parts,
        None => return false,
    };

    if !name.starts_with(first) {
        return false;
    }
    let mut remaining = &name[first.len()..];
    if remaining.len() < last.len() || !remaining.ends_with(last) {
        return false;
    }
    remaining = &remaining[..remaining.len() - last.len()];

    for segment in middle {
        match remaining.find(segment) {
            Some(pos) => remaining = &remaining[pos + segment.len()..],
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_wildcard_all() {
        assert!(pattern_matches("*", "anything"));
        assert!(pattern_matches("*", ""));
    }

    #[test]
    fn test_pattern_exact() {
        assert!(pattern_matches("read_file", "read_file"));
        assert!(!pattern_matches("read_file", "read_files"));
    }

    #[test]
    fn test_pattern_prefix_suffix_and_inner() {
        assert!(pattern_matches("fs_*", "fs_read"));
        assert!(!pattern_matches("fs_*", "net_fs_read"));
        assert!(pattern_matches("*_delete", "record_delete"));
        assert!(!pattern_matches("*_delete", "record_delete_all"));
        assert!(pattern_matches("*exec*", "shell_execute"));
        assert!(pattern_matches("db_*_write", "db_user_write"));
        assert!(!pattern_matches("db_*_write", "db_write"));
        assert!(pattern_matches("a*b*c", "axxbyyc"));
        assert!(!pattern_matches("a*b*c", "axxcyyb"));
    }

    #[test]
    fn test_check_against_rejects_unknown_token() {
        let overlay = PolicyOverlay::new("prod").allow_tools("Z", ["read_*"]);
        let err = overlay.check_against(&Ontology::builtin()).unwrap_err();
        assert!(matches!(err, OverlayError::UnknownSymbol { .. }));
    }

    #[test]
    fn test_check_against_rejects_empty_pattern() {
        let overlay = PolicyOverlay::new("prod").block_tools("▶", [" "]);
        let err = overlay.check_against(&Ontology::builtin()).unwrap_err();
        assert!(matches!(err, OverlayError::EmptyPattern { .. }));
    }

    #[test]
    fn test_overlay_from_toml() {
        let toml = r#"
            name = "finance-prod"

            [symbols."◊"]
            description = "EU payments only"
            metadata = { region = "eu", max_amount = 10000 }
            tools = { allow = ["ledger_*", "read_*"], block = ["ledger_purge"] }

            [symbols."✗"]
            blocked = true
        "#;
        let overlay = PolicyOverlay::from_toml_str(toml).unwrap();
        assert_eq!(overlay.name, "finance-prod");
        assert!(overlay.check_against(&Ontology::builtin()).is_ok());

        let fin = overlay.get("◊").unwrap();
        assert_eq!(fin.tools.allow.len(), 2);
        assert_eq!(fin.metadata["region"], serde_json::json!("eu"));
        assert_eq!(overlay.blocked_tokens().collect::<Vec<_>>(), vec!["✗"]);
    }

    #[test]
    fn test_overlay_from_json() {
        let json = r#"{"name":"dev","symbols":{"▶":{"tools":{"allow":["*"]}}}}"#;
        let overlay = PolicyOverlay::from_json_str(json).unwrap();
        assert_eq!(overlay.get("▶").unwrap().tools.allow, vec!["*".to_string()]);
    }
}
