//! Built-in symbol table

use super::{Symbol, SymbolKind};

fn mode(token: &str, name: &str, strength: u8, description: &str) -> Symbol {
    Symbol::new(token, name, SymbolKind::Mode { strength }).with_description(description)
}

fn constraint(token: &str, name: &str, strength: u8, description: &str) -> Symbol {
    Symbol::new(token, name, SymbolKind::Constraint { strength }).with_description(description)
}

fn plain(token: &str, name: &str, kind: SymbolKind, description: &str) -> Symbol {
    Symbol::new(token, name, kind).with_description(description)
}

/// Default deployment vocabulary.
///
/// Mode strengths run from most restrictive (1) to most permissive (4):
/// strict < neutral < flexible < forbidden. The forbidden mode is the
/// exploratory mode in which execution is never allowed.
pub fn builtin_symbols() -> Vec<Symbol> {
    use SymbolKind::*;

    vec![
        // Modes
        mode("⊕", "strict", 1, "follow instructions exactly, no deviation"),
        mode("⊙", "neutral", 2, "standard operating latitude"),
        mode("⊖", "flexible", 3, "agent may adapt the approach"),
        mode("⊗", "forbidden", 4, "exploratory only, execution forbidden"),
        // Domains
        plain("◊", "financial", Domain, "payments, ledgers, trading"),
        plain("§", "legal", Domain, "contracts, compliance, regulation"),
        plain("⚙", "technical", Domain, "code, infrastructure, systems"),
        plain("✚", "medical", Domain, "clinical and health data"),
        plain("◎", "operational", Domain, "general operations"),
        plain("✎", "creative", Domain, "content and design"),
        // Constraints
        constraint("⛔", "forbidden", 4, "the guarded operation must not happen"),
        constraint("🔒", "confidential", 3, "outputs must not leave the trust boundary"),
        constraint("✓", "approval_required", 3, "human approval before side effects"),
        constraint("⚠", "caution", 2, "proceed with extra verification"),
        constraint("⏱", "time_bound", 1, "must complete within the allotted window"),
        // Actions
        plain("▶", "execute", Action, "perform the operation"),
        plain("▼", "delegate", Action, "hand the task to another agent"),
        plain("△", "propose", Action, "suggest without side effects"),
        plain("▷", "analyze", Action, "inspect and report"),
        plain("✍", "write", Action, "create or modify state"),
        plain("✗", "delete", Action, "remove state"),
        plain("↺", "review", Action, "check prior work"),
        // Modifiers
        plain("↑", "urgent", Modifier, "raise priority"),
        plain("↓", "deferred", Modifier, "lower priority"),
        plain("∀", "exhaustive", Modifier, "cover every case"),
        plain("≈", "approximate", Modifier, "best effort is acceptable"),
        // Sources
        plain("⌂", "internal", Source, "originates inside the deployment"),
        plain("☁", "external", Source, "originates from an external system"),
        plain("⚑", "human_operator", Source, "issued by a human operator"),
        // Entities
        plain("α", "primary_agent", Entity, "the issuing agent"),
        plain("β", "secondary_agent", Entity, "a delegated worker"),
        plain("γ", "tertiary_agent", Entity, "a sub-delegated worker"),
        plain("δ", "auditor_agent", Entity, "an independent reviewer"),
        plain("Ω", "orchestrator", Entity, "the workflow orchestrator"),
    ]
}
