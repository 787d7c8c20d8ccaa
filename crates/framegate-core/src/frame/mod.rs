//! Frame Resolver
//!
//! Turns raw frame strings into structured values:
//!
//! ```text
//!   "⊕◊⛔▶β"
//!      │  parse_frame (ontology lookup, confidence, identity hash)
//!      ▼
//!   ParsedFrame
//!      │  resolve_frame (defaults, overlay overrides, tool bindings,
//!      │                 forbidden-constraint tool block applied last)
//!      ▼
//!   ResolvedFrame ──► is_tool_allowed(tool)
//! ```

pub mod overlay;
pub mod parser;
pub mod resolver;

pub use overlay::{pattern_matches, PolicyOverlay, SymbolOverride, ToolBinding};
pub use parser::{parse_frame, ParsedFrame};
pub use resolver::{
    is_tool_allowed, resolve_frame, EffectiveSymbol, FrameResolver, ResolvedFrame,
    FORBIDDEN_TOOL_PATTERNS,
};
