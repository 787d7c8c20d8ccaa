//! Error types for FrameGate Core
//!
//! Request-time operations (validation, drift comparison, gate decisions) never
//! fail: they return typed outcome values. The errors defined here cover
//! construction-time problems only, such as a corrupt ontology, an invalid
//! configuration or an overlay that references unknown symbols.

use thiserror::Error;

/// Result type alias for FrameGate operations
pub type Result<T> = std::result::Result<T, FrameGateError>;

/// Main error type for FrameGate operations
#[derive(Error, Debug)]
pub enum FrameGateError {
    /// Ontology construction errors
    #[error("Ontology error: {0}")]
    Ontology(#[from] OntologyError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Policy overlay errors
    #[error("Overlay error: {0}")]
    Overlay(#[from] OverlayError),

    /// JSON serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parse errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML encoding errors
    #[error("TOML encoding error: {0}")]
    TomlEncode(#[from] toml::ser::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        source: Box<FrameGateError>,
    },
}

/// Errors raised while building or loading a symbol ontology
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OntologyError {
    #[error("Ontology contains no symbols")]
    Empty,

    #[error("Symbol token must not be empty (canonical name: {0})")]
    EmptyToken(String),

    #[error("Duplicate symbol token: {0}")]
    DuplicateToken(String),

    #[error("Duplicate canonical name {name} in category {category}")]
    DuplicateName { category: String, name: String },

    #[error("Mode strengths must be distinct: {first} and {second} share strength {strength}")]
    NonDistinctModeStrength {
        first: String,
        second: String,
        strength: u8,
    },

    #[error("Required {category} symbol missing: {name}")]
    MissingRequired { category: String, name: String },
}

/// Errors raised by configuration validation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be finite and within [{min}, {max}], got {value}")]
    OutOfRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{field} must be greater than zero")]
    Zero { field: String },

    #[error("Gate {gate}: min {min} must not exceed max {max}")]
    InvertedBounds { gate: String, min: f64, max: f64 },

    #[error("Gate {gate}: base threshold {base} outside bounds [{min}, {max}]")]
    BaseOutOfBounds {
        gate: String,
        base: f64,
        min: f64,
        max: f64,
    },
}

/// Errors raised when a policy overlay does not fit the active ontology
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OverlayError {
    #[error("Overlay {overlay} overrides unknown symbol {token}")]
    UnknownSymbol { overlay: String, token: String },

    #[error("Overlay {overlay} has an empty tool pattern for symbol {token}")]
    EmptyPattern { overlay: String, token: String },
}

impl FrameGateError {
    /// Add context to an error
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to a Result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add lazy context to a Result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_context() {
        let err = FrameGateError::from(OntologyError::DuplicateToken("⊕".to_string()));
        let err = err.context("Failed to load ontology");

        let msg = err.to_string();
        assert!(msg.contains("Failed to load ontology"));
        assert!(msg.contains("Duplicate symbol token"));
    }

    #[test]
    fn test_result_ext() {
        let result: Result<()> = Err(ConfigError::Zero {
            field: "circuit_breaker.failure_threshold".to_string(),
        }
        .into());
        let result = result.with_context(|| "Engine construction failed".to_string());

        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Engine construction failed"));
    }
}
