//! # Error Types
//!
//! Errors raised inside the analysis core. Most public entry points recover
//! from these locally (logging them and returning an empty or neutral
//! result) so that a continuously running analysis loop never halts; the
//! `try_*` variants hand them to callers that want the failure kind.

use thiserror::Error;

/// Top-level error type for chordlens operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChordLensError {
    /// The pitch collection must carry exactly one root.
    #[error("expected exactly one root pitch, found {found}")]
    RootCardinality { found: usize },

    /// A note string such as `"C#4"` could not be parsed.
    #[error("invalid note name '{0}'")]
    InvalidNoteName(String),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),
}

impl ChordLensError {
    /// Human readable hint for the surrounding layer ("no root set", ...).
    pub fn root_hint(&self) -> Option<&'static str> {
        match self {
            ChordLensError::RootCardinality { found: 0 } => Some("no root is set"),
            ChordLensError::RootCardinality { .. } => Some("more than one root is set"),
            _ => None,
        }
    }
}

/// Result type alias for chordlens operations.
pub type Result<T> = std::result::Result<T, ChordLensError>;
