use std::fmt;
use thiserror::Error;

use crate::core::store::ValidationIssue;

/// Which table of the store an identifier was looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Dialogue,
    Choice,
    Event,
    /// Any of the three, via `NarrativeStore::resolve`.
    Any,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dialogue => "dialogue",
            Self::Choice => "choice",
            Self::Event => "event",
            Self::Any => "node",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum NarrativeError {
    #[error("{kind} not found: '{id}'")]
    NotFound { kind: NodeKind, id: String },
    #[error("invalid selection {index} for choice '{choice}'")]
    InvalidSelection { choice: String, index: usize },
    #[error("unrecognized event logic '{0}'")]
    InvalidLogic(String),
    #[error("unrecognized execution mode '{0}'")]
    InvalidExecutionMode(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("no host binding registered for '{0}'")]
    UnknownHostBinding(String),
    #[error("package failed validation with {} issue(s)", .0.len())]
    InvalidPackage(Vec<ValidationIssue>),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

impl NarrativeError {
    pub(crate) fn not_found(kind: NodeKind, id: &str) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}
