//! Error types for discovery, evaluation and phase watching.

use std::time::Duration;

use thiserror::Error;

use crate::resource::ResourceKind;

/// Errors that can occur while checking cluster infrastructure.
#[derive(Debug, Clone, Error)]
pub enum CheckError {
    /// Bad credentials or metadata. Aborts the run before any resource work.
    #[error("setup: {0}")]
    Setup(String),

    /// Metadata file could not be read or is missing a required field.
    #[error("metadata: {0}")]
    Metadata(String),

    /// A listing or search call failed while resolving a resource.
    #[error("discovery of {kind} failed: {message}")]
    Discovery { kind: ResourceKind, message: String },

    /// A required singleton resource matched nothing.
    #[error("could not find a {kind} named {name}")]
    NotFound { kind: ResourceKind, name: String },

    /// More than one candidate matched a singleton resource in unique mode.
    #[error("{count} candidates match {kind} {name}")]
    Ambiguous {
        kind: ResourceKind,
        name: String,
        count: usize,
    },

    /// A provider call returned an error.
    #[error("provider: {0}")]
    Provider(String),

    /// The per-call deadline elapsed.
    #[error("deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    /// The external status source could not produce a document.
    #[error("status source: {0}")]
    StatusSource(String),

    /// Extraction recorded at least one fault during a poll pass.
    #[error("extraction: {0}")]
    Extract(#[from] ExtractError),
}

impl CheckError {
    pub fn discovery(kind: ResourceKind, message: impl Into<String>) -> Self {
        Self::Discovery {
            kind,
            message: message.into(),
        }
    }

    /// True for faults that must abort the whole run.
    pub fn is_setup(&self) -> bool {
        matches!(self, Self::Setup(_) | Self::Metadata(_))
    }
}

/// A single malformed or missing field found while reading a status document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("missing field {0}")]
    Missing(String),

    #[error("field {field} should be {expected}, found {found}")]
    WrongShape {
        field: String,
        expected: &'static str,
        found: String,
    },

    #[error("field {field} is not a boolean: {value}")]
    NotBoolean { field: String, value: String },

    #[error("expected {expected} items, found {found}")]
    ItemCount { expected: usize, found: usize },

    #[error("no item named {0}")]
    NoSuchItem(String),
}

/// Result type for check operations.
pub type Result<T> = std::result::Result<T, CheckError>;
