//! Error types for xmlschema-compiler
//!
//! This module defines the error taxonomy used throughout the library:
//! grammar (compile-time) errors, validation errors raised by the event
//! sink when no handler is attached, and internal errors for caller misuse.

use std::fmt;
use thiserror::Error;

use crate::validators::exceptions::ValidationError;

/// Result type alias using the crate Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for schema compilation and validation
#[derive(Error, Debug)]
pub enum Error {
    /// Grammar error: malformed wildcard, unsupported XPath, ...
    #[error("grammar error: {0}")]
    Grammar(#[from] GrammarError),

    /// Validation error that aborted the current operation
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Caller misuse
    #[error("internal error: {0}")]
    Internal(#[from] InternalError),

    /// Namespace error
    #[error("namespace error: {0}")]
    Namespace(String),

    /// Name error (invalid XML name)
    #[error("name error: {0}")]
    Name(String),

    /// Limit exceeded error
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// URL parsing error
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Check if this error is a grammar error
    pub fn is_grammar(&self) -> bool {
        matches!(self, Error::Grammar(_))
    }

    /// Get the grammar error, if any
    pub fn as_grammar(&self) -> Option<&GrammarError> {
        match self {
            Error::Grammar(e) => Some(e),
            _ => None,
        }
    }
}

/// Category of a grammar error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrammarErrorKind {
    /// A namespace token of a wildcard is not a valid URI reference
    MalformedNamespaceToken,
    /// The union of two wildcards cannot be represented
    UnionNotExpressible,
    /// The intersection of two wildcards cannot be represented
    IntersectionNotExpressible,
    /// An XPath construct outside the identity-constraint subset
    UnsupportedExpression,
    /// A prefix not bound in the namespace context
    UnresolvedPrefix,
    /// Identity constraint without fields
    MissingField,
    /// Keyref without a `refer` attribute
    MissingRefer,
    /// A configured limit was exceeded while compiling
    LimitExceeded,
    /// Two attribute uses with the same name in one attribute set
    DuplicateAttributeUse,
    /// Conflicting `use`, `default` and `fixed` on an attribute declaration
    InvalidValueConstraint,
}

impl fmt::Display for GrammarErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::MalformedNamespaceToken => "malformed namespace token",
            Self::UnionNotExpressible => "union not expressible",
            Self::IntersectionNotExpressible => "intersection not expressible",
            Self::UnsupportedExpression => "unsupported expression",
            Self::UnresolvedPrefix => "unresolved prefix",
            Self::MissingField => "missing field",
            Self::MissingRefer => "missing refer",
            Self::LimitExceeded => "limit exceeded",
            Self::DuplicateAttributeUse => "duplicate attribute use",
            Self::InvalidValueConstraint => "invalid value constraint",
        };
        write!(f, "{}", s)
    }
}

/// Schema grammar error, raised at compile time only
#[derive(Debug, Clone)]
pub struct GrammarError {
    /// Error message
    pub message: String,
    /// Error category
    pub kind: GrammarErrorKind,
    /// Location in the schema document
    pub location: Option<String>,
    /// Offending source text (token or expression)
    pub source: Option<String>,
    /// Sub-component the error is attributed to (e.g. `selector`, `field[2]`)
    pub component: Option<String>,
}

impl GrammarError {
    /// Create a new grammar error
    pub fn new(kind: GrammarErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            location: None,
            source: None,
            component: None,
        }
    }

    /// Set the location
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the source
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set the component
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }
}

impl fmt::Display for GrammarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref comp) = self.component {
            write!(f, "{}: ", comp)?;
        }
        write!(f, "{}", self.message)?;

        if let Some(ref src) = self.source {
            write!(f, " ('{}')", src)?;
        }

        if let Some(ref loc) = self.location {
            write!(f, "\n\nLocation: {}", loc)?;
        }

        Ok(())
    }
}

impl std::error::Error for GrammarError {}

/// Caller misuse, treated as a non-recoverable assertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalError {
    /// Error message
    pub message: String,
}

impl InternalError {
    /// Create a new internal error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for InternalError {}
