//! Validation events and diagnostics
//!
//! This module contains the diagnostic records reported through the
//! [`ValidationEventSink`](super::validation::ValidationEventSink), and the
//! error type raised when an error event aborts the current operation.

use std::fmt;

/// Severity of a validation event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Advisory diagnostic, never aborts
    Warning,
    /// Validity or grammar violation
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Diagnostic codes
///
/// Each code carries a message template; `{0}`, `{1}`, ... are replaced by
/// the event arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCode {
    /// A second, unrelated component with the same name and kind
    DuplicateComponent,
    /// Attribute not declared by the element type
    UndeclaredAttribute,
    /// Attribute prohibited by the element type or its wildcard
    ProhibitedAttribute,
    /// No declaration found for a laxly validated attribute
    NoAttributeSchemaFound,
    /// Attribute name differs from the partial validation target
    AttributeNameMismatch,
    /// Attribute validation invoked with a non-attribute target
    ValidateAttributeInvalidCall,
    /// ID-typed wildcard attribute on a type with an ID attribute use
    AttrUseAndWildId,
    /// More than one ID-typed attribute matched by a wildcard
    MoreThanOneWildId,
    /// Attribute occurs twice on the same element
    DuplicateAttribute,
    /// Unknown attribute in the schema-instance namespace
    NotXsiAttribute,
    /// Required attribute missing at element end
    MissingRequiredAttribute,
    /// Keyref refers to an undefined key or unique constraint
    UnknownReferredKey,
    /// Keyref refers to another keyref
    ReferToKeyref,
    /// Keyref and its target have different field counts
    KeyrefFieldCountMismatch,
}

impl EventCode {
    /// Message template for this code
    pub fn template(&self) -> &'static str {
        match self {
            Self::DuplicateComponent => "The {0} '{1}' has already been declared.",
            Self::UndeclaredAttribute => "The '{0}' attribute is not declared.",
            Self::ProhibitedAttribute => "The '{0}' attribute is not allowed.",
            Self::NoAttributeSchemaFound => {
                "Could not find schema information for the attribute '{0}'."
            }
            Self::AttributeNameMismatch => {
                "The attribute name '{0}' does not match the name '{1}' of the attribute being validated."
            }
            Self::ValidateAttributeInvalidCall => {
                "Attribute validation was invoked with a partial validation target that is not an attribute."
            }
            Self::AttrUseAndWildId => {
                "The type of an attribute matched by a wildcard is derived from ID, but the element type already declares an ID attribute."
            }
            Self::MoreThanOneWildId => {
                "More than one attribute matched by a wildcard has a type derived from ID."
            }
            Self::DuplicateAttribute => "The '{0}' attribute has already been validated on this element.",
            Self::NotXsiAttribute => "The attribute '{0}' does not match one of the four allowed attributes in the schema-instance namespace.",
            Self::MissingRequiredAttribute => "The required attribute '{0}' is missing.",
            Self::UnknownReferredKey => "The key or unique constraint '{0}' referred to by keyref '{1}' is not declared.",
            Self::ReferToKeyref => "The keyref '{1}' refers to '{0}', which is itself a keyref.",
            Self::KeyrefFieldCountMismatch => {
                "The keyref '{1}' has {2} field(s) but the referred constraint '{0}' has {3}."
            }
        }
    }

    /// Format the message for the given arguments
    pub fn format(&self, args: &[String]) -> String {
        let mut message = self.template().to_string();
        for (i, arg) in args.iter().enumerate() {
            message = message.replace(&format!("{{{}}}", i), arg);
        }
        message
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Position in a source document
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceLocation {
    /// Document URI
    pub uri: Option<String>,
    /// 1-based line number (0 when unknown)
    pub line: usize,
    /// 1-based column number (0 when unknown)
    pub column: usize,
}

impl SourceLocation {
    /// Create a location with line and column
    pub fn new(line: usize, column: usize) -> Self {
        Self {
            uri: None,
            line,
            column,
        }
    }

    /// Set the document URI
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref uri) = self.uri {
            write!(f, "{}:", uri)?;
        }
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A diagnostic reported during compilation or validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationEvent {
    /// Diagnostic code
    pub code: EventCode,
    /// Message arguments
    pub args: Vec<String>,
    /// Severity
    pub severity: Severity,
    /// Source location, if known
    pub location: Option<SourceLocation>,
}

impl ValidationEvent {
    /// Create a new event
    pub fn new(code: EventCode, args: Vec<String>, severity: Severity) -> Self {
        Self {
            code,
            args,
            severity,
            location: None,
        }
    }

    /// Create an error event
    pub fn error(code: EventCode, args: Vec<String>) -> Self {
        Self::new(code, args, Severity::Error)
    }

    /// Create a warning event
    pub fn warning(code: EventCode, args: Vec<String>) -> Self {
        Self::new(code, args, Severity::Warning)
    }

    /// Set the source location
    pub fn with_location(mut self, location: Option<SourceLocation>) -> Self {
        self.location = location;
        self
    }

    /// The formatted message
    pub fn message(&self) -> String {
        self.code.format(&self.args)
    }

    /// Check if this is an error event
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ValidationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.code, self.message())?;
        if let Some(ref loc) = self.location {
            write!(f, " (at {})", loc)?;
        }
        Ok(())
    }
}

/// Error raised when an error event aborts the current operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    event: ValidationEvent,
}

impl ValidationError {
    /// Create a validation error from the event that caused it
    pub fn new(event: ValidationEvent) -> Self {
        Self { event }
    }

    /// The event that aborted the operation
    pub fn event(&self) -> &ValidationEvent {
        &self.event
    }

    /// The diagnostic code
    pub fn code(&self) -> EventCode {
        self.event.code
    }

    /// The formatted message
    pub fn message(&self) -> String {
        self.event.message()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.event.message())?;
        if let Some(ref loc) = self.event.location {
            write!(f, "\nLocation: {}", loc)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationEvent> for ValidationError {
    fn from(event: ValidationEvent) -> Self {
        Self::new(event)
    }
}
