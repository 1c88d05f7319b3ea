//! Validation event reporting
//!
//! The [`ValidationEventSink`] is the single path through which duplicate
//! components, validation failures and advisory diagnostics leave the core.
//!
//! - With a handler attached, every event is passed to it synchronously and
//!   processing continues, so a single pass can report many diagnostics.
//! - With no handler, the first error event aborts the operation by
//!   returning [`Error::Validation`]; warnings are dropped.
//!
//! Error events always increment the error counter, handler or not.

use std::fmt;

use tracing::debug;

use super::exceptions::{EventCode, Severity, SourceLocation, ValidationError, ValidationEvent};
use crate::error::{Error, Result};

/// Receiver for validation events
///
/// A handler returning an error aborts the operation that reported the
/// event; the error is propagated unchanged.
pub trait ValidationEventHandler {
    /// Handle one event
    fn handle(&mut self, event: &ValidationEvent) -> Result<()>;
}

/// Caller-owned diagnostic accumulator
impl ValidationEventHandler for Vec<ValidationEvent> {
    fn handle(&mut self, event: &ValidationEvent) -> Result<()> {
        self.push(event.clone());
        Ok(())
    }
}

impl<F> ValidationEventHandler for F
where
    F: FnMut(&ValidationEvent) -> Result<()>,
{
    fn handle(&mut self, event: &ValidationEvent) -> Result<()> {
        self(event)
    }
}

/// Diagnostic reporting and accounting for one compilation/validation session
pub struct ValidationEventSink<'h> {
    handler: Option<&'h mut dyn ValidationEventHandler>,
    error_count: usize,
    warning_count: usize,
}

impl<'h> ValidationEventSink<'h> {
    /// Create a sink without a handler (fail-fast)
    pub fn new() -> Self {
        Self {
            handler: None,
            error_count: 0,
            warning_count: 0,
        }
    }

    /// Create a sink that forwards events to a handler (best-effort)
    pub fn with_handler(handler: &'h mut dyn ValidationEventHandler) -> Self {
        Self {
            handler: Some(handler),
            error_count: 0,
            warning_count: 0,
        }
    }

    /// Check if a handler is attached
    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    /// Check if any error event has been reported
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Number of error events reported
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// Number of warning events reported
    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    /// Report an event
    ///
    /// Returns an error when no handler is attached and the event is an
    /// error, or when the handler itself fails.
    pub fn report(&mut self, event: ValidationEvent) -> Result<()> {
        self.account(&event);
        debug!(code = %event.code, severity = %event.severity, handled = self.handler.is_some(), "validation event");

        match self.handler.as_deref_mut() {
            Some(handler) => handler.handle(&event),
            None if event.is_error() => Err(Error::Validation(ValidationError::new(event))),
            None => Ok(()),
        }
    }

    /// Report an event from its parts
    pub fn report_code(
        &mut self,
        code: EventCode,
        args: Vec<String>,
        severity: Severity,
        location: Option<SourceLocation>,
    ) -> Result<()> {
        self.report(ValidationEvent::new(code, args, severity).with_location(location))
    }

    /// Report an error event
    pub fn error(&mut self, code: EventCode, args: Vec<String>) -> Result<()> {
        self.report(ValidationEvent::error(code, args))
    }

    /// Report a warning event
    pub fn warning(&mut self, code: EventCode, args: Vec<String>) -> Result<()> {
        self.report(ValidationEvent::warning(code, args))
    }

    /// Report an advisory event that never aborts on its own
    ///
    /// The event is counted and passed to the handler if one is attached;
    /// only a failing handler makes this return an error.
    pub fn report_no_throw(&mut self, event: ValidationEvent) -> Result<()> {
        self.account(&event);
        match self.handler.as_deref_mut() {
            Some(handler) => handler.handle(&event),
            None => Ok(()),
        }
    }

    fn account(&mut self, event: &ValidationEvent) {
        match event.severity {
            Severity::Error => self.error_count += 1,
            Severity::Warning => self.warning_count += 1,
        }
    }
}

impl Default for ValidationEventSink<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ValidationEventSink<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationEventSink")
            .field("has_handler", &self.handler.is_some())
            .field("error_count", &self.error_count)
            .field("warning_count", &self.warning_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InternalError;

    fn undeclared() -> ValidationEvent {
        ValidationEvent::error(EventCode::UndeclaredAttribute, vec!["a".to_string()])
    }

    fn lax_warning() -> ValidationEvent {
        ValidationEvent::warning(EventCode::NoAttributeSchemaFound, vec!["b".to_string()])
    }

    #[test]
    fn test_error_without_handler_aborts() {
        let mut sink = ValidationEventSink::new();
        let result = sink.report(undeclared());

        match result {
            Err(Error::Validation(e)) => assert_eq!(e.code(), EventCode::UndeclaredAttribute),
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(sink.has_errors());
    }

    #[test]
    fn test_warning_without_handler_is_dropped() {
        let mut sink = ValidationEventSink::new();
        assert!(sink.report(lax_warning()).is_ok());
        assert!(!sink.has_errors());
        assert_eq!(sink.warning_count(), 1);
    }

    #[test]
    fn test_handler_accumulates_and_continues() {
        let mut events: Vec<ValidationEvent> = Vec::new();
        {
            let mut sink = ValidationEventSink::with_handler(&mut events);
            sink.report(undeclared()).unwrap();
            sink.report(lax_warning()).unwrap();
            sink.report(undeclared()).unwrap();
            assert_eq!(sink.error_count(), 2);
            assert!(sink.has_errors());
        }
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn test_handler_failure_propagates() {
        let mut handler = |event: &ValidationEvent| -> Result<()> {
            Err(InternalError::new(format!("handler rejected {}", event.code)).into())
        };
        let mut sink = ValidationEventSink::with_handler(&mut handler);

        let result = sink.report(lax_warning());
        assert!(matches!(result, Err(Error::Internal(_))));
    }

    #[test]
    fn test_report_no_throw_counts_without_aborting() {
        let mut sink = ValidationEventSink::new();
        assert!(sink.report_no_throw(undeclared()).is_ok());
        assert!(sink.has_errors());
        assert_eq!(sink.error_count(), 1);
    }

    #[test]
    fn test_report_code_keeps_location() {
        let mut events = Vec::new();
        let mut sink = ValidationEventSink::with_handler(&mut events);
        sink.report_code(
            EventCode::ProhibitedAttribute,
            vec!["p".to_string()],
            Severity::Error,
            Some(SourceLocation::new(1, 2)),
        )
        .unwrap();
        drop(sink);
        assert_eq!(events[0].location, Some(SourceLocation::new(1, 2)));
    }
}
