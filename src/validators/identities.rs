//! XSD Identity Constraints
//!
//! This module compiles identity constraints for XML Schema:
//! - xs:unique - Ensures values are unique within scope
//! - xs:key - Like unique, but all field values must be present
//! - xs:keyref - References a key/unique constraint (foreign key)
//!
//! Compilation turns the selector and field expressions into
//! [`CompiledXPath`] values. A keyref's `refer` is only resolved to a name
//! here; [`IdentityConstraintSet::bind_keyrefs`] connects it to its target
//! once every constraint of the schema has been compiled.

use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::error::{Error, GrammarError, GrammarErrorKind, Result};
use crate::limits::Limits;
use crate::names::is_valid_qname;
use crate::namespaces::{NamespaceContext, QName};
use crate::xpath::{CompiledXPath, IdentityXPathParser, XPathParseError};

use super::exceptions::{EventCode, Severity, SourceLocation};
use super::globals::{Component, ComponentId, ComponentKind, GlobalMaps, InsertOutcome};
use super::validation::ValidationEventSink;

/// Type of identity constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityConstraintKind {
    /// xs:unique - values must be unique, but fields can be missing
    Unique,
    /// xs:key - values must be unique AND all fields must be present
    Key,
    /// xs:keyref - references a key or unique constraint
    Keyref,
}

impl IdentityConstraintKind {
    /// Element name of the constraint
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unique => "unique",
            Self::Key => "key",
            Self::Keyref => "keyref",
        }
    }
}

impl fmt::Display for IdentityConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Uncompiled identity constraint, as read from a schema document
#[derive(Debug, Clone)]
pub struct IdentityConstraintDefinition {
    /// Constraint name
    pub name: QName,
    /// Kind of constraint
    pub kind: IdentityConstraintKind,
    /// Selector expression
    pub selector: String,
    /// Field expressions
    pub fields: Vec<String>,
    /// `refer` attribute as written (keyref only)
    pub refer: Option<String>,
    /// XPath default namespace (XSD 1.1)
    pub xpath_default_namespace: Option<String>,
    /// Location of the declaration
    pub location: Option<SourceLocation>,
}

impl IdentityConstraintDefinition {
    /// Create a new definition without fields
    pub fn new(name: QName, kind: IdentityConstraintKind, selector: impl Into<String>) -> Self {
        Self {
            name,
            kind,
            selector: selector.into(),
            fields: Vec::new(),
            refer: None,
            xpath_default_namespace: None,
            location: None,
        }
    }

    /// Create a unique constraint
    pub fn unique(name: QName, selector: impl Into<String>) -> Self {
        Self::new(name, IdentityConstraintKind::Unique, selector)
    }

    /// Create a key constraint
    pub fn key(name: QName, selector: impl Into<String>) -> Self {
        Self::new(name, IdentityConstraintKind::Key, selector)
    }

    /// Create a keyref constraint
    pub fn keyref(name: QName, selector: impl Into<String>, refer: impl Into<String>) -> Self {
        let mut def = Self::new(name, IdentityConstraintKind::Keyref, selector);
        def.refer = Some(refer.into());
        def
    }

    /// Add a field
    pub fn with_field(mut self, xpath: impl Into<String>) -> Self {
        self.fields.push(xpath.into());
        self
    }

    /// Add multiple fields
    pub fn with_fields<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Set the XPath default namespace
    pub fn with_xpath_default_namespace(mut self, ns: impl Into<String>) -> Self {
        self.xpath_default_namespace = Some(ns.into());
        self
    }

    /// Set the location
    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }
}

/// Compiled identity constraint, immutable and shareable across threads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledIdentityConstraint {
    name: QName,
    kind: IdentityConstraintKind,
    selector: CompiledXPath,
    fields: Vec<CompiledXPath>,
    refer: Option<QName>,
    location: Option<SourceLocation>,
}

impl CompiledIdentityConstraint {
    /// Constraint name
    pub fn name(&self) -> &QName {
        &self.name
    }

    /// Kind of constraint
    pub fn kind(&self) -> IdentityConstraintKind {
        self.kind
    }

    /// Compiled selector
    pub fn selector(&self) -> &CompiledXPath {
        &self.selector
    }

    /// Compiled fields, in declaration order
    pub fn fields(&self) -> &[CompiledXPath] {
        &self.fields
    }

    /// Number of fields
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Name of the referred key or unique constraint (keyref only, unbound)
    pub fn refer(&self) -> Option<&QName> {
        self.refer.as_ref()
    }

    /// Location of the declaration
    pub fn location(&self) -> Option<&SourceLocation> {
        self.location.as_ref()
    }

    /// Check if this is a keyref constraint
    pub fn is_keyref(&self) -> bool {
        self.kind == IdentityConstraintKind::Keyref
    }
}

/// Compiles identity constraint definitions
#[derive(Debug, Clone, Default)]
pub struct IdentityConstraintCompiler {
    limits: Limits,
}

impl IdentityConstraintCompiler {
    /// Create a compiler with default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a compiler with custom limits
    pub fn with_limits(limits: Limits) -> Self {
        Self { limits }
    }

    /// Compile a definition
    ///
    /// Errors name the failing part in [`GrammarError::component`]
    /// (`selector`, `field[1]`, `refer`) and carry the offending text in
    /// [`GrammarError::source`].
    pub fn compile(
        &self,
        definition: &IdentityConstraintDefinition,
        namespaces: &NamespaceContext,
    ) -> std::result::Result<CompiledIdentityConstraint, GrammarError> {
        let name = &definition.name;
        let location = definition.location.as_ref().map(ToString::to_string);
        let locate = |err: GrammarError| match &location {
            Some(loc) => err.with_location(loc.clone()),
            None => err,
        };

        if definition.fields.is_empty() {
            return Err(locate(GrammarError::new(
                GrammarErrorKind::MissingField,
                format!("{} '{}' must have at least one field", definition.kind, name),
            )));
        }

        let refer = match (definition.kind, &definition.refer) {
            (IdentityConstraintKind::Keyref, None) => {
                return Err(locate(GrammarError::new(
                    GrammarErrorKind::MissingRefer,
                    format!("keyref '{}' must have a 'refer' attribute", name),
                )));
            }
            (IdentityConstraintKind::Keyref, Some(refer)) => {
                Some(resolve_refer(refer, namespaces).map_err(&locate)?)
            }
            _ => None,
        };

        let default_ns = definition.xpath_default_namespace.as_deref().unwrap_or("");

        let selector_parser = IdentityXPathParser::new().with_limits(self.limits.clone());
        let selector = compile_expression(&selector_parser, &definition.selector, namespaces, default_ns)
            .map_err(|e| locate(e.with_component("selector")))?;

        let field_parser = IdentityXPathParser::for_field().with_limits(self.limits.clone());
        let fields = definition
            .fields
            .iter()
            .enumerate()
            .map(|(i, xpath)| {
                compile_expression(&field_parser, xpath, namespaces, default_ns)
                    .map_err(|e| locate(e.with_component(format!("field[{}]", i + 1))))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!(
            name = %name,
            kind = %definition.kind,
            fields = fields.len(),
            "compiled identity constraint"
        );

        Ok(CompiledIdentityConstraint {
            name: name.clone(),
            kind: definition.kind,
            selector,
            fields,
            refer,
            location: definition.location.clone(),
        })
    }
}

fn compile_expression(
    parser: &IdentityXPathParser,
    xpath: &str,
    namespaces: &NamespaceContext,
    default_ns: &str,
) -> std::result::Result<CompiledXPath, GrammarError> {
    let limit_error = |e: Error| {
        GrammarError::new(GrammarErrorKind::LimitExceeded, e.to_string()).with_source(xpath)
    };

    parser.check_limits(xpath).map_err(limit_error)?;
    let parsed = parser
        .parse(xpath)
        .map_err(|e| xpath_error(e, xpath))?;
    parser.check_parsed_limits(&parsed).map_err(limit_error)?;
    parsed
        .compile(namespaces, default_ns)
        .map_err(|e| xpath_error(e, xpath))
}

fn xpath_error(err: XPathParseError, xpath: &str) -> GrammarError {
    let kind = match err {
        XPathParseError::UnresolvedPrefix(_) => GrammarErrorKind::UnresolvedPrefix,
        _ => GrammarErrorKind::UnsupportedExpression,
    };
    GrammarError::new(kind, err.to_string()).with_source(xpath)
}

fn resolve_refer(
    refer: &str,
    namespaces: &NamespaceContext,
) -> std::result::Result<QName, GrammarError> {
    let refer = refer.trim();
    if !is_valid_qname(refer) {
        return Err(GrammarError::new(
            GrammarErrorKind::UnsupportedExpression,
            format!("'{}' is not a valid QName", refer),
        )
        .with_component("refer")
        .with_source(refer));
    }
    namespaces.resolve(refer).map_err(|e| {
        GrammarError::new(GrammarErrorKind::UnresolvedPrefix, e.to_string())
            .with_component("refer")
            .with_source(refer)
    })
}

/// A keyref bound to the constraint it refers to
#[derive(Debug, Clone)]
pub struct KeyrefBinding {
    /// The keyref
    pub keyref: Arc<CompiledIdentityConstraint>,
    /// The referred key or unique constraint
    pub target: Arc<CompiledIdentityConstraint>,
}

/// The compiled identity constraints of a schema
#[derive(Debug, Clone, Default)]
pub struct IdentityConstraintSet {
    constraints: IndexMap<QName, (ComponentId, Arc<CompiledIdentityConstraint>)>,
}

impl IdentityConstraintSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a compiled constraint
    ///
    /// The name goes through the identity-constraint table of `maps`, so a
    /// second constraint with the same name is reported as a duplicate
    /// component and not added.
    pub fn add(
        &mut self,
        maps: &mut GlobalMaps,
        constraint: CompiledIdentityConstraint,
        sink: &mut ValidationEventSink<'_>,
    ) -> Result<InsertOutcome> {
        let mut component = Component::new(ComponentKind::IdentityConstraint, constraint.name.clone()).compiled();
        if let Some(location) = &constraint.location {
            component = component.with_location(location.clone());
        }

        let (id, outcome) = maps.declare(component, sink)?;
        if outcome == InsertOutcome::Inserted {
            self.constraints
                .insert(constraint.name.clone(), (id, Arc::new(constraint)));
        }
        Ok(outcome)
    }

    /// Get a constraint by name
    pub fn get(&self, name: &QName) -> Option<&Arc<CompiledIdentityConstraint>> {
        self.constraints.get(name).map(|(_, c)| c)
    }

    /// Get the component id of a constraint
    pub fn component_id(&self, name: &QName) -> Option<ComponentId> {
        self.constraints.get(name).map(|(id, _)| *id)
    }

    /// Iterate over constraints in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<CompiledIdentityConstraint>> {
        self.constraints.values().map(|(_, c)| c)
    }

    /// Get the number of constraints
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// Check if the set is empty
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Bind every keyref to the constraint named by its `refer`
    ///
    /// Keyrefs whose target is missing, is itself a keyref, or has a
    /// different number of fields are reported through the sink and left
    /// out of the result.
    pub fn bind_keyrefs(&self, sink: &mut ValidationEventSink<'_>) -> Result<Vec<KeyrefBinding>> {
        let mut bindings = Vec::new();

        for keyref in self.iter().filter(|c| c.is_keyref()) {
            let Some(refer) = keyref.refer() else {
                continue;
            };
            let location = keyref.location.clone();

            let Some(target) = self.get(refer) else {
                sink.report_code(
                    EventCode::UnknownReferredKey,
                    vec![refer.to_string(), keyref.name.to_string()],
                    Severity::Error,
                    location,
                )?;
                continue;
            };

            if target.is_keyref() {
                sink.report_code(
                    EventCode::ReferToKeyref,
                    vec![refer.to_string(), keyref.name.to_string()],
                    Severity::Error,
                    location,
                )?;
                continue;
            }

            if target.field_count() != keyref.field_count() {
                sink.report_code(
                    EventCode::KeyrefFieldCountMismatch,
                    vec![
                        refer.to_string(),
                        keyref.name.to_string(),
                        keyref.field_count().to_string(),
                        target.field_count().to_string(),
                    ],
                    Severity::Error,
                    location,
                )?;
                continue;
            }

            debug!(keyref = %keyref.name, refer = %refer, "bound keyref");
            bindings.push(KeyrefBinding {
                keyref: Arc::clone(keyref),
                target: Arc::clone(target),
            });
        }

        Ok(bindings)
    }
}
