//! XSD attribute declarations and attribute resolution
//!
//! This module implements attribute declarations, the attribute sets of
//! complex types and attribute groups, and the decision procedure that
//! classifies an observed attribute against an element's attribute set,
//! its wildcard and the global attribute declarations.

use indexmap::{IndexMap, IndexSet};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

use crate::error::{GrammarError, GrammarErrorKind, Result};
use crate::namespaces::QName;
use crate::{XMLNS_NAMESPACE, XML_NAMESPACE, XSD_NAMESPACE, XSI_NAMESPACE};

use super::builtins::{BuiltinComponents, XSD_ANY_SIMPLE_TYPE, XSD_ID, XSD_STRING};
use super::exceptions::EventCode;
use super::validation::ValidationEventSink;
use super::wildcards::{AnyAttribute, ProcessContents};

/// Attribute use mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttributeUse {
    /// Attribute is optional (default)
    #[default]
    Optional,
    /// Attribute is required
    Required,
    /// Attribute is prohibited
    Prohibited,
}

impl AttributeUse {
    /// Parse from string value
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "optional" => Some(AttributeUse::Optional),
            "required" => Some(AttributeUse::Required),
            "prohibited" => Some(AttributeUse::Prohibited),
            _ => None,
        }
    }

    /// Get the use as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeUse::Optional => "optional",
            AttributeUse::Required => "required",
            AttributeUse::Prohibited => "prohibited",
        }
    }
}

impl fmt::Display for AttributeUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Handle to the simple type of an attribute
///
/// Only the type name and whether the type is derived from `xs:ID` matter
/// to attribute resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeType {
    name: QName,
    derived_from_id: bool,
}

impl AttributeType {
    /// Create a type handle; `xs:ID` itself is recognized as an ID type
    pub fn new(name: QName) -> Self {
        let derived_from_id = name.namespace == XSD_NAMESPACE && name.local_name == XSD_ID;
        Self {
            name,
            derived_from_id,
        }
    }

    /// `xs:anySimpleType`
    pub fn any_simple() -> Self {
        Self::new(QName::namespaced(XSD_NAMESPACE, XSD_ANY_SIMPLE_TYPE))
    }

    /// `xs:string`
    pub fn string() -> Self {
        Self::new(QName::namespaced(XSD_NAMESPACE, XSD_STRING))
    }

    /// `xs:ID`
    pub fn id() -> Self {
        Self::new(QName::namespaced(XSD_NAMESPACE, XSD_ID))
    }

    /// Mark a user-defined type as derived from `xs:ID`
    pub fn with_id_derivation(mut self) -> Self {
        self.derived_from_id = true;
        self
    }

    /// Type name
    pub fn name(&self) -> &QName {
        &self.name
    }

    /// Check if the type is `xs:ID` or derived from it
    pub fn is_id(&self) -> bool {
        self.derived_from_id
    }
}

/// XSD attribute declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XsdAttribute {
    name: QName,
    attr_type: AttributeType,
    use_mode: AttributeUse,
    default: Option<String>,
    fixed: Option<String>,
}

impl XsdAttribute {
    /// Create a new optional attribute declaration
    pub fn new(name: QName, attr_type: AttributeType) -> Self {
        Self {
            name,
            attr_type,
            use_mode: AttributeUse::Optional,
            default: None,
            fixed: None,
        }
    }

    /// Create an optional attribute of type `xs:anySimpleType`
    pub fn untyped(name: QName) -> Self {
        Self::new(name, AttributeType::any_simple())
    }

    /// Builder form of [`set_use`](Self::set_use)
    pub fn with_use(mut self, use_mode: AttributeUse) -> Self {
        self.use_mode = use_mode;
        self
    }

    /// Get the attribute name
    pub fn name(&self) -> &QName {
        &self.name
    }

    /// Get the attribute type
    pub fn attribute_type(&self) -> &AttributeType {
        &self.attr_type
    }

    /// Get the use mode
    pub fn use_mode(&self) -> AttributeUse {
        self.use_mode
    }

    /// Set the use mode
    pub fn set_use(&mut self, use_mode: AttributeUse) {
        self.use_mode = use_mode;
    }

    /// Set the default value
    pub fn set_default(&mut self, value: impl Into<String>) -> Result<()> {
        if self.fixed.is_some() {
            return Err(invalid_value_constraint(
                "'default' and 'fixed' attributes are mutually exclusive",
            ));
        }
        if self.use_mode != AttributeUse::Optional {
            return Err(invalid_value_constraint(
                "attribute 'use' must be 'optional' if 'default' is present",
            ));
        }
        self.default = Some(value.into());
        Ok(())
    }

    /// Set the fixed value
    pub fn set_fixed(&mut self, value: impl Into<String>) -> Result<()> {
        if self.default.is_some() {
            return Err(invalid_value_constraint(
                "'default' and 'fixed' attributes are mutually exclusive",
            ));
        }
        self.fixed = Some(value.into());
        Ok(())
    }

    /// Check if required
    pub fn is_required(&self) -> bool {
        self.use_mode == AttributeUse::Required
    }

    /// Check if optional
    pub fn is_optional(&self) -> bool {
        self.use_mode == AttributeUse::Optional
    }

    /// Check if prohibited
    pub fn is_prohibited(&self) -> bool {
        self.use_mode == AttributeUse::Prohibited
    }

    /// Check if the value is fixed
    pub fn is_fixed(&self) -> bool {
        self.fixed.is_some()
    }

    /// Check if the type is derived from `xs:ID`
    pub fn is_id(&self) -> bool {
        self.attr_type.is_id()
    }

    /// Default value
    pub fn default_value(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// Fixed value
    pub fn fixed_value(&self) -> Option<&str> {
        self.fixed.as_deref()
    }

    /// Value constraint: fixed value, or default value
    pub fn value_constraint(&self) -> Option<&str> {
        self.fixed.as_deref().or(self.default.as_deref())
    }
}

fn invalid_value_constraint(message: &str) -> crate::error::Error {
    GrammarError::new(GrammarErrorKind::InvalidValueConstraint, message).into()
}

/// Attribute set of a complex type or a named attribute group
///
/// Prohibited uses are kept apart from the declared uses, so that a
/// prohibited name never matches as a declared attribute.
#[derive(Debug, Clone, Default)]
pub struct XsdAttributeGroup {
    name: Option<QName>,
    attributes: IndexMap<QName, Arc<XsdAttribute>>,
    prohibited: IndexSet<QName>,
    any_attribute: Option<AnyAttribute>,
}

impl XsdAttributeGroup {
    /// Create a new named attribute group
    pub fn new(name: QName) -> Self {
        Self {
            name: Some(name),
            ..Self::default()
        }
    }

    /// Create a named group holding exactly the given uses
    ///
    /// Later uses replace earlier ones of the same name.
    pub(crate) fn with_uses<I>(name: QName, uses: I) -> Self
    where
        I: IntoIterator<Item = Arc<XsdAttribute>>,
    {
        Self {
            name: Some(name),
            attributes: uses
                .into_iter()
                .map(|attr| (attr.name().clone(), attr))
                .collect(),
            ..Self::default()
        }
    }

    /// Create an anonymous attribute set (the attribute uses of a type)
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Get the group name
    pub fn name(&self) -> Option<&QName> {
        self.name.as_ref()
    }

    /// Add an attribute use
    pub fn add_attribute(&mut self, attr: Arc<XsdAttribute>) -> Result<()> {
        let name = attr.name().clone();
        if self.attributes.contains_key(&name) || self.prohibited.contains(&name) {
            return Err(GrammarError::new(
                GrammarErrorKind::DuplicateAttributeUse,
                format!("duplicate attribute declaration: '{}'", name),
            )
            .into());
        }
        if attr.is_prohibited() {
            self.prohibited.insert(name);
        } else {
            self.attributes.insert(name, attr);
        }
        Ok(())
    }

    /// Merge a referenced attribute group
    ///
    /// Uses already present are kept. When both sets carry a wildcard, the
    /// result admits the intersection of their namespaces with the local
    /// process contents.
    pub fn add_group_ref(&mut self, group: &XsdAttributeGroup) -> Result<()> {
        let merged = match (&self.any_attribute, &group.any_attribute) {
            (Some(local), Some(other)) => Some(AnyAttribute::new(
                local.namespaces.intersection(&other.namespaces)?,
                local.process_contents,
            )),
            (None, Some(other)) => Some(other.clone()),
            (local, None) => local.clone(),
        };

        for (name, attr) in &group.attributes {
            if !self.attributes.contains_key(name) && !self.prohibited.contains(name) {
                self.attributes.insert(name.clone(), attr.clone());
            }
        }
        for name in &group.prohibited {
            if !self.attributes.contains_key(name) {
                self.prohibited.insert(name.clone());
            }
        }

        self.any_attribute = merged;
        Ok(())
    }

    /// Inherit the attribute uses of a base type, for derivation by extension
    ///
    /// Local uses override base uses of the same name. The wildcard becomes
    /// the union of the local and base wildcards.
    pub fn extend_from(&mut self, base: &XsdAttributeGroup) -> Result<()> {
        let merged = match (&self.any_attribute, &base.any_attribute) {
            (Some(local), Some(base)) => Some(AnyAttribute::new(
                local.namespaces.union(&base.namespaces)?,
                local.process_contents,
            )),
            (None, Some(base)) => Some(base.clone()),
            (local, None) => local.clone(),
        };

        for (name, attr) in &base.attributes {
            if !self.attributes.contains_key(name) && !self.prohibited.contains(name) {
                self.attributes.insert(name.clone(), attr.clone());
            }
        }
        self.any_attribute = merged;
        Ok(())
    }

    /// Set the any attribute wildcard
    pub fn set_any_attribute(&mut self, any: AnyAttribute) {
        self.any_attribute = Some(any);
    }

    /// Get the any attribute wildcard
    pub fn any_attribute(&self) -> Option<&AnyAttribute> {
        self.any_attribute.as_ref()
    }

    /// Get a declared (non-prohibited) attribute by name
    pub fn get_attribute(&self, name: &QName) -> Option<&Arc<XsdAttribute>> {
        self.attributes.get(name)
    }

    /// Check if an attribute name is prohibited
    pub fn is_prohibited(&self, name: &QName) -> bool {
        self.prohibited.contains(name)
    }

    /// Iterate over declared attributes in declaration order
    pub fn iter_attributes(&self) -> impl Iterator<Item = &Arc<XsdAttribute>> {
        self.attributes.values()
    }

    /// Iterate over required attribute names
    pub fn iter_required(&self) -> impl Iterator<Item = &QName> {
        self.attributes
            .iter()
            .filter(|(_, attr)| attr.is_required())
            .map(|(name, _)| name)
    }

    /// Check if any declared attribute has an ID type
    pub fn contains_id_attribute(&self) -> bool {
        self.attributes.values().any(|attr| attr.is_id())
    }

    /// Get the number of declared attributes
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Check if the set has no declared attributes
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// Global attribute declarations of a schema set
#[derive(Debug, Clone, Default)]
pub struct AttributePool {
    attributes: IndexMap<QName, Arc<XsdAttribute>>,
    namespaces: IndexSet<String>,
}

impl AttributePool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a global declaration, returning the one it replaces
    pub fn insert(&mut self, attr: Arc<XsdAttribute>) -> Option<Arc<XsdAttribute>> {
        self.namespaces.insert(attr.name().namespace.clone());
        self.attributes.insert(attr.name().clone(), attr)
    }

    /// Record a target namespace known to the schema set
    pub fn add_namespace(&mut self, namespace: impl Into<String>) {
        self.namespaces.insert(namespace.into());
    }

    /// Get a global declaration
    pub fn get(&self, name: &QName) -> Option<&Arc<XsdAttribute>> {
        self.attributes.get(name)
    }

    /// Check if the schema set has components in a namespace
    pub fn contains_namespace(&self, namespace: &str) -> bool {
        self.namespaces.contains(namespace)
    }

    /// Number of global declarations
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Check if the pool is empty
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// Partial validation target of a top-level attribute
#[derive(Debug, Clone)]
pub enum ResolveTarget {
    /// Validate against this attribute declaration
    Attribute(Arc<XsdAttribute>),
    /// An element declaration (never valid for attributes)
    Element(QName),
    /// A type definition (never valid for attributes)
    Type(QName),
}

/// Classification of an attribute against its element context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeMatch {
    /// Matched a declaration
    AttributeFound(Arc<XsdAttribute>),
    /// Matched a global ID-typed declaration through a wildcard
    AnyIdAttributeFound(Arc<XsdAttribute>),
    /// Name is in the element's prohibited set
    ProhibitedAttribute,
    /// The element's wildcard does not admit the namespace
    ProhibitedAnyAttribute,
    /// Admitted by a `skip` wildcard
    AnyAttributeSkip,
    /// Admitted by a `lax` wildcard, no global declaration
    AnyAttributeLax,
    /// Not declared and not admitted by a wildcard
    UndeclaredAttribute,
    /// No element context and no global declaration
    UndeclaredElementAndAttribute,
    /// Partial validation target has a different name
    AttributeNameMismatch,
    /// Partial validation target is not an attribute declaration
    InvalidCall,
}

impl AttributeMatch {
    /// The matched declaration, if any
    pub fn declaration(&self) -> Option<&Arc<XsdAttribute>> {
        match self {
            Self::AttributeFound(decl) | Self::AnyIdAttributeFound(decl) => Some(decl),
            _ => None,
        }
    }
}

/// Attribute-match decision procedure
#[derive(Debug, Clone, Copy)]
pub struct AttributeResolver<'a> {
    globals: &'a AttributePool,
    builtins: &'a BuiltinComponents,
}

impl<'a> AttributeResolver<'a> {
    /// Create a resolver over global declarations and reserved built-ins
    pub fn new(globals: &'a AttributePool, builtins: &'a BuiltinComponents) -> Self {
        Self { globals, builtins }
    }

    /// Global attribute declarations
    pub fn globals(&self) -> &'a AttributePool {
        self.globals
    }

    /// Classify an attribute name
    ///
    /// A partial validation target takes precedence over everything else.
    /// With an element context, its own declarations win over its wildcard;
    /// without one, only the global declarations are consulted.
    pub fn resolve(
        &self,
        element: Option<&XsdAttributeGroup>,
        name: &QName,
        target: Option<&ResolveTarget>,
    ) -> AttributeMatch {
        let result = match target {
            Some(target) => Self::resolve_target(target, name),
            None => match element {
                Some(element) => self.resolve_in_element(element, name),
                None => match self.globals.get(name) {
                    Some(decl) => AttributeMatch::AttributeFound(decl.clone()),
                    None => AttributeMatch::UndeclaredElementAndAttribute,
                },
            },
        };
        trace!(attribute = %name, outcome = ?result, "resolved attribute");
        result
    }

    fn resolve_target(target: &ResolveTarget, name: &QName) -> AttributeMatch {
        match target {
            ResolveTarget::Attribute(decl) if decl.name() == name => {
                AttributeMatch::AttributeFound(decl.clone())
            }
            ResolveTarget::Attribute(_) => AttributeMatch::AttributeNameMismatch,
            ResolveTarget::Element(_) | ResolveTarget::Type(_) => AttributeMatch::InvalidCall,
        }
    }

    fn resolve_in_element(&self, element: &XsdAttributeGroup, name: &QName) -> AttributeMatch {
        if let Some(decl) = element.get_attribute(name) {
            return AttributeMatch::AttributeFound(decl.clone());
        }

        match element.any_attribute() {
            Some(any) => {
                if !any.allows(name) {
                    return AttributeMatch::ProhibitedAnyAttribute;
                }
                if any.process_contents == ProcessContents::Skip {
                    return AttributeMatch::AnyAttributeSkip;
                }
                match self.globals.get(name) {
                    Some(decl) if decl.is_id() => AttributeMatch::AnyIdAttributeFound(decl.clone()),
                    Some(decl) => AttributeMatch::AttributeFound(decl.clone()),
                    None if any.process_contents == ProcessContents::Lax => {
                        AttributeMatch::AnyAttributeLax
                    }
                    None => AttributeMatch::UndeclaredAttribute,
                }
            }
            None if element.is_prohibited(name) => AttributeMatch::ProhibitedAttribute,
            None => AttributeMatch::UndeclaredAttribute,
        }
    }

    /// Reserved `xml:` built-in declaration for a name, if any
    pub fn builtin_attribute(&self, name: &QName) -> Option<Arc<XsdAttribute>> {
        if name.namespace != XML_NAMESPACE {
            return None;
        }
        self.builtins.attribute(name).cloned()
    }
}

const XSI_ATTRIBUTES: [&str; 4] = ["type", "nil", "schemaLocation", "noNamespaceSchemaLocation"];

/// Attributes seen on one element instance
#[derive(Debug, Clone)]
pub struct AttributePresence<'e> {
    element: Option<&'e XsdAttributeGroup>,
    target: Option<ResolveTarget>,
    process_contents: ProcessContents,
    seen: IndexMap<QName, Option<Arc<XsdAttribute>>>,
    wild_id: Option<Arc<XsdAttribute>>,
}

impl<'e> AttributePresence<'e> {
    /// Presence for an element with a declared type
    pub fn for_element(element: &'e XsdAttributeGroup) -> Self {
        Self {
            element: Some(element),
            target: None,
            process_contents: ProcessContents::Strict,
            seen: IndexMap::new(),
            wild_id: None,
        }
    }

    /// Presence for an element without a declaration, validated under
    /// the given process contents
    pub fn undeclared(process_contents: ProcessContents) -> Self {
        Self {
            element: None,
            target: None,
            process_contents,
            seen: IndexMap::new(),
            wild_id: None,
        }
    }

    /// Presence for partial validation of a top-level attribute
    pub fn top_level(target: ResolveTarget) -> Self {
        Self {
            target: Some(target),
            ..Self::undeclared(ProcessContents::Strict)
        }
    }

    /// Check if an attribute has already been seen
    pub fn contains(&self, name: &QName) -> bool {
        self.seen.contains_key(name)
    }

    /// Number of attributes seen
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Check if no attribute has been seen
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// The ID-typed attribute accepted through a wildcard, if any
    pub fn wildcard_id(&self) -> Option<&Arc<XsdAttribute>> {
        self.wild_id.as_ref()
    }
}

/// Routes attribute classifications through the event sink
#[derive(Debug, Clone, Copy)]
pub struct AttributeValidator<'a> {
    resolver: AttributeResolver<'a>,
}

impl<'a> AttributeValidator<'a> {
    /// Create a validator
    pub fn new(resolver: AttributeResolver<'a>) -> Self {
        Self { resolver }
    }

    /// Validate one attribute occurrence
    ///
    /// Returns the matched declaration, if any. Diagnostics go to the sink;
    /// an error is returned only when the sink aborts.
    pub fn validate_attribute(
        &self,
        presence: &mut AttributePresence<'_>,
        name: &QName,
        sink: &mut ValidationEventSink<'_>,
    ) -> Result<Option<Arc<XsdAttribute>>> {
        if name.namespace == XMLNS_NAMESPACE {
            return Ok(None);
        }
        if presence.contains(name) {
            sink.error(EventCode::DuplicateAttribute, vec![name.to_string()])?;
            return Ok(None);
        }

        if name.namespace == XSI_NAMESPACE {
            presence.seen.insert(name.clone(), None);
            if !XSI_ATTRIBUTES.contains(&name.local_name.as_str()) {
                sink.error(EventCode::NotXsiAttribute, vec![name.to_string()])?;
            }
            return Ok(None);
        }

        let outcome = self
            .resolver
            .resolve(presence.element, name, presence.target.as_ref());

        let decl = match outcome {
            AttributeMatch::AttributeFound(decl) => Some(decl),
            AttributeMatch::UndeclaredElementAndAttribute => {
                match self.resolver.builtin_attribute(name) {
                    Some(decl) => Some(decl),
                    None => {
                        if presence.element.is_none()
                            && presence.process_contents == ProcessContents::Strict
                            && !name.namespace.is_empty()
                            && self.resolver.globals().contains_namespace(&name.namespace)
                        {
                            sink.error(EventCode::UndeclaredAttribute, vec![name.to_string()])?;
                        } else if presence.process_contents != ProcessContents::Skip {
                            sink.warning(EventCode::NoAttributeSchemaFound, vec![name.to_string()])?;
                        }
                        None
                    }
                }
            }
            AttributeMatch::UndeclaredAttribute => {
                self.builtin_or_error(name, EventCode::UndeclaredAttribute, sink)?
            }
            AttributeMatch::ProhibitedAnyAttribute => {
                self.builtin_or_error(name, EventCode::ProhibitedAttribute, sink)?
            }
            AttributeMatch::ProhibitedAttribute => {
                sink.error(EventCode::ProhibitedAttribute, vec![name.to_string()])?;
                None
            }
            AttributeMatch::AttributeNameMismatch => {
                let target = match &presence.target {
                    Some(ResolveTarget::Attribute(decl)) => decl.name().to_string(),
                    _ => String::new(),
                };
                sink.error(
                    EventCode::AttributeNameMismatch,
                    vec![name.to_string(), target],
                )?;
                None
            }
            AttributeMatch::InvalidCall => {
                sink.error(EventCode::ValidateAttributeInvalidCall, Vec::new())?;
                None
            }
            AttributeMatch::AnyIdAttributeFound(decl) => {
                if presence.wild_id.is_some() {
                    sink.error(EventCode::MoreThanOneWildId, Vec::new())?;
                    None
                } else {
                    presence.wild_id = Some(decl.clone());
                    if presence.element.is_some_and(|e| e.contains_id_attribute()) {
                        sink.error(EventCode::AttrUseAndWildId, Vec::new())?;
                        None
                    } else {
                        Some(decl)
                    }
                }
            }
            AttributeMatch::AnyAttributeLax => {
                sink.warning(EventCode::NoAttributeSchemaFound, vec![name.to_string()])?;
                None
            }
            AttributeMatch::AnyAttributeSkip => None,
        };

        presence.seen.insert(name.clone(), decl.clone());
        Ok(decl)
    }

    fn builtin_or_error(
        &self,
        name: &QName,
        code: EventCode,
        sink: &mut ValidationEventSink<'_>,
    ) -> Result<Option<Arc<XsdAttribute>>> {
        match self.resolver.builtin_attribute(name) {
            Some(decl) => Ok(Some(decl)),
            None => {
                sink.error(code, vec![name.to_string()])?;
                Ok(None)
            }
        }
    }

    /// Report required attributes that were not seen on the element
    pub fn validate_required(
        &self,
        presence: &AttributePresence<'_>,
        sink: &mut ValidationEventSink<'_>,
    ) -> Result<()> {
        let Some(element) = presence.element else {
            return Ok(());
        };
        for name in element.iter_required() {
            if !presence.contains(name) {
                sink.error(EventCode::MissingRequiredAttribute, vec![name.to_string()])?;
            }
        }
        Ok(())
    }

    /// Declarations with a default or fixed value that were not seen
    pub fn unspecified_defaults(&self, presence: &AttributePresence<'_>) -> Vec<Arc<XsdAttribute>> {
        presence
            .element
            .map(|element| {
                element
                    .iter_attributes()
                    .filter(|attr| attr.value_constraint().is_some() && !presence.contains(attr.name()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}
