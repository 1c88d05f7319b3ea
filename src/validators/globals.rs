//! Global XSD components and component tables
//!
//! Components live in a [`ComponentStore`] arena and are referred to by
//! [`ComponentId`]. A redefinition points at the component it redefines by
//! id, so several redefinitions may share one predecessor without owning it.
//!
//! [`GlobalMaps`] keeps one [`ComponentTable`] per kind family. Every
//! insertion under an already used name goes through the
//! [`ComponentRedefineResolver`], which decides between replacing the entry,
//! keeping it silently, or reporting a duplicate.

use indexmap::{IndexMap, IndexSet};
use std::fmt;
use std::ops::Index;
use tracing::debug;

use crate::error::{InternalError, Result};
use crate::limits::Limits;
use crate::namespaces::QName;
use crate::XML_NAMESPACE;

use super::builtins::BuiltinComponents;
use super::exceptions::{EventCode, Severity, SourceLocation};
use super::validation::ValidationEventSink;

/// Kind of a global component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// xs:simpleType
    SimpleType,
    /// xs:complexType
    ComplexType,
    /// xs:group
    Group,
    /// xs:attributeGroup
    AttributeGroup,
    /// xs:attribute
    Attribute,
    /// xs:element
    Element,
    /// xs:notation
    Notation,
    /// xs:key, xs:keyref or xs:unique
    IdentityConstraint,
}

impl ComponentKind {
    /// Get the kind as used in diagnostics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SimpleType => "simpleType",
            Self::ComplexType => "complexType",
            Self::Group => "group",
            Self::AttributeGroup => "attributeGroup",
            Self::Attribute => "attribute",
            Self::Element => "element",
            Self::Notation => "notation",
            Self::IdentityConstraint => "identity constraint",
        }
    }

    /// Check if the kind can be redefined with xs:redefine
    pub fn is_redefinable(&self) -> bool {
        matches!(
            self,
            Self::SimpleType | Self::ComplexType | Self::Group | Self::AttributeGroup
        )
    }

    /// Check if the kind has built-in instances in the `xml:` namespace
    pub fn has_builtins(&self) -> bool {
        matches!(self, Self::Attribute | Self::AttributeGroup)
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Handle of a component in a [`ComponentStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(usize);

impl ComponentId {
    /// Position in the store
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A global component as seen by the component tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// Qualified name
    pub name: QName,
    /// Component kind
    pub kind: ComponentKind,
    /// The component this one redefines
    pub redefined: Option<ComponentId>,
    /// Whether the content model or attribute uses have been computed
    pub compiled: bool,
    /// Declaration site
    pub location: Option<SourceLocation>,
}

impl Component {
    /// Create an uncompiled component
    pub fn new(kind: ComponentKind, name: QName) -> Self {
        Self {
            name,
            kind,
            redefined: None,
            compiled: false,
            location: None,
        }
    }

    /// Set the redefined component
    pub fn with_redefined(mut self, redefined: ComponentId) -> Self {
        self.redefined = Some(redefined);
        self
    }

    /// Set the declaration site
    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Mark as compiled
    pub fn compiled(mut self) -> Self {
        self.compiled = true;
        self
    }
}

/// Arena owning all components of a compilation
#[derive(Debug, Clone, Default)]
pub struct ComponentStore {
    components: Vec<Component>,
    limits: Limits,
}

impl ComponentStore {
    /// Create an empty store with default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store with the given limits
    pub fn with_limits(limits: Limits) -> Self {
        Self {
            components: Vec::new(),
            limits,
        }
    }

    /// Add a component and return its handle
    pub fn add(&mut self, component: Component) -> Result<ComponentId> {
        self.limits
            .check_schema_components(self.components.len() + 1)?;
        self.components.push(component);
        Ok(ComponentId(self.components.len() - 1))
    }

    /// Get a component
    pub fn get(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(id.0)
    }

    /// Mark a component as compiled
    pub fn mark_compiled(&mut self, id: ComponentId) -> Result<()> {
        match self.components.get_mut(id.0) {
            Some(component) => {
                component.compiled = true;
                Ok(())
            }
            None => Err(unknown_component(id)),
        }
    }

    /// Number of components
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Iterate over components with their handles
    pub fn iter(&self) -> impl Iterator<Item = (ComponentId, &Component)> {
        self.components
            .iter()
            .enumerate()
            .map(|(i, c)| (ComponentId(i), c))
    }
}

impl Index<ComponentId> for ComponentStore {
    type Output = Component;

    fn index(&self, id: ComponentId) -> &Component {
        &self.components[id.0]
    }
}

fn unknown_component(id: ComponentId) -> crate::error::Error {
    InternalError::new(format!("component #{} is not in the store", id.0)).into()
}

/// Insertion-ordered map from names to live components
#[derive(Debug, Clone, Default)]
pub struct ComponentTable {
    entries: IndexMap<QName, ComponentId>,
}

impl ComponentTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the live component for a name
    pub fn get(&self, name: &QName) -> Option<ComponentId> {
        self.entries.get(name).copied()
    }

    /// Check if a name has a live entry
    pub fn contains(&self, name: &QName) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&QName, ComponentId)> {
        self.entries.iter().map(|(name, id)| (name, *id))
    }
}

/// Handles of the built-in components registered in a store
#[derive(Debug, Clone, Default)]
pub struct BuiltinSet {
    ids: IndexSet<ComponentId>,
}

impl BuiltinSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a built-in component
    pub fn insert(&mut self, id: ComponentId) {
        self.ids.insert(id);
    }

    /// Check if a component is a built-in
    pub fn contains(&self, id: ComponentId) -> bool {
        self.ids.contains(&id)
    }

    /// Iterate over built-in handles
    pub fn iter(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.ids.iter().copied()
    }
}

/// Result of inserting a component into a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The name was free
    Inserted,
    /// The incoming component replaced the previous entry
    Replaced(ComponentId),
    /// The entry was already in place, nothing changed
    Unchanged,
    /// The incoming component was dropped silently
    Discarded,
    /// A duplicate was reported; the previous entry is kept
    Duplicate,
}

/// Reconciles insertions under names that already have a live entry
#[derive(Debug, Clone, Copy)]
pub struct ComponentRedefineResolver<'b> {
    builtins: &'b BuiltinSet,
}

impl<'b> ComponentRedefineResolver<'b> {
    /// Create a resolver aware of the given built-ins
    pub fn new(builtins: &'b BuiltinSet) -> Self {
        Self { builtins }
    }

    /// Insert a component into a table
    ///
    /// Rules, first match wins:
    /// 1. the same component again is a no-op;
    /// 2. for `xml:` attributes and attribute groups, a user component
    ///    replaces a built-in and a built-in never replaces a user component;
    /// 3. for redefinable kinds, a redefinition replaces its uncompiled
    ///    original, is dropped if the original is already compiled, and the
    ///    original arriving after its redefinition is a no-op;
    /// 4. anything else is a duplicate, reported through the sink.
    ///
    /// Components must be inserted in declaration order.
    pub fn insert(
        &self,
        table: &mut ComponentTable,
        store: &ComponentStore,
        incoming: ComponentId,
        sink: &mut ValidationEventSink<'_>,
    ) -> Result<InsertOutcome> {
        let item = store.get(incoming).ok_or_else(|| unknown_component(incoming))?;

        let Some(existing) = table.get(&item.name) else {
            table.entries.insert(item.name.clone(), incoming);
            return Ok(InsertOutcome::Inserted);
        };
        let current = store.get(existing).ok_or_else(|| unknown_component(existing))?;

        if existing == incoming {
            return Ok(InsertOutcome::Unchanged);
        }

        if item.kind.has_builtins() && item.name.namespace == XML_NAMESPACE {
            if self.builtins.contains(existing) {
                debug!(name = %item.name, kind = %item.kind, "replacing built-in component");
                table.entries.insert(item.name.clone(), incoming);
                return Ok(InsertOutcome::Replaced(existing));
            }
            if self.builtins.contains(incoming) {
                debug!(name = %item.name, kind = %item.kind, "keeping user component over built-in");
                return Ok(InsertOutcome::Discarded);
            }
        }

        if item.kind.is_redefinable() {
            if item.redefined == Some(existing) {
                if current.compiled {
                    debug!(name = %item.name, kind = %item.kind, "redefined component already compiled");
                    return Ok(InsertOutcome::Discarded);
                }
                debug!(name = %item.name, kind = %item.kind, "installing redefinition");
                table.entries.insert(item.name.clone(), incoming);
                return Ok(InsertOutcome::Replaced(existing));
            }
            if current.redefined == Some(incoming) {
                return Ok(InsertOutcome::Unchanged);
            }
        }

        debug!(name = %item.name, kind = %item.kind, "duplicate component");
        sink.report_code(
            EventCode::DuplicateComponent,
            vec![item.kind.to_string(), item.name.to_string()],
            Severity::Error,
            item.location.clone(),
        )?;
        Ok(InsertOutcome::Duplicate)
    }
}

/// Component tables of a schema set, one per kind family
#[derive(Debug, Clone, Default)]
pub struct GlobalMaps {
    store: ComponentStore,
    builtins: BuiltinSet,
    /// Simple and complex type definitions
    pub types: ComponentTable,
    /// Global attribute declarations
    pub attributes: ComponentTable,
    /// Attribute group definitions
    pub attribute_groups: ComponentTable,
    /// Global element declarations
    pub elements: ComponentTable,
    /// Model group definitions
    pub groups: ComponentTable,
    /// Notation declarations
    pub notations: ComponentTable,
    /// Identity constraints
    pub identities: ComponentTable,
}

impl GlobalMaps {
    /// Create empty global maps with default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Create empty global maps with the given limits
    pub fn with_limits(limits: Limits) -> Self {
        Self {
            store: ComponentStore::with_limits(limits),
            ..Self::default()
        }
    }

    /// Register built-in attributes and attribute groups
    ///
    /// Built-ins are stored as compiled components and may later be
    /// replaced by user declarations of the same name.
    pub fn register_builtins(&mut self, builtins: &BuiltinComponents) -> Result<()> {
        let attributes = builtins
            .attribute_names()
            .map(|name| (ComponentKind::Attribute, name));
        let groups = builtins
            .attribute_group_names()
            .map(|name| (ComponentKind::AttributeGroup, name));

        for (kind, name) in attributes.chain(groups) {
            let id = self.store.add(Component::new(kind, name.clone()).compiled())?;
            self.builtins.insert(id);
            let table = match kind {
                ComponentKind::Attribute => &mut self.attributes,
                _ => &mut self.attribute_groups,
            };
            table.entries.insert(name.clone(), id);
        }
        Ok(())
    }

    /// Builder form of [`register_builtins`](Self::register_builtins)
    pub fn with_builtins(mut self, builtins: &BuiltinComponents) -> Result<Self> {
        self.register_builtins(builtins)?;
        Ok(self)
    }

    /// The component store
    pub fn store(&self) -> &ComponentStore {
        &self.store
    }

    /// Handles of the registered built-ins
    pub fn builtins(&self) -> &BuiltinSet {
        &self.builtins
    }

    /// Add a component to the store without inserting it in a table
    pub fn add(&mut self, component: Component) -> Result<ComponentId> {
        self.store.add(component)
    }

    /// Insert a stored component into the table of its kind
    pub fn insert(
        &mut self,
        id: ComponentId,
        sink: &mut ValidationEventSink<'_>,
    ) -> Result<InsertOutcome> {
        let kind = self.store.get(id).ok_or_else(|| unknown_component(id))?.kind;
        let table = match kind {
            ComponentKind::SimpleType | ComponentKind::ComplexType => &mut self.types,
            ComponentKind::Attribute => &mut self.attributes,
            ComponentKind::AttributeGroup => &mut self.attribute_groups,
            ComponentKind::Element => &mut self.elements,
            ComponentKind::Group => &mut self.groups,
            ComponentKind::Notation => &mut self.notations,
            ComponentKind::IdentityConstraint => &mut self.identities,
        };
        ComponentRedefineResolver::new(&self.builtins).insert(table, &self.store, id, sink)
    }

    /// Add a component to the store and insert it in its table
    pub fn declare(
        &mut self,
        component: Component,
        sink: &mut ValidationEventSink<'_>,
    ) -> Result<(ComponentId, InsertOutcome)> {
        let id = self.add(component)?;
        let outcome = self.insert(id, sink)?;
        Ok((id, outcome))
    }

    /// Mark a component as compiled
    pub fn mark_compiled(&mut self, id: ComponentId) -> Result<()> {
        self.store.mark_compiled(id)
    }

    /// Get a component
    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        self.store.get(id)
    }

    // ========== Lookups ==========

    /// Look up a type by name
    pub fn lookup_type(&self, name: &QName) -> Option<ComponentId> {
        self.types.get(name)
    }

    /// Look up an attribute by name
    pub fn lookup_attribute(&self, name: &QName) -> Option<ComponentId> {
        self.attributes.get(name)
    }

    /// Look up an attribute group by name
    pub fn lookup_attribute_group(&self, name: &QName) -> Option<ComponentId> {
        self.attribute_groups.get(name)
    }

    /// Look up an element by name
    pub fn lookup_element(&self, name: &QName) -> Option<ComponentId> {
        self.elements.get(name)
    }

    /// Look up a group by name
    pub fn lookup_group(&self, name: &QName) -> Option<ComponentId> {
        self.groups.get(name)
    }

    /// Look up a notation by name
    pub fn lookup_notation(&self, name: &QName) -> Option<ComponentId> {
        self.notations.get(name)
    }

    /// Look up an identity constraint by name
    pub fn lookup_identity(&self, name: &QName) -> Option<ComponentId> {
        self.identities.get(name)
    }

    /// Get total count of live entries
    pub fn len(&self) -> usize {
        self.types.len()
            + self.attributes.len()
            + self.attribute_groups.len()
            + self.elements.len()
            + self.groups.len()
            + self.notations.len()
            + self.identities.len()
    }

    /// Check if all tables are empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::validators::exceptions::ValidationEvent;

    fn complex(local: &str) -> Component {
        Component::new(ComponentKind::ComplexType, QName::namespaced("urn:a", local))
    }

    #[test]
    fn test_insert_new_name() {
        let mut maps = GlobalMaps::new();
        let mut sink = ValidationEventSink::new();
        let (id, outcome) = maps.declare(complex("T"), &mut sink).unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted);
        assert_eq!(maps.lookup_type(&QName::namespaced("urn:a", "T")), Some(id));
    }

    #[test]
    fn test_same_instance_is_noop() {
        let mut maps = GlobalMaps::new();
        let mut sink = ValidationEventSink::new();
        let (id, _) = maps.declare(complex("T"), &mut sink).unwrap();
        assert_eq!(maps.insert(id, &mut sink).unwrap(), InsertOutcome::Unchanged);
        assert!(!sink.has_errors());
    }

    #[test]
    fn test_redefinition_replaces_uncompiled_original() {
        let mut maps = GlobalMaps::new();
        let mut sink = ValidationEventSink::new();
        let (a, _) = maps.declare(complex("T"), &mut sink).unwrap();
        let (b, outcome) = maps
            .declare(complex("T").with_redefined(a), &mut sink)
            .unwrap();

        assert_eq!(outcome, InsertOutcome::Replaced(a));
        let name = QName::namespaced("urn:a", "T");
        assert_eq!(maps.lookup_type(&name), Some(b));

        assert_eq!(maps.insert(a, &mut sink).unwrap(), InsertOutcome::Unchanged);
        assert_eq!(maps.lookup_type(&name), Some(b));
        assert!(!sink.has_errors());
    }

    #[test]
    fn test_redefinition_of_compiled_original_is_dropped() {
        let mut maps = GlobalMaps::new();
        let mut sink = ValidationEventSink::new();
        let (a, _) = maps.declare(complex("T"), &mut sink).unwrap();
        maps.mark_compiled(a).unwrap();

        let (_, outcome) = maps
            .declare(complex("T").with_redefined(a), &mut sink)
            .unwrap();
        assert_eq!(outcome, InsertOutcome::Discarded);
        assert_eq!(maps.lookup_type(&QName::namespaced("urn:a", "T")), Some(a));
        assert!(!sink.has_errors());
    }

    #[test]
    fn test_unrelated_duplicate_reported_once() {
        let mut maps = GlobalMaps::new();
        let mut events: Vec<ValidationEvent> = Vec::new();
        let (a, outcome) = {
            let mut sink = ValidationEventSink::with_handler(&mut events);
            let (a, _) = maps.declare(complex("T"), &mut sink).unwrap();
            let (_, outcome) = maps.declare(complex("T"), &mut sink).unwrap();
            (a, outcome)
        };

        assert_eq!(outcome, InsertOutcome::Duplicate);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].code, EventCode::DuplicateComponent);
        assert_eq!(
            events[0].args,
            vec!["complexType".to_string(), "{urn:a}T".to_string()]
        );
        assert_eq!(maps.lookup_type(&QName::namespaced("urn:a", "T")), Some(a));
    }

    #[test]
    fn test_duplicate_without_handler_aborts() {
        let mut maps = GlobalMaps::new();
        let mut sink = ValidationEventSink::new();
        maps.declare(complex("T"), &mut sink).unwrap();
        let result = maps.declare(complex("T"), &mut sink);
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_non_redefinable_kind_is_duplicate() {
        let mut maps = GlobalMaps::new();
        let mut events: Vec<ValidationEvent> = Vec::new();
        let mut sink = ValidationEventSink::with_handler(&mut events);
        let name = QName::local("e");
        let (a, _) = maps
            .declare(Component::new(ComponentKind::Element, name.clone()), &mut sink)
            .unwrap();
        let (_, outcome) = maps
            .declare(
                Component::new(ComponentKind::Element, name).with_redefined(a),
                &mut sink,
            )
            .unwrap();
        assert_eq!(outcome, InsertOutcome::Duplicate);
    }

    #[test]
    fn test_types_share_one_table() {
        let mut maps = GlobalMaps::new();
        let mut events: Vec<ValidationEvent> = Vec::new();
        let mut sink = ValidationEventSink::with_handler(&mut events);
        let name = QName::local("T");
        maps.declare(Component::new(ComponentKind::SimpleType, name.clone()), &mut sink)
            .unwrap();
        let (_, outcome) = maps
            .declare(Component::new(ComponentKind::ComplexType, name), &mut sink)
            .unwrap();
        assert_eq!(outcome, InsertOutcome::Duplicate);
    }

    #[test]
    fn test_builtin_replaced_by_user_attribute() {
        let mut maps = GlobalMaps::new()
            .with_builtins(BuiltinComponents::xml())
            .unwrap();
        let mut sink = ValidationEventSink::new();
        let lang = QName::namespaced(XML_NAMESPACE, "lang");
        let builtin = maps.lookup_attribute(&lang).unwrap();
        assert!(maps.builtins().contains(builtin));

        let (user, outcome) = maps
            .declare(Component::new(ComponentKind::Attribute, lang.clone()), &mut sink)
            .unwrap();
        assert_eq!(outcome, InsertOutcome::Replaced(builtin));
        assert_eq!(maps.lookup_attribute(&lang), Some(user));

        assert_eq!(maps.insert(builtin, &mut sink).unwrap(), InsertOutcome::Discarded);
        assert_eq!(maps.lookup_attribute(&lang), Some(user));
        assert!(!sink.has_errors());
    }

    #[test]
    fn test_substitute_builtins() {
        use crate::validators::attributes::XsdAttribute;
        use std::sync::Arc;

        let custom = BuiltinComponents::new().with_attribute(Arc::new(XsdAttribute::untyped(
            QName::namespaced(XML_NAMESPACE, "custom"),
        )));
        let maps = GlobalMaps::new().with_builtins(&custom).unwrap();
        assert_eq!(maps.attributes.len(), 1);
        assert!(maps.lookup_attribute(&QName::namespaced(XML_NAMESPACE, "lang")).is_none());
    }

    #[test]
    fn test_store_limit() {
        let limits = Limits {
            max_schema_components: 1,
            ..Limits::default()
        };
        let mut maps = GlobalMaps::with_limits(limits);
        let mut sink = ValidationEventSink::new();
        maps.declare(complex("A"), &mut sink).unwrap();
        assert!(matches!(
            maps.declare(complex("B"), &mut sink),
            Err(Error::LimitExceeded(_))
        ));
    }

    #[test]
    fn test_table_keeps_insertion_order() {
        let mut maps = GlobalMaps::new();
        let mut sink = ValidationEventSink::new();
        let (a, _) = maps.declare(complex("A"), &mut sink).unwrap();
        maps.declare(complex("B"), &mut sink).unwrap();
        maps.declare(complex("A").with_redefined(a), &mut sink).unwrap();

        let names: Vec<&str> = maps
            .types
            .iter()
            .map(|(name, _)| name.local_name.as_str())
            .collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(maps.len(), 2);
    }
}
