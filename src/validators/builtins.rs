//! Reserved `xml:` namespace built-ins
//!
//! The `xml:` namespace comes with a fixed set of global attributes and
//! the `xml:specialAttrs` attribute group. They are defined once per
//! process ([`BuiltinComponents::xml`]) and handed explicitly to the
//! attribute resolver and to [`GlobalMaps`](super::globals::GlobalMaps),
//! so tests can substitute their own set.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use std::sync::Arc;

use crate::namespaces::QName;
use crate::{XML_NAMESPACE, XSD_NAMESPACE};

use super::attributes::{AttributeType, XsdAttribute, XsdAttributeGroup};

// Type names
/// XSD anySimpleType type name
pub const XSD_ANY_SIMPLE_TYPE: &str = "anySimpleType";
/// XSD string type name
pub const XSD_STRING: &str = "string";
/// XSD language type name
pub const XSD_LANGUAGE: &str = "language";
/// XSD NCName type name
pub const XSD_NCNAME: &str = "NCName";
/// XSD anyURI type name
pub const XSD_ANY_URI: &str = "anyURI";
/// XSD ID type name
pub const XSD_ID: &str = "ID";

/// Name of the `xml:specialAttrs` attribute group
pub const XML_SPECIAL_ATTRS: &str = "specialAttrs";

static XML_BUILTINS: Lazy<BuiltinComponents> = Lazy::new(BuiltinComponents::build_xml);

/// Built-in attribute and attribute group declarations
#[derive(Debug, Clone, Default)]
pub struct BuiltinComponents {
    attributes: IndexMap<QName, Arc<XsdAttribute>>,
    attribute_groups: IndexMap<QName, Arc<XsdAttributeGroup>>,
}

impl BuiltinComponents {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide `xml:` namespace built-ins
    pub fn xml() -> &'static BuiltinComponents {
        &XML_BUILTINS
    }

    fn build_xml() -> Self {
        let xsd = |local: &str| AttributeType::new(QName::namespaced(XSD_NAMESPACE, local));
        let xml = |local: &str| QName::namespaced(XML_NAMESPACE, local);

        let attributes = [
            XsdAttribute::new(xml("lang"), xsd(XSD_LANGUAGE)),
            XsdAttribute::new(xml("space"), xsd(XSD_NCNAME)),
            XsdAttribute::new(xml("base"), xsd(XSD_ANY_URI)),
            XsdAttribute::new(xml("id"), xsd(XSD_ID)),
        ]
        .map(Arc::new);

        let special = XsdAttributeGroup::with_uses(xml(XML_SPECIAL_ATTRS), attributes.clone());
        attributes
            .into_iter()
            .fold(Self::new(), Self::with_attribute)
            .with_attribute_group(Arc::new(special))
    }

    /// Add an attribute declaration
    pub fn with_attribute(mut self, attr: Arc<XsdAttribute>) -> Self {
        self.attributes.insert(attr.name().clone(), attr);
        self
    }

    /// Add an attribute group
    pub fn with_attribute_group(mut self, group: Arc<XsdAttributeGroup>) -> Self {
        if let Some(name) = group.name().cloned() {
            self.attribute_groups.insert(name, group);
        }
        self
    }

    /// Get a built-in attribute declaration
    pub fn attribute(&self, name: &QName) -> Option<&Arc<XsdAttribute>> {
        self.attributes.get(name)
    }

    /// Get a built-in attribute group
    pub fn attribute_group(&self, name: &QName) -> Option<&Arc<XsdAttributeGroup>> {
        self.attribute_groups.get(name)
    }

    /// Names of the built-in attributes
    pub fn attribute_names(&self) -> impl Iterator<Item = &QName> {
        self.attributes.keys()
    }

    /// Names of the built-in attribute groups
    pub fn attribute_group_names(&self) -> impl Iterator<Item = &QName> {
        self.attribute_groups.keys()
    }

    /// Check if the set is empty
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.attribute_groups.is_empty()
    }
}
