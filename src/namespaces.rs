//! XML namespace handling
//!
//! This module provides qualified names (QNames) and the namespace prefix
//! context used to resolve prefixed names inside schema documents.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fmt;

/// XML Namespace URI
pub type NamespaceUri = String;

/// Namespace prefix
pub type Prefix = String;

/// Qualified name (QName) - combination of namespace and local name
///
/// The empty namespace URI stands for "no namespace" (absent).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    /// Namespace URI (empty for no namespace)
    pub namespace: NamespaceUri,
    /// Local name
    pub local_name: String,
}

impl QName {
    /// Create a new QName
    pub fn new(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local_name: local_name.into(),
        }
    }

    /// Create a QName without a namespace
    pub fn local(local_name: impl Into<String>) -> Self {
        Self::new(String::new(), local_name)
    }

    /// Create a QName with a namespace
    pub fn namespaced(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self::new(namespace, local_name)
    }

    /// Check if the name has no namespace
    pub fn is_unqualified(&self) -> bool {
        self.namespace.is_empty()
    }

    /// Check if the name is empty (anonymous component)
    pub fn is_empty(&self) -> bool {
        self.local_name.is_empty()
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.local_name)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.local_name)
        }
    }
}

/// Namespace context for resolving prefixes
#[derive(Debug, Clone)]
pub struct NamespaceContext {
    /// Mapping from prefix to namespace URI
    prefixes: HashMap<Prefix, NamespaceUri>,
    /// Default namespace (no prefix)
    default_namespace: Option<NamespaceUri>,
}

impl NamespaceContext {
    /// Create a new namespace context with the `xml` prefix pre-bound
    pub fn new() -> Self {
        let mut prefixes = HashMap::new();
        prefixes.insert("xml".to_string(), crate::XML_NAMESPACE.to_string());
        Self {
            prefixes,
            default_namespace: None,
        }
    }

    /// Add a namespace prefix mapping
    pub fn add_prefix(&mut self, prefix: impl Into<String>, namespace: impl Into<String>) {
        self.prefixes.insert(prefix.into(), namespace.into());
    }

    /// Builder form of [`add_prefix`](Self::add_prefix)
    pub fn with_prefix(mut self, prefix: impl Into<String>, namespace: impl Into<String>) -> Self {
        self.add_prefix(prefix, namespace);
        self
    }

    /// Set the default namespace
    pub fn set_default_namespace(&mut self, namespace: impl Into<String>) {
        self.default_namespace = Some(namespace.into());
    }

    /// Get the namespace for a prefix
    pub fn get_namespace(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(|s| s.as_str())
    }

    /// Get the default namespace
    pub fn get_default_namespace(&self) -> Option<&str> {
        self.default_namespace.as_deref()
    }

    /// Resolve a prefixed name to a QName
    ///
    /// Unprefixed names take the default namespace, if one is set.
    pub fn resolve(&self, prefixed_name: &str) -> Result<QName> {
        if let Some((prefix, local)) = prefixed_name.split_once(':') {
            let namespace = self
                .get_namespace(prefix)
                .ok_or_else(|| Error::Namespace(format!("Unknown prefix: {}", prefix)))?;
            Ok(QName::namespaced(namespace, local))
        } else {
            Ok(QName::new(
                self.default_namespace.clone().unwrap_or_default(),
                prefixed_name,
            ))
        }
    }
}

impl Default for NamespaceContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qname_creation() {
        let qname = QName::namespaced("http://example.com", "element");
        assert_eq!(qname.namespace, "http://example.com");
        assert_eq!(qname.local_name, "element");
        assert!(!qname.is_unqualified());
        assert!(QName::local("a").is_unqualified());
    }

    #[test]
    fn test_qname_display() {
        let qname = QName::namespaced("http://example.com", "element");
        assert_eq!(qname.to_string(), "{http://example.com}element");

        let qname_local = QName::local("element");
        assert_eq!(qname_local.to_string(), "element");
    }

    #[test]
    fn test_qname_equality_is_by_value() {
        assert_eq!(QName::new("", "a"), QName::local("a"));
        assert_ne!(QName::new("u", "a"), QName::local("a"));
    }

    #[test]
    fn test_namespace_context() {
        let mut ctx = NamespaceContext::new();
        ctx.add_prefix("xs", "http://www.w3.org/2001/XMLSchema");
        ctx.set_default_namespace("http://example.com");

        assert_eq!(ctx.get_namespace("xs"), Some("http://www.w3.org/2001/XMLSchema"));
        assert_eq!(ctx.get_namespace("xml"), Some(crate::XML_NAMESPACE));
        assert_eq!(ctx.get_default_namespace(), Some("http://example.com"));
    }

    #[test]
    fn test_resolve_prefixed_name() {
        let ctx = NamespaceContext::new().with_prefix("xs", "http://www.w3.org/2001/XMLSchema");

        let qname = ctx.resolve("xs:element").unwrap();
        assert_eq!(qname.namespace, "http://www.w3.org/2001/XMLSchema");
        assert_eq!(qname.local_name, "element");

        assert!(ctx.resolve("nope:element").is_err());
        assert_eq!(ctx.resolve("plain").unwrap(), QName::local("plain"));
    }
}
