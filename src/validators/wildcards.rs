//! XSD namespace wildcards
//!
//! This module implements the namespace constraint of `xs:any` and
//! `xs:anyAttribute`:
//! - construction from the `namespace` attribute tokens
//! - membership (`allows`)
//! - the subset test used by derivation-by-restriction checks
//! - union and intersection used when attribute wildcards are merged
//!
//! Reference: https://www.w3.org/TR/xmlschema-1/#Wildcards
//!
//! Union and intersection follow the XSD 1.0 case tables. A wildcard built
//! in [`WildcardCompat::Legacy`] mode keeps the older outcomes for the
//! set-versus-`##other` combinations and lets `##other` admit unqualified
//! names.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::{GrammarError, GrammarErrorKind};
use crate::names::is_valid_uri_reference;
use crate::namespaces::QName;

/// Process contents mode for wildcards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessContents {
    /// Validate strictly - element/attribute must be declared
    #[default]
    Strict,
    /// Validate if declaration found, otherwise accept
    Lax,
    /// Skip validation entirely
    Skip,
}

impl ProcessContents {
    /// Parse from string value
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "strict" => Some(Self::Strict),
            "lax" => Some(Self::Lax),
            "skip" => Some(Self::Skip),
            _ => None,
        }
    }

    /// Check if this is a valid restriction of another process contents
    pub fn is_restriction_of(&self, other: &Self) -> bool {
        match (self, other) {
            (a, b) if a == b => true,
            (Self::Strict, _) => true,
            (Self::Lax, Self::Skip) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ProcessContents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Lax => write!(f, "lax"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

/// Compatibility mode of a wildcard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WildcardCompat {
    /// XSD 1.0 semantics
    #[default]
    Standard,
    /// Legacy behaviour kept for older grammars
    Legacy,
}

impl WildcardCompat {
    fn combine(self, other: Self) -> Self {
        if self == Self::Legacy || other == Self::Legacy {
            Self::Legacy
        } else {
            Self::Standard
        }
    }
}

/// Namespace constraint of a wildcard
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NamespaceConstraint {
    /// Any namespace, including none (`##any`)
    Any,
    /// Any namespace except the excluded one and no namespace (`##other`)
    Other(String),
    /// Enumerated namespaces; the empty string stands for no namespace
    Set(BTreeSet<String>),
}

impl NamespaceConstraint {
    /// Build a set constraint from namespace URIs
    pub fn set<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Set(namespaces.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for NamespaceConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "##any"),
            Self::Other(excluded) => write!(f, "##other (not '{}')", excluded),
            Self::Set(set) => {
                let tokens: Vec<&str> = set
                    .iter()
                    .map(|ns| if ns.is_empty() { "##local" } else { ns.as_str() })
                    .collect();
                write!(f, "{}", tokens.join(" "))
            }
        }
    }
}

/// Namespace wildcard with the target namespace of its defining schema
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespaceWildcard {
    constraint: NamespaceConstraint,
    target_namespace: String,
    compat: WildcardCompat,
}

impl NamespaceWildcard {
    /// Create from the whitespace separated tokens of a `namespace` attribute
    ///
    /// `##any` or an empty value gives [`NamespaceConstraint::Any`],
    /// `##other` excludes `target_namespace`; any other value is a list of
    /// URI references where `##local` is no namespace and
    /// `##targetNamespace` is `target_namespace`.
    pub fn parse(tokens: &str, target_namespace: &str) -> Result<Self, GrammarError> {
        let value = tokens.trim();

        let constraint = match value {
            "" | "##any" => NamespaceConstraint::Any,
            "##other" => NamespaceConstraint::Other(target_namespace.to_string()),
            _ => {
                let mut namespaces = BTreeSet::new();
                for token in value.split_whitespace() {
                    match token {
                        "##local" => {
                            namespaces.insert(String::new());
                        }
                        "##targetNamespace" => {
                            namespaces.insert(target_namespace.to_string());
                        }
                        s if s.starts_with("##") || !is_valid_uri_reference(s) => {
                            return Err(GrammarError::new(
                                GrammarErrorKind::MalformedNamespaceToken,
                                format!("wrong value '{}' in 'namespace' attribute", s),
                            )
                            .with_source(value));
                        }
                        uri => {
                            namespaces.insert(uri.to_string());
                        }
                    }
                }
                NamespaceConstraint::Set(namespaces)
            }
        };

        Ok(Self {
            constraint,
            target_namespace: target_namespace.to_string(),
            compat: WildcardCompat::Standard,
        })
    }

    /// Create from an already built constraint
    pub fn new(constraint: NamespaceConstraint, target_namespace: impl Into<String>) -> Self {
        Self {
            constraint,
            target_namespace: target_namespace.into(),
            compat: WildcardCompat::Standard,
        }
    }

    /// `##any` wildcard
    pub fn any() -> Self {
        Self::new(NamespaceConstraint::Any, String::new())
    }

    /// Set the compatibility mode
    pub fn with_compat(mut self, compat: WildcardCompat) -> Self {
        self.compat = compat;
        self
    }

    /// The namespace constraint
    pub fn constraint(&self) -> &NamespaceConstraint {
        &self.constraint
    }

    /// Target namespace of the defining schema
    pub fn target_namespace(&self) -> &str {
        &self.target_namespace
    }

    /// The compatibility mode
    pub fn compat(&self) -> WildcardCompat {
        self.compat
    }

    /// Check if a namespace is allowed
    pub fn allows(&self, namespace: &str) -> bool {
        match &self.constraint {
            NamespaceConstraint::Any => true,
            NamespaceConstraint::Other(excluded) => match self.compat {
                WildcardCompat::Standard => namespace != excluded && !namespace.is_empty(),
                WildcardCompat::Legacy => namespace != excluded,
            },
            NamespaceConstraint::Set(set) => set.contains(namespace),
        }
    }

    /// Check if the namespace of a qualified name is allowed
    pub fn allows_name(&self, name: &QName) -> bool {
        self.allows(&name.namespace)
    }

    /// Check if every namespace allowed by `self` is allowed by `sup`
    ///
    /// This is the fixed case table of the schema component constraint
    /// "Wildcard Subset", not a general set comparison.
    pub fn is_subset(&self, sup: &NamespaceWildcard) -> bool {
        match (&self.constraint, &sup.constraint) {
            (_, NamespaceConstraint::Any) => true,
            (NamespaceConstraint::Other(sub_ex), NamespaceConstraint::Other(sup_ex)) => {
                sub_ex == sup_ex
            }
            (NamespaceConstraint::Set(sub), NamespaceConstraint::Other(sup_ex)) => {
                !sub.contains(sup_ex)
            }
            (NamespaceConstraint::Set(sub), NamespaceConstraint::Set(sup)) => sub.is_subset(sup),
            _ => false,
        }
    }

    /// Union of two wildcards
    ///
    /// Returns a grammar error when the union has no representation.
    pub fn union(&self, other: &NamespaceWildcard) -> Result<NamespaceWildcard, GrammarError> {
        use NamespaceConstraint::*;

        let compat = self.compat.combine(other.compat);
        let constraint = match (&self.constraint, &other.constraint) {
            (Any, _) | (_, Any) => Some(Any),
            (Set(a), Set(b)) => Some(Set(a.union(b).cloned().collect())),
            (Other(a), Other(b)) => {
                if a == b {
                    Some(Other(a.clone()))
                } else {
                    Some(Other(String::new()))
                }
            }
            (Set(set), Other(excluded)) | (Other(excluded), Set(set)) => match compat {
                WildcardCompat::Legacy => {
                    if set.contains(excluded) {
                        Some(Any)
                    } else {
                        Some(Other(excluded.clone()))
                    }
                }
                WildcardCompat::Standard => {
                    if !excluded.is_empty() {
                        union_set_with_other(set, excluded)
                    } else if set.contains("") {
                        Some(Any)
                    } else {
                        Some(Other(String::new()))
                    }
                }
            },
        };

        constraint
            .map(|constraint| self.derived(constraint, compat))
            .ok_or_else(|| {
                GrammarError::new(
                    GrammarErrorKind::UnionNotExpressible,
                    format!(
                        "the union of the wildcards '{}' and '{}' is not expressible",
                        self.constraint, other.constraint
                    ),
                )
            })
    }

    /// Intersection of two wildcards
    ///
    /// Returns a grammar error when the intersection has no representation.
    pub fn intersection(
        &self,
        other: &NamespaceWildcard,
    ) -> Result<NamespaceWildcard, GrammarError> {
        use NamespaceConstraint::*;

        let compat = self.compat.combine(other.compat);
        let constraint = match (&self.constraint, &other.constraint) {
            (Any, c) | (c, Any) => Some(c.clone()),
            (Set(set), Other(excluded)) | (Other(excluded), Set(set)) => {
                let mut result = set.clone();
                result.remove(excluded);
                if compat == WildcardCompat::Standard {
                    result.remove("");
                }
                Some(Set(result))
            }
            (Set(a), Set(b)) => Some(Set(a.intersection(b).cloned().collect())),
            (Other(a), Other(b)) => {
                if a == b || b.is_empty() {
                    Some(Other(a.clone()))
                } else if a.is_empty() {
                    Some(Other(b.clone()))
                } else {
                    None
                }
            }
        };

        constraint
            .map(|constraint| self.derived(constraint, compat))
            .ok_or_else(|| {
                GrammarError::new(
                    GrammarErrorKind::IntersectionNotExpressible,
                    format!(
                        "the intersection of the wildcards '{}' and '{}' is not expressible",
                        self.constraint, other.constraint
                    ),
                )
            })
    }

    fn derived(&self, constraint: NamespaceConstraint, compat: WildcardCompat) -> Self {
        Self {
            constraint,
            target_namespace: self.target_namespace.clone(),
            compat,
        }
    }
}

impl fmt::Display for NamespaceWildcard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.constraint)
    }
}

// Set S united with not(x), x a namespace name.
fn union_set_with_other(set: &BTreeSet<String>, excluded: &str) -> Option<NamespaceConstraint> {
    let has_excluded = set.contains(excluded);
    let has_absent = set.contains("");
    match (has_excluded, has_absent) {
        (true, true) => Some(NamespaceConstraint::Any),
        (true, false) => Some(NamespaceConstraint::Other(String::new())),
        (false, true) => None,
        (false, false) => Some(NamespaceConstraint::Other(excluded.to_string())),
    }
}

/// XSD any attribute wildcard (xs:anyAttribute)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnyAttribute {
    /// Namespace wildcard
    pub namespaces: NamespaceWildcard,
    /// Process contents mode
    pub process_contents: ProcessContents,
}

impl AnyAttribute {
    /// Create an attribute wildcard
    pub fn new(namespaces: NamespaceWildcard, process_contents: ProcessContents) -> Self {
        Self {
            namespaces,
            process_contents,
        }
    }

    /// Check if an attribute name matches
    pub fn allows(&self, name: &QName) -> bool {
        self.namespaces.allows_name(name)
    }

    /// Check if this is a valid restriction of another any attribute
    pub fn is_restriction_of(&self, other: &AnyAttribute) -> bool {
        self.process_contents.is_restriction_of(&other.process_contents)
            && self.namespaces.is_subset(&other.namespaces)
    }
}
