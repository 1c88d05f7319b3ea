//! # xmlschema-compiler
//!
//! Compilation and validation core of an XML Schema grammar engine.
//!
//! This crate implements the decision procedures that the rest of a schema
//! processor relies on:
//!
//! - Namespace wildcard algebra (allows, union, intersection, subset)
//! - Growable bit vectors for content-model state sets
//! - Attribute resolution against declarations, wildcards and globals
//! - Reconciliation of duplicate and redefined global components
//! - Identity constraint (unique/key/keyref) compilation
//! - Validation event reporting with abort/continue semantics
//!
//! Parsing schema documents and loading imports is left to the caller.
//!
//! ## Example
//!
//! ```rust
//! use xmlschema_compiler::validators::NamespaceWildcard;
//!
//! let any_other = NamespaceWildcard::parse("##other", "urn:a").unwrap();
//! assert!(any_other.allows("urn:b"));
//! assert!(!any_other.allows("urn:a"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;
pub mod limits;

// Names
pub mod namespaces;
pub mod names;

// Identity constraint XPath
pub mod xpath;

// Grammar components and validation
pub mod validators;

// Re-exports for convenience
pub use error::{Error, GrammarError, GrammarErrorKind, InternalError, Result};
pub use limits::Limits;
pub use namespaces::{NamespaceContext, QName};

/// Version of the xmlschema-compiler library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// XSD namespace
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// XML namespace
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// XMLNS namespace
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

/// XML Schema instance namespace
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
