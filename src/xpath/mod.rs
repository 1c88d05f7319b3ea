//! XPath Support for XML Schema
//!
//! This module provides the restricted XPath used by identity constraints
//! (xs:selector, xs:field).
//!
//! ## Overview
//!
//! Expressions go through two stages:
//! - [`IdentityXPathParser`] parses the text and rejects anything outside
//!   the identity-constraint subset, producing a [`ParsedXPath`];
//! - [`ParsedXPath::compile`] resolves prefixes against a namespace context,
//!   producing a [`CompiledXPath`].
//!
//! Evaluation against instance documents belongs to the document-level
//! identity validator and is not provided here.

mod parsers;
mod selectors;

pub use parsers::{
    IdentityXPathParser, NodeTest, ParsedPath, ParsedStep, ParsedXPath, XPathAxis,
    XPathParseError, XPathPredicate,
};
pub use selectors::{
    AttributeCondition, CompiledPath, CompiledStep, CompiledXPath, NameTest, StepAxis,
};
