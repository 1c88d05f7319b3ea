//! XML Schema validators
//!
//! This module contains the grammar components and decision procedures
//! shared by schema compilation and instance validation.

// Diagnostics
pub mod exceptions;
pub mod validation;

// Grammar primitives
pub mod bitset;
pub mod wildcards;

// Declarations
pub mod attributes;
pub mod builtins;
pub mod globals;
pub mod identities;

// Re-exports
pub use attributes::{
    AttributeMatch, AttributePool, AttributePresence, AttributeResolver, AttributeType,
    AttributeUse, AttributeValidator, ResolveTarget, XsdAttribute, XsdAttributeGroup,
};
pub use bitset::BitVector;
pub use builtins::BuiltinComponents;
pub use exceptions::{EventCode, Severity, SourceLocation, ValidationError, ValidationEvent};
pub use globals::{
    BuiltinSet, Component, ComponentId, ComponentKind, ComponentRedefineResolver,
    ComponentStore, ComponentTable, GlobalMaps, InsertOutcome,
};
pub use identities::{
    CompiledIdentityConstraint, IdentityConstraintCompiler, IdentityConstraintDefinition,
    IdentityConstraintKind, IdentityConstraintSet, KeyrefBinding,
};
pub use validation::{ValidationEventHandler, ValidationEventSink};
pub use wildcards::{
    AnyAttribute, NamespaceConstraint, NamespaceWildcard, ProcessContents, WildcardCompat,
};
