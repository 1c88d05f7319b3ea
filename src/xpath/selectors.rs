//! Compiled selector and field expressions
//!
//! The output of [`ParsedXPath::compile`](super::ParsedXPath::compile):
//! every name test is resolved to a [`QName`], so a compiled expression no
//! longer depends on the namespace context it was written in.

use std::fmt;

use crate::namespaces::QName;

/// Axis of a compiled step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAxis {
    /// Child element
    Child,
    /// The context node itself (`.`)
    Self_,
    /// Attribute of the context element
    Attribute,
}

/// Resolved node test
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameTest {
    /// `*` or `.`
    Any,
    /// `prefix:*`
    Namespace(String),
    /// Exact expanded name
    Name(QName),
}

impl NameTest {
    /// Check if a node name passes this test
    pub fn matches(&self, name: &QName) -> bool {
        match self {
            Self::Any => true,
            Self::Namespace(ns) => name.namespace == *ns,
            Self::Name(expected) => expected == name,
        }
    }
}

/// `[@name]` or `[@name='value']` on an element step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeCondition {
    /// Attribute name
    pub name: QName,
    /// Required value; `None` only requires presence
    pub value: Option<String>,
}

impl AttributeCondition {
    /// Check the condition against an attribute lookup
    pub fn holds<'v>(&self, lookup: impl Fn(&QName) -> Option<&'v str>) -> bool {
        match (lookup(&self.name), &self.value) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(actual), Some(expected)) => actual == expected,
        }
    }
}

/// One resolved step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStep {
    /// Axis
    pub axis: StepAxis,
    /// Node test
    pub test: NameTest,
    /// Attribute conditions, all of which must hold
    pub conditions: Vec<AttributeCondition>,
}

/// One `|` alternative of a compiled expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPath {
    descendant: bool,
    steps: Vec<CompiledStep>,
}

impl CompiledPath {
    pub(crate) fn new(descendant: bool, steps: Vec<CompiledStep>) -> Self {
        Self { descendant, steps }
    }

    /// Whether the path starts with `.//`
    pub fn is_descendant(&self) -> bool {
        self.descendant
    }

    /// The steps of this path
    pub fn steps(&self) -> &[CompiledStep] {
        &self.steps
    }

    /// Check if the path ends on an attribute
    pub fn selects_attribute(&self) -> bool {
        self.steps
            .last()
            .is_some_and(|step| step.axis == StepAxis::Attribute)
    }

    /// Match a path of element names, relative to the context element
    ///
    /// `.` steps consume nothing. A `.//` path may skip any number of
    /// leading names. Attribute conditions are not checked here.
    pub fn matches_elements(&self, names: &[QName]) -> bool {
        let element_steps: Vec<&CompiledStep> = self
            .steps
            .iter()
            .filter(|step| step.axis == StepAxis::Child)
            .collect();
        if self.steps.iter().any(|step| step.axis == StepAxis::Attribute) {
            return false;
        }

        let matches_at = |offset: usize| {
            names.len() == offset + element_steps.len()
                && element_steps
                    .iter()
                    .zip(&names[offset..])
                    .all(|(step, name)| step.test.matches(name))
        };

        if self.descendant {
            (0..=names.len().saturating_sub(element_steps.len())).any(matches_at)
        } else {
            matches_at(0)
        }
    }
}

/// A compiled selector or field expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledXPath {
    expression: String,
    branches: Vec<CompiledPath>,
}

impl CompiledXPath {
    pub(crate) fn new(expression: String, branches: Vec<CompiledPath>) -> Self {
        Self {
            expression,
            branches,
        }
    }

    /// The source expression
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// The `|` alternatives
    pub fn branches(&self) -> &[CompiledPath] {
        &self.branches
    }

    /// Check if any alternative ends on an attribute
    pub fn selects_attributes(&self) -> bool {
        self.branches.iter().any(CompiledPath::selects_attribute)
    }

    /// Match a relative element path against any alternative
    pub fn matches_elements(&self, names: &[QName]) -> bool {
        self.branches.iter().any(|b| b.matches_elements(names))
    }
}

impl fmt::Display for CompiledXPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expression)
    }
}
