//! XPath parser for identity constraints
//!
//! `xs:selector` and `xs:field` use a restricted XPath subset:
//!
//! ```text
//! Selector ::= Path ( '|' Path )*
//! Path     ::= ('.//')? Step ( '/' Step )*
//! Step     ::= '.' | ('child::')? NameTest Predicate*
//! Field    ::= like Selector, but the last step may be '@' NameTest
//! NameTest ::= QName | '*' | NCName ':' '*'
//! Predicate ::= '[' '@' QName ( '=' Literal )? ']'
//! ```
//!
//! Every other axis, node test, function or predicate is rejected.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use crate::error::Result as CrateResult;
use crate::limits::Limits;
use crate::names::{is_valid_ncname, split_qname};
use crate::namespaces::{NamespaceContext, QName};

use super::selectors::{AttributeCondition, CompiledPath, CompiledStep, CompiledXPath, NameTest, StepAxis};

static PREDICATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?:@|attribute::)\s*([^\s=\[\]]+)\s*(?:=\s*(?:'([^']*)'|"([^"]*)"))?$"#).unwrap()
});

/// XPath axis types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XPathAxis {
    /// child:: axis (default)
    Child,
    /// descendant:: axis
    Descendant,
    /// descendant-or-self:: axis
    DescendantOrSelf,
    /// self:: axis
    Self_,
    /// parent:: axis
    Parent,
    /// ancestor:: axis
    Ancestor,
    /// ancestor-or-self:: axis
    AncestorOrSelf,
    /// following-sibling:: axis
    FollowingSibling,
    /// preceding-sibling:: axis
    PrecedingSibling,
    /// following:: axis
    Following,
    /// preceding:: axis
    Preceding,
    /// attribute:: axis
    Attribute,
    /// namespace:: axis
    Namespace,
}

impl XPathAxis {
    /// Parse axis from string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "child" => Some(Self::Child),
            "descendant" => Some(Self::Descendant),
            "descendant-or-self" => Some(Self::DescendantOrSelf),
            "self" => Some(Self::Self_),
            "parent" => Some(Self::Parent),
            "ancestor" => Some(Self::Ancestor),
            "ancestor-or-self" => Some(Self::AncestorOrSelf),
            "following-sibling" => Some(Self::FollowingSibling),
            "preceding-sibling" => Some(Self::PrecedingSibling),
            "following" => Some(Self::Following),
            "preceding" => Some(Self::Preceding),
            "attribute" => Some(Self::Attribute),
            "namespace" => Some(Self::Namespace),
            _ => None,
        }
    }
}

impl fmt::Display for XPathAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Child => "child",
            Self::Descendant => "descendant",
            Self::DescendantOrSelf => "descendant-or-self",
            Self::Self_ => "self",
            Self::Parent => "parent",
            Self::Ancestor => "ancestor",
            Self::AncestorOrSelf => "ancestor-or-self",
            Self::FollowingSibling => "following-sibling",
            Self::PrecedingSibling => "preceding-sibling",
            Self::Following => "following",
            Self::Preceding => "preceding",
            Self::Attribute => "attribute",
            Self::Namespace => "namespace",
        };
        write!(f, "{}", s)
    }
}

/// Node test in an XPath step
#[derive(Debug, Clone, PartialEq)]
pub enum NodeTest {
    /// Name test (element or attribute name)
    Name {
        /// Namespace prefix
        prefix: Option<String>,
        /// Local name
        local: String,
    },
    /// Wildcard test (*)
    Wildcard,
    /// Namespace wildcard (prefix:*)
    NamespaceWildcard(String),
    /// node() test
    Node,
}

impl NodeTest {
    /// Parse a node test from a string
    pub fn parse(s: &str) -> Result<Self, XPathParseError> {
        let s = s.trim();

        match s {
            "*" => return Ok(Self::Wildcard),
            "node()" => return Ok(Self::Node),
            _ => {}
        }

        if let Some(prefix) = s.strip_suffix(":*") {
            if !is_valid_ncname(prefix) {
                return Err(XPathParseError::InvalidName(s.to_string()));
            }
            return Ok(Self::NamespaceWildcard(prefix.to_string()));
        }

        if s.contains('(') {
            return Err(XPathParseError::Unsupported(format!(
                "node test '{}' is not allowed",
                s
            )));
        }

        let (prefix, local) = split_qname(s);
        if !is_valid_ncname(local) || prefix.is_some_and(|p| !is_valid_ncname(p)) {
            return Err(XPathParseError::InvalidName(s.to_string()));
        }
        Ok(Self::Name {
            prefix: prefix.map(str::to_string),
            local: local.to_string(),
        })
    }

    /// Get the local name if this is a name test
    pub fn local_name(&self) -> Option<&str> {
        match self {
            Self::Name { local, .. } => Some(local),
            _ => None,
        }
    }
}

/// Attribute predicate: `[@name]` or `[@name='value']`
#[derive(Debug, Clone, PartialEq)]
pub struct XPathPredicate {
    /// The raw predicate expression
    pub expression: String,
    /// Attribute name as written
    pub name: String,
    /// Required value, if the predicate is a comparison
    pub value: Option<String>,
}

impl XPathPredicate {
    /// Parse a predicate body (without brackets)
    pub fn parse(expression: &str) -> Result<Self, XPathParseError> {
        let trimmed = expression.trim();
        let caps = PREDICATE.captures(trimmed).ok_or_else(|| {
            XPathParseError::Unsupported(format!("predicate '[{}]' is not allowed", trimmed))
        })?;

        let name = caps[1].to_string();
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .map(|m| m.as_str().to_string());
        Ok(Self {
            expression: trimmed.to_string(),
            name,
            value,
        })
    }
}

/// A parsed step in an XPath expression
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedStep {
    /// The axis
    pub axis: XPathAxis,
    /// The node test
    pub node_test: NodeTest,
    /// Predicates
    pub predicates: Vec<XPathPredicate>,
}

impl ParsedStep {
    /// Parse a step from a string
    pub fn parse(step: &str) -> Result<Self, XPathParseError> {
        let step = step.trim();

        if step == "." {
            return Ok(Self {
                axis: XPathAxis::Self_,
                node_test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }
        if step == ".." {
            return Ok(Self {
                axis: XPathAxis::Parent,
                node_test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }

        let (name_part, predicates) = Self::extract_predicates(step)?;
        let name_part = name_part.trim();

        let (axis, node_test_str) = if let Some(rest) = name_part.strip_prefix('@') {
            (XPathAxis::Attribute, rest)
        } else if let Some((axis_str, rest)) = name_part.split_once("::") {
            let axis_str = axis_str.trim();
            let axis = XPathAxis::parse(axis_str)
                .ok_or_else(|| XPathParseError::UnknownAxis(axis_str.to_string()))?;
            (axis, rest)
        } else {
            (XPathAxis::Child, name_part)
        };

        if node_test_str.trim().is_empty() {
            return Err(XPathParseError::InvalidSyntax(format!("empty step '{}'", step)));
        }
        let node_test = NodeTest::parse(node_test_str)?;

        Ok(Self {
            axis,
            node_test,
            predicates,
        })
    }

    fn extract_predicates(step: &str) -> Result<(&str, Vec<XPathPredicate>), XPathParseError> {
        let Some(first_bracket) = step.find('[') else {
            if step.contains(']') {
                return Err(XPathParseError::InvalidSyntax(format!("unbalanced ']' in '{}'", step)));
            }
            return Ok((step, Vec::new()));
        };

        let mut predicates = Vec::new();
        let mut current = String::new();
        let mut depth = 0usize;
        let mut quote: Option<char> = None;

        for c in step[first_bracket..].chars() {
            match (quote, c) {
                (Some(q), _) if c == q => {
                    quote = None;
                    current.push(c);
                }
                (Some(_), _) => current.push(c),
                (None, '\'' | '"') if depth > 0 => {
                    quote = Some(c);
                    current.push(c);
                }
                (None, '[') => {
                    if depth > 0 {
                        return Err(XPathParseError::Unsupported(
                            "nested predicates are not allowed".to_string(),
                        ));
                    }
                    depth += 1;
                }
                (None, ']') => {
                    if depth == 0 {
                        return Err(XPathParseError::InvalidSyntax(format!(
                            "unbalanced ']' in '{}'",
                            step
                        )));
                    }
                    depth -= 1;
                    predicates.push(XPathPredicate::parse(&current)?);
                    current.clear();
                }
                (None, _) if depth > 0 => current.push(c),
                (None, c) if c.is_whitespace() => {}
                (None, _) => {
                    return Err(XPathParseError::InvalidSyntax(format!(
                        "unexpected text after predicate in '{}'",
                        step
                    )))
                }
            }
        }

        if depth != 0 || quote.is_some() {
            return Err(XPathParseError::UnexpectedEnd);
        }
        Ok((&step[..first_bracket], predicates))
    }
}

/// One `|` alternative of a parsed expression
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPath {
    /// Whether the path starts with `.//`
    pub descendant: bool,
    /// Steps after the optional `.//` prefix
    pub steps: Vec<ParsedStep>,
}

/// Parsed XPath expression
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedXPath {
    /// Original expression
    pub expression: String,
    /// Alternatives
    pub branches: Vec<ParsedPath>,
}

impl ParsedXPath {
    /// Parse an expression without applying identity-constraint restrictions
    pub fn parse(expression: &str) -> Result<Self, XPathParseError> {
        let branches = split_top_level(expression, '|')?
            .into_iter()
            .map(Self::parse_path)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            expression: expression.to_string(),
            branches,
        })
    }

    fn parse_path(path: &str) -> Result<ParsedPath, XPathParseError> {
        let path = path.trim();
        if path.is_empty() {
            return Err(XPathParseError::InvalidSyntax("empty path".to_string()));
        }
        if path.starts_with('/') {
            return Err(XPathParseError::Unsupported(format!(
                "absolute path '{}' is not allowed",
                path
            )));
        }

        let (descendant, rest) = match path.strip_prefix(".//") {
            Some(rest) => (true, rest),
            None => (false, path),
        };

        let steps = split_top_level(rest, '/')?
            .into_iter()
            .map(|step| {
                if step.trim().is_empty() {
                    Err(XPathParseError::Unsupported(
                        "'//' is only allowed as the './/' prefix".to_string(),
                    ))
                } else {
                    ParsedStep::parse(step)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ParsedPath { descendant, steps })
    }

    /// Get the number of steps of the longest alternative
    pub fn step_count(&self) -> usize {
        self.branches.iter().map(|b| b.steps.len()).max().unwrap_or(0)
    }

    /// Resolve names against a namespace context
    ///
    /// Prefixed names use the context bindings; unprefixed element names
    /// take `default_element_namespace`, unprefixed attribute names have no
    /// namespace.
    pub fn compile(
        &self,
        namespaces: &NamespaceContext,
        default_element_namespace: &str,
    ) -> Result<CompiledXPath, XPathParseError> {
        let branches = self
            .branches
            .iter()
            .map(|branch| {
                let steps = branch
                    .steps
                    .iter()
                    .map(|step| compile_step(step, namespaces, default_element_namespace))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(CompiledPath::new(branch.descendant, steps))
            })
            .collect::<Result<Vec<_>, XPathParseError>>()?;
        Ok(CompiledXPath::new(self.expression.clone(), branches))
    }
}

fn compile_step(
    step: &ParsedStep,
    namespaces: &NamespaceContext,
    default_element_namespace: &str,
) -> Result<CompiledStep, XPathParseError> {
    let axis = match step.axis {
        XPathAxis::Child => StepAxis::Child,
        XPathAxis::Self_ => StepAxis::Self_,
        XPathAxis::Attribute => StepAxis::Attribute,
        other => return Err(XPathParseError::UnsupportedAxis(other)),
    };
    let default_ns = if axis == StepAxis::Attribute {
        ""
    } else {
        default_element_namespace
    };

    let test = match &step.node_test {
        NodeTest::Node | NodeTest::Wildcard => NameTest::Any,
        NodeTest::NamespaceWildcard(prefix) => NameTest::Namespace(resolve_prefix(namespaces, prefix)?),
        NodeTest::Name { prefix, local } => {
            let namespace = match prefix {
                Some(prefix) => resolve_prefix(namespaces, prefix)?,
                None => default_ns.to_string(),
            };
            NameTest::Name(QName::new(namespace, local.clone()))
        }
    };

    let conditions = step
        .predicates
        .iter()
        .map(|pred| {
            let (prefix, local) = split_qname(&pred.name);
            if !is_valid_ncname(local) || prefix.is_some_and(|p| !is_valid_ncname(p)) {
                return Err(XPathParseError::InvalidName(pred.name.clone()));
            }
            let namespace = match prefix {
                Some(prefix) => resolve_prefix(namespaces, prefix)?,
                None => String::new(),
            };
            Ok(AttributeCondition {
                name: QName::new(namespace, local),
                value: pred.value.clone(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CompiledStep {
        axis,
        test,
        conditions,
    })
}

fn resolve_prefix(namespaces: &NamespaceContext, prefix: &str) -> Result<String, XPathParseError> {
    namespaces
        .get_namespace(prefix)
        .map(str::to_string)
        .ok_or_else(|| XPathParseError::UnresolvedPrefix(prefix.to_string()))
}

// Split at `sep` outside brackets and string literals.
fn split_top_level(s: &str, sep: char) -> Result<Vec<&str>, XPathParseError> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        match (quote, c) {
            (Some(q), _) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, c) if c == sep && depth == 0 => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    if quote.is_some() {
        return Err(XPathParseError::UnexpectedEnd);
    }
    parts.push(&s[start..]);
    Ok(parts)
}

/// XPath parse error
#[derive(Debug, Clone, PartialEq)]
pub enum XPathParseError {
    /// Unknown axis name
    UnknownAxis(String),
    /// Known axis outside the identity-constraint subset
    UnsupportedAxis(XPathAxis),
    /// Construct outside the identity-constraint subset
    Unsupported(String),
    /// Malformed name test
    InvalidName(String),
    /// Prefix without a namespace binding
    UnresolvedPrefix(String),
    /// Invalid syntax
    InvalidSyntax(String),
    /// Unexpected end of expression
    UnexpectedEnd,
}

impl fmt::Display for XPathParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownAxis(axis) => write!(f, "Unknown XPath axis: {}", axis),
            Self::UnsupportedAxis(axis) => {
                write!(f, "Axis {} not allowed in identity constraint", axis)
            }
            Self::Unsupported(msg) => write!(f, "Unsupported XPath construct: {}", msg),
            Self::InvalidName(name) => write!(f, "Invalid name test: {}", name),
            Self::UnresolvedPrefix(prefix) => write!(f, "Unbound namespace prefix: {}", prefix),
            Self::InvalidSyntax(msg) => write!(f, "Invalid XPath syntax: {}", msg),
            Self::UnexpectedEnd => write!(f, "Unexpected end of XPath expression"),
        }
    }
}

impl std::error::Error for XPathParseError {}

/// Parser for identity constraint XPath (xs:selector, xs:field)
#[derive(Debug, Clone)]
pub struct IdentityXPathParser {
    /// Whether the last step may be an attribute step
    allow_attributes: bool,
    limits: Limits,
}

impl Default for IdentityXPathParser {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityXPathParser {
    /// Create a new parser for selector expressions
    pub fn new() -> Self {
        Self {
            allow_attributes: false,
            limits: Limits::default(),
        }
    }

    /// Create a parser for field expressions (allows a final attribute step)
    pub fn for_field() -> Self {
        Self {
            allow_attributes: true,
            ..Self::new()
        }
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Check if this parser accepts field expressions
    pub fn is_field(&self) -> bool {
        self.allow_attributes
    }

    /// Check an expression against the configured limits
    pub fn check_limits(&self, xpath: &str) -> CrateResult<()> {
        self.limits.check_xpath_length(xpath.len())
    }

    /// Parse an identity constraint XPath expression
    pub fn parse(&self, xpath: &str) -> Result<ParsedXPath, XPathParseError> {
        let parsed = ParsedXPath::parse(xpath)?;
        self.validate(&parsed)?;
        Ok(parsed)
    }

    /// Check the step and branch counts of a parsed expression
    pub fn check_parsed_limits(&self, parsed: &ParsedXPath) -> CrateResult<()> {
        self.limits.check_xpath_branches(parsed.branches.len())?;
        self.limits.check_xpath_steps(parsed.step_count())
    }

    fn validate(&self, parsed: &ParsedXPath) -> Result<(), XPathParseError> {
        for branch in &parsed.branches {
            let last = branch.steps.len().saturating_sub(1);
            for (i, step) in branch.steps.iter().enumerate() {
                match step.axis {
                    XPathAxis::Child => {}
                    XPathAxis::Self_ if step.node_test == NodeTest::Node => {}
                    XPathAxis::Attribute if self.allow_attributes && i == last => {}
                    XPathAxis::Attribute if self.allow_attributes => {
                        return Err(XPathParseError::Unsupported(
                            "an attribute step must be the last step of a field".to_string(),
                        ));
                    }
                    XPathAxis::Attribute => {
                        return Err(XPathParseError::Unsupported(
                            "attribute axis not allowed in selector".to_string(),
                        ));
                    }
                    other => return Err(XPathParseError::UnsupportedAxis(other)),
                }

                if step.node_test == NodeTest::Node && step.axis != XPathAxis::Self_ {
                    return Err(XPathParseError::Unsupported(
                        "node() is only allowed as '.'".to_string(),
                    ));
                }
                if !step.predicates.is_empty() && step.axis != XPathAxis::Child {
                    return Err(XPathParseError::Unsupported(format!(
                        "predicates are not allowed on the {} axis",
                        step.axis
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector(xpath: &str) -> Result<ParsedXPath, XPathParseError> {
        IdentityXPathParser::new().parse(xpath)
    }

    fn field(xpath: &str) -> Result<ParsedXPath, XPathParseError> {
        IdentityXPathParser::for_field().parse(xpath)
    }

    #[test]
    fn test_xpath_axis_parse() {
        assert_eq!(XPathAxis::parse("child"), Some(XPathAxis::Child));
        assert_eq!(XPathAxis::parse("attribute"), Some(XPathAxis::Attribute));
        assert_eq!(XPathAxis::parse("invalid"), None);
    }

    #[test]
    fn test_node_test_parse() {
        assert_eq!(
            NodeTest::parse("ns:element").unwrap(),
            NodeTest::Name {
                prefix: Some("ns".to_string()),
                local: "element".to_string()
            }
        );
        assert_eq!(NodeTest::parse("*").unwrap(), NodeTest::Wildcard);
        assert_eq!(
            NodeTest::parse("ns:*").unwrap(),
            NodeTest::NamespaceWildcard("ns".to_string())
        );
        assert!(NodeTest::parse("text()").is_err());
        assert!(NodeTest::parse("1abc").is_err());
    }

    #[test]
    fn test_predicate_parse() {
        let pred = XPathPredicate::parse("@id").unwrap();
        assert_eq!(pred.name, "id");
        assert!(pred.value.is_none());

        let pred = XPathPredicate::parse(" @p:kind = \"x y\" ").unwrap();
        assert_eq!(pred.name, "p:kind");
        assert_eq!(pred.value.as_deref(), Some("x y"));

        assert!(XPathPredicate::parse("1").is_err());
        assert!(XPathPredicate::parse("position() = 1").is_err());
        assert!(XPathPredicate::parse("@a > 1").is_err());
    }

    #[test]
    fn test_selector_paths() {
        let parsed = selector("./person/name").unwrap();
        assert_eq!(parsed.branches.len(), 1);
        assert_eq!(parsed.step_count(), 3);

        let parsed = selector(".//item | child::a/b").unwrap();
        assert_eq!(parsed.branches.len(), 2);
        assert!(parsed.branches[0].descendant);
        assert!(!parsed.branches[1].descendant);

        let parsed = selector("a[@type='x|y']/b").unwrap();
        assert_eq!(parsed.branches.len(), 1);
        assert_eq!(parsed.branches[0].steps[0].predicates[0].value.as_deref(), Some("x|y"));
    }

    #[test]
    fn test_selector_rejections() {
        assert!(matches!(selector("@id"), Err(XPathParseError::Unsupported(_))));
        assert!(matches!(
            selector("ancestor::a"),
            Err(XPathParseError::UnsupportedAxis(XPathAxis::Ancestor))
        ));
        assert!(matches!(selector("../a"), Err(XPathParseError::UnsupportedAxis(_))));
        assert!(matches!(selector("bogus::a"), Err(XPathParseError::UnknownAxis(_))));
        assert!(selector("/root").is_err());
        assert!(selector("a//b").is_err());
        assert!(selector("a[1]").is_err());
        assert!(selector("a[@x][").is_err());
        assert!(selector("a |").is_err());
    }

    #[test]
    fn test_field_paths() {
        assert!(field("@id").is_ok());
        assert!(field("attribute::p:id").is_ok());
        assert!(field("a/b/@c | .").is_ok());
        assert!(field(".//x/@y").is_ok());

        assert!(field("@id/a").is_err());
        assert!(field("@id[@x]").is_err());
    }

    #[test]
    fn test_compile_resolves_names() {
        let ctx = NamespaceContext::new().with_prefix("p", "urn:p");
        let compiled = field("p:a/b/@p:c")
            .unwrap()
            .compile(&ctx, "urn:default")
            .unwrap();

        let steps = compiled.branches()[0].steps();
        assert_eq!(steps[0].test, NameTest::Name(QName::new("urn:p", "a")));
        assert_eq!(steps[1].test, NameTest::Name(QName::new("urn:default", "b")));
        assert_eq!(steps[2].axis, StepAxis::Attribute);
        assert_eq!(steps[2].test, NameTest::Name(QName::new("urn:p", "c")));
    }

    #[test]
    fn test_compile_unprefixed_attribute_has_no_namespace() {
        let ctx = NamespaceContext::new();
        let compiled = field("a[@k='v']/@id").unwrap().compile(&ctx, "urn:d").unwrap();
        let steps = compiled.branches()[0].steps();
        assert_eq!(steps[0].conditions[0].name, QName::local("k"));
        assert_eq!(steps[1].test, NameTest::Name(QName::local("id")));
    }

    #[test]
    fn test_compile_unbound_prefix() {
        let ctx = NamespaceContext::new();
        let err = selector("q:a").unwrap().compile(&ctx, "").unwrap_err();
        assert_eq!(err, XPathParseError::UnresolvedPrefix("q".to_string()));
    }

    #[test]
    fn test_parser_limits() {
        let parser = IdentityXPathParser::new().with_limits(Limits {
            max_xpath_steps: 2,
            max_xpath_length: 8,
            ..Limits::default()
        });
        assert!(parser.check_limits("a/b").is_ok());
        assert!(parser.check_limits("a/b/c/d/e").is_err());

        let parsed = parser.parse("a/b/c").unwrap();
        assert!(parser.check_parsed_limits(&parsed).is_err());
    }
}
