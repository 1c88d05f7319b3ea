//! XML name and URI reference validation
//!
//! This module provides lexical checks for NCNames and QNames used in
//! XPath name tests, and for the URI references allowed as wildcard
//! namespace tokens.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static NCNAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[A-Z_a-z\u{C0}-\u{D6}\u{D8}-\u{F6}\u{F8}-\u{2FF}\u{370}-\u{37D}\u{37F}-\u{1FFF}][A-Z_a-z\u{C0}-\u{D6}\u{D8}-\u{F6}\u{F8}-\u{2FF}\u{370}-\u{37D}\u{37F}-\u{1FFF}\-\.0-9\u{B7}\u{300}-\u{36F}]*$",
    )
    .unwrap()
});

// Characters never allowed in a URI reference, even leniently.
static URI_FORBIDDEN: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[\s<>"{}|\\^`]"#).unwrap());

static BAD_PERCENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"%([^0-9A-Fa-f]|[0-9A-Fa-f][^0-9A-Fa-f]|[0-9A-Fa-f]?$)").unwrap());

static SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*$").unwrap());

/// Check if a string is a valid NCName (non-colonized name)
pub fn is_valid_ncname(name: &str) -> bool {
    !name.is_empty() && NCNAME.is_match(name)
}

/// Check if a string is a valid QName (qualified name)
pub fn is_valid_qname(name: &str) -> bool {
    match name.split_once(':') {
        Some((prefix, local)) => is_valid_ncname(prefix) && is_valid_ncname(local),
        None => is_valid_ncname(name),
    }
}

/// Validate an NCName and return an error if invalid
pub fn validate_ncname(name: &str) -> Result<()> {
    if is_valid_ncname(name) {
        Ok(())
    } else {
        Err(Error::Name(format!("Invalid NCName: '{}'", name)))
    }
}

/// Validate a QName and return an error if invalid
pub fn validate_qname(name: &str) -> Result<()> {
    if is_valid_qname(name) {
        Ok(())
    } else {
        Err(Error::Name(format!("Invalid QName: '{}'", name)))
    }
}

/// Split a QName into prefix and local name
pub fn split_qname(qname: &str) -> (Option<&str>, &str) {
    if let Some((prefix, local)) = qname.split_once(':') {
        (Some(prefix), local)
    } else {
        (None, qname)
    }
}

/// Check if a string is a syntactically valid URI reference
///
/// Absolute references must parse as URLs; relative references are
/// accepted when they contain no forbidden characters, use well-formed
/// percent escapes and at most one fragment separator.
pub fn is_valid_uri_reference(value: &str) -> bool {
    if value.is_empty() {
        return true;
    }
    if URI_FORBIDDEN.is_match(value) || BAD_PERCENT.is_match(value) {
        return false;
    }
    if value.matches('#').count() > 1 {
        return false;
    }

    let head_end = value.find(['/', '?', '#']).unwrap_or(value.len());
    match value[..head_end].split_once(':') {
        Some((scheme, _)) => SCHEME.is_match(scheme) && Url::parse(value).is_ok(),
        None => true,
    }
}

/// Validate a URI reference and return an error if invalid
pub fn validate_uri_reference(value: &str) -> Result<()> {
    if is_valid_uri_reference(value) {
        Ok(())
    } else {
        Err(Error::Name(format!("Invalid URI reference: '{}'", value)))
    }
}
