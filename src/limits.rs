//! Limits and constraints for schema compilation
//!
//! This module defines resource caps applied while compiling grammar
//! components and while growing per-run validation state. Limits can be
//! loaded from any serde format; missing fields take the default values.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Global limits configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum length of a selector or field expression, in bytes
    pub max_xpath_length: usize,

    /// Maximum number of steps in one path of an expression
    pub max_xpath_steps: usize,

    /// Maximum number of `|` alternatives in an expression
    pub max_xpath_branches: usize,

    /// Maximum number of schema components in one store
    pub max_schema_components: usize,

    /// Maximum number of bits a state vector may hold
    pub max_bit_vector_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_xpath_length: 4096,
            max_xpath_steps: 64,
            max_xpath_branches: 32,
            max_schema_components: 100_000,
            max_bit_vector_len: 1 << 20,
        }
    }
}

impl Limits {
    /// Create a new Limits with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create strict limits (more restrictive)
    pub fn strict() -> Self {
        Self {
            max_xpath_length: 512,
            max_xpath_steps: 16,
            max_xpath_branches: 8,
            max_schema_components: 10_000,
            max_bit_vector_len: 1 << 16,
        }
    }

    /// Create permissive limits (less restrictive, use with caution)
    pub fn permissive() -> Self {
        Self {
            max_xpath_length: 1 << 16,
            max_xpath_steps: 1024,
            max_xpath_branches: 1024,
            max_schema_components: 10_000_000,
            max_bit_vector_len: 1 << 26,
        }
    }

    /// Check if an expression length is within limits
    pub fn check_xpath_length(&self, len: usize) -> Result<()> {
        if len > self.max_xpath_length {
            Err(Error::LimitExceeded(format!(
                "XPath expression length {} exceeds maximum {}",
                len, self.max_xpath_length
            )))
        } else {
            Ok(())
        }
    }

    /// Check if a path step count is within limits
    pub fn check_xpath_steps(&self, steps: usize) -> Result<()> {
        if steps > self.max_xpath_steps {
            Err(Error::LimitExceeded(format!(
                "XPath step count {} exceeds maximum {}",
                steps, self.max_xpath_steps
            )))
        } else {
            Ok(())
        }
    }

    /// Check if a branch count is within limits
    pub fn check_xpath_branches(&self, branches: usize) -> Result<()> {
        if branches > self.max_xpath_branches {
            Err(Error::LimitExceeded(format!(
                "XPath branch count {} exceeds maximum {}",
                branches, self.max_xpath_branches
            )))
        } else {
            Ok(())
        }
    }

    /// Check if number of schema components is within limits
    pub fn check_schema_components(&self, count: usize) -> Result<()> {
        if count > self.max_schema_components {
            Err(Error::LimitExceeded(format!(
                "Schema component count {} exceeds maximum {}",
                count, self.max_schema_components
            )))
        } else {
            Ok(())
        }
    }

    /// Check if a bit index can be stored in a state vector
    pub fn check_bit_index(&self, index: usize) -> Result<()> {
        if index >= self.max_bit_vector_len {
            Err(Error::LimitExceeded(format!(
                "Bit index {} exceeds maximum vector length {}",
                index, self.max_bit_vector_len
            )))
        } else {
            Ok(())
        }
    }
}
