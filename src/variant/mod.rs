// src/variant/mod.rs

//! Build variants
//!
//! A variant table lists, for each build dimension (python version,
//! compiler, library pin), the candidate values to build against.
//! Expanding the table yields one [`VariantCombination`] per build.
//!
//! # Example Table
//!
//! ```toml
//! python = ["3.11", "3.12"]
//! numpy = ["1.26", "2.0"]
//! blas_impl = ["openblas", "mkl  # [x86_64]"]
//! zip_keys = [["python", "numpy"]]
//!
//! [pin_run_as_build]
//! openssl = { max_pin = "x" }
//! ```
//!
//! Zipped dimensions advance together, so the table above expands to two
//! python/numpy pairs times two BLAS implementations.

mod expand;
mod table;

pub use expand::{Candidates, VariantExpander};
pub use table::{VariantDimension, VariantTable};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One concrete choice of value for every variant dimension
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantCombination(BTreeMap<String, String>);

impl VariantCombination {
    /// Create an empty combination
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a binding, builder style
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Bind a dimension to a value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Value bound to a dimension
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Whether a dimension is bound
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Bindings in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of bound dimensions
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no dimension is bound
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the underlying map
    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

impl FromIterator<(String, String)> for VariantCombination {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for VariantCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}
