// src/variant/table.rs

//! Variant table parsing and merging

use crate::error::{Error, Result};
use crate::selector::{SelectorEvaluator, split_selector};
use crate::spec::{PinRule, PinRules};
use crate::variant::VariantCombination;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

/// Key holding the zipped dimension groups
const ZIP_KEYS: &str = "zip_keys";

/// Key holding per-package run pin rules
const PIN_RUN_AS_BUILD: &str = "pin_run_as_build";

/// One build dimension and its candidate values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantDimension {
    pub name: String,
    pub values: Vec<String>,
}

/// Candidate values per dimension, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantTable {
    dimensions: Vec<VariantDimension>,
    zip_groups: Vec<Vec<String>>,
    pin_run_as_build: PinRules,
}

impl VariantTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a variant table from TOML
    ///
    /// Scalar values are taken as single-value dimensions. Numbers and
    /// booleans are kept in their textual form, so `python = [3.10]` is
    /// not silently turned into `3.1`; quote versions to be safe.
    pub fn parse(content: &str) -> Result<Self> {
        let document: toml::Table = toml::from_str(content)
            .map_err(|e| Error::ParseError(format!("invalid variant table: {}", e)))?;

        let mut table = Self::new();
        for (key, value) in document {
            match key.as_str() {
                ZIP_KEYS => table.zip_groups = parse_zip_keys(&value)?,
                PIN_RUN_AS_BUILD => {
                    table.pin_run_as_build = value.try_into().map_err(|e| {
                        Error::VariantError(format!("invalid {}: {}", PIN_RUN_AS_BUILD, e))
                    })?;
                }
                _ => {
                    let values = dimension_values(&key, &value)?;
                    table.set_dimension(key, values);
                }
            }
        }

        table.validate()?;
        Ok(table)
    }

    /// Read and parse a variant file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::IoError(format!("failed to read variant file {}: {}", path.display(), e))
        })?;
        debug!("Loaded variant file {}", path.display());
        Self::parse(&content)
    }

    /// Add or replace a dimension, builder style
    pub fn with_dimension<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_dimension(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Zip a group of dimensions together, builder style
    pub fn with_zip<I, S>(mut self, group: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.zip_groups.push(group.into_iter().map(Into::into).collect());
        self
    }

    /// Add a run pin rule, builder style
    pub fn with_pin(mut self, name: impl Into<String>, rule: PinRule) -> Self {
        self.pin_run_as_build.insert(name.into(), rule);
        self
    }

    /// Replace a dimension's values, keeping its original position
    pub fn set_dimension(&mut self, name: String, values: Vec<String>) {
        match self.dimensions.iter_mut().find(|d| d.name == name) {
            Some(existing) => existing.values = values,
            None => self.dimensions.push(VariantDimension { name, values }),
        }
    }

    pub fn dimensions(&self) -> &[VariantDimension] {
        &self.dimensions
    }

    pub fn dimension(&self, name: &str) -> Option<&VariantDimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    pub fn zip_groups(&self) -> &[Vec<String>] {
        &self.zip_groups
    }

    pub fn pin_run_as_build(&self) -> &PinRules {
        &self.pin_run_as_build
    }

    /// Dimension names in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.dimensions.iter().map(|d| d.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    /// Layer another table over this one
    ///
    /// Dimensions named in `other` replace ours (keeping our declaration
    /// position); new ones are appended. Zip groups touching a replaced
    /// dimension are superseded by `other`'s groups. Pin rules merge per
    /// package.
    pub fn merge(&mut self, other: &VariantTable) {
        for dim in &other.dimensions {
            self.set_dimension(dim.name.clone(), dim.values.clone());
        }

        if !other.zip_groups.is_empty() {
            let overridden: BTreeSet<&str> =
                other.zip_groups.iter().flatten().map(String::as_str).collect();
            self.zip_groups
                .retain(|g| !g.iter().any(|n| overridden.contains(n.as_str())));
            self.zip_groups.extend(other.zip_groups.iter().cloned());
        }

        for (name, rule) in &other.pin_run_as_build {
            self.pin_run_as_build.insert(name.clone(), *rule);
        }
    }

    /// Resolve per-value selectors, dropping values that don't apply
    ///
    /// Values are checked against the platform alone since no variant is
    /// bound yet. A zipped value that is dropped takes its partners at the
    /// same position with it.
    pub fn select(&self, evaluator: &dyn SelectorEvaluator) -> Result<Self> {
        let empty = VariantCombination::new();
        let mut table = self.clone();
        let mut dropped: Vec<(String, Vec<usize>)> = Vec::new();

        for dim in &mut table.dimensions {
            let mut kept = Vec::with_capacity(dim.values.len());
            let mut removed = Vec::new();
            for (i, raw) in dim.values.iter().enumerate() {
                let (value, selector) = split_selector(raw);
                match selector {
                    Some(expr) if !evaluator.evaluate(expr, &empty) => removed.push(i),
                    _ => kept.push(value.to_string()),
                }
            }
            if !removed.is_empty() {
                debug!("Dropped {} value(s) of {} by selector", removed.len(), dim.name);
                dropped.push((dim.name.clone(), removed));
            }
            dim.values = kept;
        }

        // Keep zipped partners aligned with whatever a member lost
        for (name, removed) in dropped {
            let Some(group) = table.zip_groups.iter().find(|g| g.contains(&name)).cloned()
            else {
                continue;
            };
            for partner in group.iter().filter(|p| **p != name) {
                let original = self
                    .dimension(partner)
                    .map(|d| d.values.len())
                    .unwrap_or_default();
                if let Some(dim) = table.dimensions.iter_mut().find(|d| &d.name == partner)
                    && dim.values.len() == original
                {
                    dim.values = dim
                        .values
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| !removed.contains(i))
                        .map(|(_, v)| v.clone())
                        .collect();
                }
            }
        }

        table.validate()?;
        Ok(table)
    }

    /// Keep only dimensions in `used`, along with their whole zip groups
    pub fn restrict(&self, used: &BTreeSet<String>) -> Self {
        let mut keep: BTreeSet<&str> = used.iter().map(String::as_str).collect();
        for group in &self.zip_groups {
            if group.iter().any(|n| keep.contains(n.as_str())) {
                keep.extend(group.iter().map(String::as_str));
            }
        }

        let dimensions: Vec<VariantDimension> = self
            .dimensions
            .iter()
            .filter(|d| keep.contains(d.name.as_str()))
            .cloned()
            .collect();
        let zip_groups = self
            .zip_groups
            .iter()
            .filter(|g| g.iter().any(|n| keep.contains(n.as_str())))
            .cloned()
            .collect();

        let removed = self.dimensions.len() - dimensions.len();
        if removed > 0 {
            debug!("Ignoring {} variant dimension(s) the recipe never uses", removed);
        }

        Self {
            dimensions,
            zip_groups,
            pin_run_as_build: self.pin_run_as_build.clone(),
        }
    }

    /// Check that zip groups are well formed
    pub fn validate(&self) -> Result<()> {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        for group in &self.zip_groups {
            if group.len() < 2 {
                return Err(Error::VariantError(format!(
                    "zip group {:?} must name at least two dimensions",
                    group
                )));
            }

            let mut length = None;
            for name in group {
                if !seen.insert(name.as_str()) {
                    return Err(Error::VariantError(format!(
                        "dimension {} appears in more than one zip group",
                        name
                    )));
                }
                let dim = self.dimension(name).ok_or_else(|| {
                    Error::VariantError(format!("zip group names unknown dimension {}", name))
                })?;
                match length {
                    None => length = Some(dim.values.len()),
                    Some(len) if len != dim.values.len() => {
                        return Err(Error::VariantError(format!(
                            "zipped dimensions {:?} have different lengths",
                            group
                        )));
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(())
    }
}

fn scalar_text(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}

fn dimension_values(name: &str, value: &toml::Value) -> Result<Vec<String>> {
    let invalid = || Error::VariantError(format!("dimension {} must be a scalar or a list", name));
    match value {
        toml::Value::Array(items) => items
            .iter()
            .map(|item| scalar_text(item).ok_or_else(invalid))
            .collect(),
        other => scalar_text(other).map(|v| vec![v]).ok_or_else(invalid),
    }
}

fn parse_zip_keys(value: &toml::Value) -> Result<Vec<Vec<String>>> {
    let invalid = || Error::VariantError(format!("{} must be a list of name lists", ZIP_KEYS));
    let toml::Value::Array(items) = value else {
        return Err(invalid());
    };

    if items.is_empty() {
        return Ok(Vec::new());
    }

    // A flat list of names is a single group
    if items.iter().all(|i| i.is_str()) {
        let group = items.iter().filter_map(|i| i.as_str().map(String::from)).collect();
        return Ok(vec![group]);
    }

    items
        .iter()
        .map(|group| match group {
            toml::Value::Array(names) => names
                .iter()
                .map(|n| n.as_str().map(String::from).ok_or_else(invalid))
                .collect(),
            _ => Err(invalid()),
        })
        .collect()
}
