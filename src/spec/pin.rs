// src/spec/pin.rs

//! Pin expressions for run requirements
//!
//! A `pin_run_as_build` rule turns an unversioned run requirement into a
//! version range derived from the version the package was built against.
//! Precision is written as `x` placeholders: `x.x` keeps two leading
//! version components.
//!
//! ```text
//! rule max_pin = "x.x", built against 1.2.3  =>  >=1.2.3,<1.3.0a0
//! ```

use crate::error::{Error, Result};
use crate::spec::RequirementSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Pin rules keyed by package name
pub type PinRules = BTreeMap<String, PinRule>;

/// Suffix appended to upper bounds so pre-releases of the bound don't match
const UPPER_BOUND_SUFFIX: &str = "a0";

/// Number of leading version components a pin preserves (`x.x` = 2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PinPrecision(usize);

impl PinPrecision {
    /// Create a precision; zero components is not a valid pin
    pub fn new(components: usize) -> Result<Self> {
        if components == 0 {
            return Err(Error::InvalidPin(String::new()));
        }
        Ok(Self(components))
    }

    /// Number of components preserved
    pub fn components(&self) -> usize {
        self.0
    }

    /// Parse the placeholder syntax (`x`, `x.x`, `x.x.x`, ...)
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidPin(s.to_string()));
        }

        let mut count = 0;
        for part in s.split('.') {
            if !part.eq_ignore_ascii_case("x") {
                return Err(Error::InvalidPin(s.to_string()));
            }
            count += 1;
        }

        Self::new(count)
    }
}

impl fmt::Display for PinPrecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", vec!["x"; self.0].join("."))
    }
}

impl FromStr for PinPrecision {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        PinPrecision::parse(s)
    }
}

impl TryFrom<String> for PinPrecision {
    type Error = Error;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        PinPrecision::parse(&s)
    }
}

impl From<PinPrecision> for String {
    fn from(p: PinPrecision) -> Self {
        p.to_string()
    }
}

/// How a package's run requirement is derived from its build-time version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawPinRule")]
pub struct PinRule {
    pub max_pin: Option<PinPrecision>,
    pub min_pin: Option<PinPrecision>,
    pub exact: bool,
}

/// On-disk forms of a pin rule: `"x.x"` or `{ max_pin = "x.x", ... }`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawPinRule {
    Expression(String),
    Table {
        #[serde(default)]
        max_pin: Option<String>,
        #[serde(default)]
        min_pin: Option<String>,
        #[serde(default)]
        exact: bool,
    },
}

impl TryFrom<RawPinRule> for PinRule {
    type Error = Error;

    fn try_from(raw: RawPinRule) -> std::result::Result<Self, Self::Error> {
        match raw {
            // A single expression bounds both sides at the same precision
            RawPinRule::Expression(expr) => {
                let precision = PinPrecision::parse(&expr)?;
                Ok(Self {
                    max_pin: Some(precision),
                    min_pin: Some(precision),
                    exact: false,
                })
            }
            RawPinRule::Table {
                max_pin,
                min_pin,
                exact,
            } => Ok(Self {
                max_pin: max_pin.as_deref().map(PinPrecision::parse).transpose()?,
                min_pin: min_pin.as_deref().map(PinPrecision::parse).transpose()?,
                exact,
            }),
        }
    }
}

impl PinRule {
    /// Rule with only an upper-bound precision
    pub fn max(precision: PinPrecision) -> Self {
        Self {
            max_pin: Some(precision),
            ..Default::default()
        }
    }

    /// Rule pinning to the exact version and build
    pub fn exact() -> Self {
        Self {
            exact: true,
            ..Default::default()
        }
    }

    /// Set the lower-bound precision
    pub fn with_min(mut self, precision: PinPrecision) -> Self {
        self.min_pin = Some(precision);
        self
    }

    /// Version range for a resolved version, e.g. `>=1.2.3,<1.3.0a0`
    pub fn range_for(&self, version: &str) -> Result<String> {
        let lower = lower_bound(version, self.min_pin)?;
        let upper = upper_bound(version, self.max_pin.unwrap_or(PinPrecision(1)))?;
        Ok(format!(">={},<{}", lower, upper))
    }
}

/// A package version and build string as installed or resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPackage {
    pub version: String,
    pub build: Option<String>,
}

impl ResolvedPackage {
    /// Create a resolved package from its parts
    pub fn new(version: impl Into<String>, build: Option<String>) -> Self {
        Self {
            version: version.into(),
            build,
        }
    }

    /// Parse the `"version build"` form
    pub fn parse(s: &str) -> Result<Self> {
        let mut parts = s.split_whitespace();
        let version = parts
            .next()
            .ok_or_else(|| Error::InvalidVersion(s.to_string()))?;
        let build = parts.next().map(str::to_string);
        if parts.next().is_some() {
            return Err(Error::InvalidVersion(s.to_string()));
        }
        Ok(Self::new(version, build))
    }
}

fn components(version: &str) -> Result<Vec<&str>> {
    let parts: Vec<&str> = version.split('.').collect();
    if version.is_empty() || parts.iter().any(|p| p.is_empty()) {
        return Err(Error::InvalidVersion(version.to_string()));
    }
    Ok(parts)
}

/// Round a version down to `precision` components, padding with zeros
///
/// Without a precision the full version is the lower bound.
pub fn lower_bound(version: &str, precision: Option<PinPrecision>) -> Result<String> {
    let parts = components(version)?;
    let Some(precision) = precision else {
        return Ok(version.to_string());
    };

    let bound: Vec<&str> = (0..precision.components())
        .map(|i| parts.get(i).copied().unwrap_or("0"))
        .collect();
    Ok(bound.join("."))
}

/// First version excluded by a pin of the given precision
///
/// Increments component `precision - 1`, zero-fills every later component
/// (the bound is as long as the longer of the precision and the version),
/// and appends `a0`.
pub fn upper_bound(version: &str, precision: PinPrecision) -> Result<String> {
    let parts = components(version)?;
    let n = precision.components();
    let width = n.max(parts.len());

    let mut bound = Vec::with_capacity(width);
    for i in 0..width {
        let part = parts.get(i).copied().unwrap_or("0");
        if i + 1 < n {
            bound.push(part.to_string());
        } else if i + 1 == n {
            bound.push(increment(version, part)?);
        } else {
            bound.push("0".to_string());
        }
    }

    Ok(format!("{}{}", bound.join("."), UPPER_BOUND_SUFFIX))
}

/// Increment the numeric prefix of a component (`3` -> `4`, `1g` -> `2`)
fn increment(version: &str, part: &str) -> Result<String> {
    let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
    let value: u64 = digits
        .parse()
        .map_err(|_| Error::InvalidVersion(version.to_string()))?;
    Ok((value + 1).to_string())
}

/// Synthesize a pinned requirement from a template and a resolved package
///
/// The template's build glob, when present, is carried over verbatim; the
/// resolved build string only contributes to exact pins without a glob.
/// A template whose package has no rule is returned unchanged.
pub fn get_pin_from_build(
    template: &RequirementSpec,
    rules: &PinRules,
    resolved: &BTreeMap<String, ResolvedPackage>,
) -> Result<RequirementSpec> {
    let Some(rule) = rules.get(&template.name) else {
        return Ok(template.clone());
    };

    let package = resolved
        .get(&template.name)
        .ok_or_else(|| Error::UnresolvedPackage(template.name.clone()))?;

    let glob = template.build_constraint();
    if let (Some(glob), Some(build)) = (glob, package.build.as_deref()) {
        let matches = glob::Pattern::new(glob)
            .map(|p| p.matches(build))
            .unwrap_or(false);
        if !matches {
            warn!(
                "Build glob '{}' for {} does not match resolved build '{}'; keeping the glob",
                glob, template.name, build
            );
        }
    }

    let pinned = if rule.exact {
        let mut spec = RequirementSpec::new(template.name.clone())
            .with_version(format!("=={}", package.version));
        if let Some(build) = glob.or(package.build.as_deref()) {
            spec = spec.with_build(build);
        }
        spec
    } else {
        let mut spec = RequirementSpec::new(template.name.clone())
            .with_version(rule.range_for(&package.version)?);
        if let Some(glob) = glob {
            spec = spec.with_build(glob);
        }
        spec
    };

    debug!("Pinned {} -> {}", template, pinned);
    Ok(pinned)
}
