// src/spec/mod.rs

//! Requirement specs and their constraint language
//!
//! A requirement is written as up to three whitespace-separated fields:
//!
//! ```text
//! name [version-clause [build-glob]]
//! ```
//!
//! Examples:
//! - `numpy` - any version
//! - `python 3.10.*` - fuzzy version
//! - `openssl >=3.0.1,<4.0a0` - bounded range
//! - `zlib 1.2.13 h5eee18b_0` - exact version and build
//! - `pkg * somestring*` - any version, build matching a glob
//!
//! An asterisk in either clause position means "unconstrained" and is kept
//! verbatim when the spec is formatted again.

pub mod pin;
pub mod simplify;

pub use pin::{PinPrecision, PinRule, PinRules, ResolvedPackage, get_pin_from_build};
pub use simplify::{Requirements, simplify_to_exact_constraints};

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Characters that turn a version clause into a range expression
const RANGE_CHARS: &[char] = &['<', '>', '!', '~', '*', ',', '|'];

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.+\-]*$").expect("package name pattern is valid")
});

/// Whitespace after an operator (`>= 1.0`) or around a separator (`>=1, <2`)
static LOOSE_OPERATOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(==|>=|<=|!=|~=|>|<|=)\s+|\s*([,|])\s*").expect("operator pattern is valid")
});

/// How tightly a spec constrains the package version
///
/// Ordered from weakest to strongest so the most specific spec compares
/// greatest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConstraintKind {
    /// No version clause, or `*`
    Unconstrained,
    /// A single `>`, `>=`, `<`, `<=` or `!=` bound
    OneBound,
    /// A bounded range: `>=a,<b`, a fuzzy `1.2.*`, `~=`, or a bare version
    BothBounds,
    /// One exact version (and build, when given)
    Exact,
}

/// A single requirement: package name, optional version clause, optional build glob
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RequirementSpec {
    pub name: String,
    pub version: Option<String>,
    pub build: Option<String>,
}

impl RequirementSpec {
    /// Create a spec with only a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            build: None,
        }
    }

    /// Set the version clause
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set the build glob
    pub fn with_build(mut self, build: impl Into<String>) -> Self {
        self.build = Some(build.into());
        self
    }

    /// Parse a requirement string
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::malformed(s, "empty requirement"));
        }

        let normalized = LOOSE_OPERATOR_RE.replace_all(trimmed, |caps: &regex::Captures| {
            match (caps.get(1), caps.get(2)) {
                (Some(op), _) => op.as_str().to_string(),
                (None, Some(sep)) => sep.as_str().to_string(),
                (None, None) => String::new(),
            }
        });

        let mut fields = normalized.split_whitespace();
        let name = fields.next().unwrap_or_default();
        let version = fields.next().map(str::to_string);
        let build = fields.next().map(str::to_string);

        if fields.next().is_some() {
            return Err(Error::malformed(s, "more than three fields"));
        }

        validate_name(s, name)?;

        if let Some(build) = &build {
            glob::Pattern::new(build)
                .map_err(|e| Error::malformed(s, format!("invalid build glob: {}", e)))?;
        }

        Ok(Self {
            name: name.to_string(),
            version,
            build,
        })
    }

    /// The version clause, treating `*` as absent
    pub fn version_constraint(&self) -> Option<&str> {
        self.version.as_deref().filter(|v| *v != "*")
    }

    /// The build glob, treating `*` as absent
    pub fn build_constraint(&self) -> Option<&str> {
        self.build.as_deref().filter(|b| *b != "*")
    }

    /// Whether the spec places no constraint on the version
    pub fn is_unconstrained(&self) -> bool {
        self.version_constraint().is_none()
    }

    /// Whether this spec selects exactly one version (and build)
    ///
    /// Either an explicit `==version`, or a plain version with a literal
    /// (non-glob) build string, e.g. `zlib 1.2.13 h5eee18b_0`.
    pub fn is_exact(&self) -> bool {
        let Some(version) = self.version_constraint() else {
            return false;
        };

        if let Some(rest) = version.strip_prefix("==") {
            return !rest.is_empty()
                && !rest.contains(RANGE_CHARS)
                && self.build.as_deref().is_none_or(|b| !b.contains('*'));
        }

        match self.build.as_deref() {
            Some(build) => {
                !version.contains(RANGE_CHARS) && !version.starts_with('=') && !build.contains('*')
            }
            None => false,
        }
    }

    /// Classify how tightly this spec constrains the version
    pub fn kind(&self) -> ConstraintKind {
        if self.is_exact() {
            return ConstraintKind::Exact;
        }

        let Some(version) = self.version_constraint() else {
            return ConstraintKind::Unconstrained;
        };

        if version.contains('|') {
            // Alternatives widen the match; treat as a single bound at best
            return ConstraintKind::OneBound;
        }

        if version.contains(',') {
            let has_lower = version.split(',').any(|p| p.starts_with('>'));
            let has_upper = version.split(',').any(|p| p.starts_with('<'));
            return if has_lower && has_upper {
                ConstraintKind::BothBounds
            } else {
                ConstraintKind::OneBound
            };
        }

        if version.starts_with(['<', '>']) || version.starts_with("!=") {
            ConstraintKind::OneBound
        } else {
            // `1.2.*`, `=1.2`, `~=1.2`, `1.2.3`
            ConstraintKind::BothBounds
        }
    }

    /// Pin an unversioned spec to a variant value
    ///
    /// A bare version `3.10` becomes `3.10.*`; a value carrying a space
    /// (`1.2.3 h123_0`) provides both the version and the build glob.
    pub fn pinned_to_variant(&self, value: &str) -> Result<Self> {
        let mut parts = value.split_whitespace();
        let version = match parts.next() {
            Some(v) => v,
            None => return Ok(self.clone()),
        };
        let build = parts.next();

        let version = if version.contains(RANGE_CHARS) || version.starts_with('=') {
            version.to_string()
        } else {
            format!("{}.*", version)
        };

        let mut pinned = Self::new(self.name.clone()).with_version(version);
        if let Some(build) = build.or(self.build.as_deref()) {
            pinned = pinned.with_build(build);
        }

        // Re-validate the combined spec
        Self::parse(&pinned.to_string())
    }
}

fn validate_name(input: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::malformed(input, "empty package name"));
    }
    if !NAME_RE.is_match(name) {
        return Err(Error::malformed(
            input,
            format!("illegal characters in package name '{}'", name),
        ));
    }
    if name.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return Err(Error::malformed(
            input,
            format!("package name '{}' looks like a version", name),
        ));
    }
    Ok(())
}

impl fmt::Display for RequirementSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(version) = &self.version {
            write!(f, " {}", version)?;
        }
        if let Some(build) = &self.build {
            if self.version.is_none() {
                // Keep the build in third position
                write!(f, " *")?;
            }
            write!(f, " {}", build)?;
        }
        Ok(())
    }
}

impl FromStr for RequirementSpec {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        RequirementSpec::parse(s)
    }
}

impl TryFrom<String> for RequirementSpec {
    type Error = Error;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        RequirementSpec::parse(&s)
    }
}

impl From<RequirementSpec> for String {
    fn from(spec: RequirementSpec) -> Self {
        spec.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_name_only() {
        let spec = RequirementSpec::parse("numpy").unwrap();
        assert_eq!(spec.name, "numpy");
        assert!(spec.version.is_none());
        assert!(spec.build.is_none());
        assert_eq!(spec.to_string(), "numpy");
    }

    #[test]
    fn test_parse_all_fields() {
        let spec = RequirementSpec::parse("zlib 1.2.13 h5eee18b_0").unwrap();
        assert_eq!(spec.name, "zlib");
        assert_eq!(spec.version.as_deref(), Some("1.2.13"));
        assert_eq!(spec.build.as_deref(), Some("h5eee18b_0"));
    }

    #[test]
    fn test_wildcards_round_trip() {
        let spec = RequirementSpec::parse("pkg * somestring*").unwrap();
        assert_eq!(spec.version.as_deref(), Some("*"));
        assert!(spec.version_constraint().is_none());
        assert_eq!(spec.to_string(), "pkg * somestring*");

        let spec = RequirementSpec::parse("pkg   *").unwrap();
        assert_eq!(spec.to_string(), "pkg *");
    }

    #[test]
    fn test_loose_operators_are_joined() {
        let spec = RequirementSpec::parse("openssl >= 3.0, < 4").unwrap();
        assert_eq!(spec.version.as_deref(), Some(">=3.0,<4"));
        assert!(spec.build.is_none());
    }

    #[test]
    fn test_malformed_specs() {
        assert!(matches!(
            RequirementSpec::parse(""),
            Err(Error::MalformedSpec { .. })
        ));
        assert!(RequirementSpec::parse("   ").is_err());
        assert!(RequirementSpec::parse("a b c d").is_err());
        assert!(RequirementSpec::parse("%(compiler)s_linux").is_err());
        assert!(RequirementSpec::parse("1.2.3").is_err());
        assert!(RequirementSpec::parse(">=1.0").is_err());
        assert!(RequirementSpec::parse("pkg 1.0 [abc").is_err());
    }

    #[test]
    fn test_exactness() {
        assert!(RequirementSpec::parse("exact 1.2.3 1").unwrap().is_exact());
        assert!(RequirementSpec::parse("exact ==1.2.3").unwrap().is_exact());
        assert!(RequirementSpec::parse("exact ==1.2.3 h1_0").unwrap().is_exact());
        assert!(!RequirementSpec::parse("exact ==1.2.3 h1*").unwrap().is_exact());
        assert!(!RequirementSpec::parse("exact 1.2.3").unwrap().is_exact());
        assert!(!RequirementSpec::parse("exact 1.2.* 1").unwrap().is_exact());
        assert!(!RequirementSpec::parse("exact >1.0,<2").unwrap().is_exact());
        assert!(!RequirementSpec::parse("exact").unwrap().is_exact());
    }

    #[test]
    fn test_kind_ordering() {
        let kind = |s: &str| RequirementSpec::parse(s).unwrap().kind();

        assert_eq!(kind("pkg"), ConstraintKind::Unconstrained);
        assert_eq!(kind("pkg * abc*"), ConstraintKind::Unconstrained);
        assert_eq!(kind("pkg >=1.0"), ConstraintKind::OneBound);
        assert_eq!(kind("pkg !=1.5"), ConstraintKind::OneBound);
        assert_eq!(kind("pkg >1.0|<0.5"), ConstraintKind::OneBound);
        assert_eq!(kind("pkg >1.0,<2"), ConstraintKind::BothBounds);
        assert_eq!(kind("pkg 1.2.*"), ConstraintKind::BothBounds);
        assert_eq!(kind("pkg 1.2.3 0"), ConstraintKind::Exact);

        assert!(ConstraintKind::Exact > ConstraintKind::BothBounds);
        assert!(ConstraintKind::BothBounds > ConstraintKind::OneBound);
        assert!(ConstraintKind::OneBound > ConstraintKind::Unconstrained);
    }

    #[test]
    fn test_pinned_to_variant() {
        let python = RequirementSpec::new("python");
        assert_eq!(python.pinned_to_variant("3.10").unwrap().to_string(), "python 3.10.*");

        let openssl = RequirementSpec::new("openssl");
        assert_eq!(
            openssl.pinned_to_variant("3.0.13 h1234_0").unwrap().to_string(),
            "openssl 3.0.13.* h1234_0"
        );
        assert_eq!(
            openssl.pinned_to_variant(">=3,<4").unwrap().to_string(),
            "openssl >=3,<4"
        );
    }

    #[test]
    fn test_serde_as_string() {
        let spec = RequirementSpec::parse("pkg >=1.0 abc*").unwrap();
        let json = serde_json::to_string(&spec).unwrap();
        assert_eq!(json, "\"pkg >=1.0 abc*\"");

        let back: RequirementSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec);
    }
}
