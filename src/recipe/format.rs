// src/recipe/format.rs

//! Recipe file format definitions
//!
//! Recipes are TOML files. Every string field may contain `%(key)s`
//! placeholders that are filled in per variant, and every requirement line
//! may end with a `# [selector]` comment.

use crate::selector::{identifiers, split_selector};
use crate::variant::VariantCombination;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

/// `%(key)s` placeholder
static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%\(([A-Za-z0-9_]+)\)s").expect("valid regex"));

/// A recipe template, before any variant is applied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeTemplate {
    /// Package metadata
    pub package: PackageSection,

    /// Build number, string and platform handling
    #[serde(default)]
    pub build: BuildSection,

    /// Requirement lines per section
    #[serde(default)]
    pub requirements: RequirementsSection,

    /// Variables for substitution (optional)
    #[serde(default)]
    pub variables: BTreeMap<String, String>,

    /// Additional packages produced by the same build
    #[serde(default)]
    pub outputs: Vec<OutputSection>,
}

impl RecipeTemplate {
    /// Substitute placeholders in a string
    ///
    /// Replaces `%(name)s` patterns with their values from:
    /// 1. The variant being rendered
    /// 2. Built-in variables (name, version, target_platform, build_platform)
    /// 3. Custom variables from the [variables] section
    ///
    /// Unknown placeholders are left in place.
    pub fn substitute(
        &self,
        template: &str,
        variant: &VariantCombination,
        target_platform: &str,
        build_platform: &str,
    ) -> String {
        PLACEHOLDER_RE
            .replace_all(template, |caps: &regex::Captures<'_>| {
                let key = &caps[1];
                let value = variant.get(key).map(str::to_string).or_else(|| match key {
                    "name" => Some(self.package.name.clone()),
                    "version" => Some(self.package.version.clone()),
                    "target_platform" => Some(target_platform.to_string()),
                    "build_platform" => Some(build_platform.to_string()),
                    _ => self.variables.get(key).cloned(),
                });
                value.unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    /// Every requirement line in the recipe, outputs included
    fn requirement_lines(&self) -> impl Iterator<Item = &str> {
        std::iter::once(&self.requirements)
            .chain(self.outputs.iter().map(|o| &o.requirements))
            .flat_map(|r| r.lines())
    }

    /// Names the recipe may draw from a variant table
    ///
    /// Collects placeholders, selector identifiers (with `py` standing for
    /// `python`) and build/host package names. Package names are reported
    /// with hyphens turned into underscores as well, since variant keys
    /// cannot always spell them.
    pub fn referenced_keys(&self) -> BTreeSet<String> {
        fn add_placeholders(text: &str, keys: &mut BTreeSet<String>) {
            for caps in PLACEHOLDER_RE.captures_iter(text) {
                keys.insert(caps[1].to_string());
            }
        }

        let mut keys = BTreeSet::new();

        add_placeholders(&self.package.name, &mut keys);
        add_placeholders(&self.package.version, &mut keys);
        if let Some(string) = &self.build.string {
            add_placeholders(string, &mut keys);
        }
        for value in self.variables.values() {
            add_placeholders(value, &mut keys);
        }
        for output in &self.outputs {
            add_placeholders(&output.name, &mut keys);
            if let Some(version) = &output.version {
                add_placeholders(version, &mut keys);
            }
        }

        let mut selectors: Vec<String> = Vec::new();
        if let Some(SkipCondition::Selector(expr)) = &self.build.skip {
            selectors.push(expr.clone());
        }
        for line in self.requirement_lines() {
            add_placeholders(line, &mut keys);
            if let (_, Some(selector)) = split_selector(line) {
                selectors.push(selector.to_string());
            }
        }
        for selector in &selectors {
            for ident in identifiers(selector) {
                if ident == "py" {
                    keys.insert("python".to_string());
                }
                keys.insert(ident);
            }
        }

        let pinnable = std::iter::once(&self.requirements)
            .chain(self.outputs.iter().map(|o| &o.requirements))
            .flat_map(|r| r.build.iter().chain(r.host.iter()));
        for line in pinnable {
            let (content, _) = split_selector(line);
            if let Some(name) = content.split_whitespace().next() {
                keys.insert(name.to_string());
                keys.insert(name.replace('-', "_"));
            }
        }

        keys
    }
}

/// Package metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSection {
    pub name: String,
    pub version: String,
}

/// How a package is classified for platform placement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Noarch {
    /// Platform specific
    #[default]
    None,
    /// Platform independent
    Generic,
    /// Platform independent python package
    Python,
}

impl Noarch {
    /// Whether the package lands in the `noarch` subdir
    pub fn is_noarch(self) -> bool {
        self != Noarch::None
    }
}

/// When a recipe refuses to build a variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SkipCondition {
    /// Always or never
    Flag(bool),
    /// Skip variants for which the selector holds
    Selector(String),
}

impl SkipCondition {
    /// The selector expression to evaluate, if the condition can ever hold
    pub fn as_selector(&self) -> Option<&str> {
        match self {
            SkipCondition::Flag(true) => Some("True"),
            SkipCondition::Flag(false) => None,
            SkipCondition::Selector(expr) => Some(expr),
        }
    }
}

/// Build section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildSection {
    /// Build number, bumped when a package is rebuilt unchanged
    #[serde(default)]
    pub number: u64,

    /// Explicit build string; derived from the variant when absent
    #[serde(default)]
    pub string: Option<String>,

    #[serde(default)]
    pub noarch: Option<Noarch>,

    /// Older spelling of `noarch = "python"`
    #[serde(default)]
    pub noarch_python: bool,

    #[serde(default)]
    pub skip: Option<SkipCondition>,
}

impl BuildSection {
    /// Effective noarch classification
    pub fn noarch(&self) -> Noarch {
        match self.noarch {
            Some(noarch) => noarch,
            None if self.noarch_python => Noarch::Python,
            None => Noarch::None,
        }
    }
}

/// Raw requirement lines, selectors and placeholders unresolved
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequirementsSection {
    #[serde(default)]
    pub build: Vec<String>,
    #[serde(default)]
    pub host: Vec<String>,
    #[serde(default)]
    pub run: Vec<String>,
    #[serde(default)]
    pub run_constrained: Vec<String>,
}

impl RequirementsSection {
    /// All lines across sections
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.build
            .iter()
            .chain(&self.host)
            .chain(&self.run)
            .chain(&self.run_constrained)
            .map(String::as_str)
    }
}

/// One extra package built alongside the parent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSection {
    pub name: String,

    /// Defaults to the parent version
    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub build: OutputBuildSection,

    #[serde(default)]
    pub requirements: RequirementsSection,
}

/// Build overrides for an output; unset fields inherit from the parent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputBuildSection {
    #[serde(default)]
    pub number: Option<u64>,

    #[serde(default)]
    pub string: Option<String>,

    #[serde(default)]
    pub noarch: Option<Noarch>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::parser::parse_recipe;

    const RECIPE: &str = r#"
[package]
name = "fancylib"
version = "2.4.1"

[build]
number = 2
skip = "win or py < 39"

[requirements]
build = ["%(compiler)s_%(target_platform)s", "cuda-nvcc %(cuda)s  # [linux and cuda != 'None']"]
host = ["python", "libjpeg-turbo"]
run = ["python", "%(name)s-data %(extra)s"]

[variables]
extra = ">=1"

[[outputs]]
name = "fancylib-docs"
[outputs.build]
noarch = "generic"
"#;

    #[test]
    fn test_substitute() {
        let recipe = parse_recipe(RECIPE).unwrap();
        let variant = VariantCombination::new().with("compiler", "gcc");
        let sub = |template: &str| recipe.substitute(template, &variant, "linux-64", "osx-arm64");

        assert_eq!(sub("%(compiler)s_%(target_platform)s"), "gcc_linux-64");
        assert_eq!(sub("%(compiler)s_%(build_platform)s"), "gcc_osx-arm64");
        assert_eq!(sub("%(name)s-data %(extra)s"), "fancylib-data >=1");
        assert_eq!(sub("%(unknown)s"), "%(unknown)s");
    }

    #[test]
    fn test_referenced_keys() {
        let recipe = parse_recipe(RECIPE).unwrap();
        let keys = recipe.referenced_keys();

        for key in ["compiler", "cuda", "python", "py", "libjpeg_turbo", "extra"] {
            assert!(keys.contains(key), "missing {}", key);
        }
        assert!(!keys.contains("numpy"));
    }

    #[test]
    fn test_noarch_defaults() {
        let recipe = parse_recipe(RECIPE).unwrap();
        assert_eq!(recipe.build.noarch(), Noarch::None);
        assert_eq!(recipe.build.number, 2);
        assert_eq!(recipe.outputs[0].build.noarch, Some(Noarch::Generic));

        let legacy = BuildSection {
            noarch_python: true,
            ..Default::default()
        };
        assert_eq!(legacy.noarch(), Noarch::Python);
        assert!(legacy.noarch().is_noarch());
    }

    #[test]
    fn test_skip_condition_forms() {
        assert_eq!(SkipCondition::Flag(true).as_selector(), Some("True"));
        assert_eq!(SkipCondition::Flag(false).as_selector(), None);
        assert_eq!(
            SkipCondition::Selector("win".to_string()).as_selector(),
            Some("win")
        );
    }
}
