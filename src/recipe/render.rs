// src/recipe/render.rs

//! Rendering a recipe into concrete package metadata
//!
//! One render pass expands the variant table, then for every combination
//! fills in the recipe's placeholders, drops lines whose selectors are
//! false, pins host requirements to variant values, pins run requirements
//! per `pin_run_as_build`, and collapses duplicate build/host specs.
//! Combinations are rendered in parallel; output order follows expansion
//! order.

use crate::config::RenderConfig;
use crate::error::{Error, Result};
use crate::platform::NOARCH_SUBDIR;
use crate::recipe::format::{Noarch, OutputSection, RecipeTemplate, RequirementsSection};
use crate::recipe::parser::validate_recipe;
use crate::recipe::source::{RecipeSource, with_recipe};
use crate::selector::{PlatformSelectors, SelectorEvaluator, python_tag, split_selector};
use crate::spec::{
    PinRules, RequirementSpec, Requirements, ResolvedPackage, get_pin_from_build,
    simplify_to_exact_constraints,
};
use crate::variant::{VariantCombination, VariantExpander, VariantTable};
use rayon::prelude::*;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Variant keys folded into the build string prefix, with their tags
const BUILD_STRING_PREFIXES: &[(&str, &str)] = &[("numpy", "np"), ("python", "py")];

/// Hex digits of the variant hash kept in a build string
const HASH_LENGTH: usize = 7;

/// A fully rendered package for one variant
#[derive(Debug, Clone, Serialize)]
pub struct RenderedMetadata {
    pub name: String,
    pub version: String,
    pub build_number: u64,
    pub build_string: String,
    pub noarch: Noarch,
    pub subdir: String,
    pub requirements: Requirements,
    /// Packages split out of this one, rendered under the same variant
    pub outputs: Vec<RenderedMetadata>,
    pub variant: VariantCombination,
    /// Snapshot of the configuration the package was rendered with
    #[serde(skip)]
    pub config: Arc<RenderConfig>,
}

impl RenderedMetadata {
    /// `name-version-build`, the key packages are stored under
    pub fn dist_name(&self) -> String {
        format!("{}-{}-{}", self.name, self.version, self.build_string)
    }

    pub fn is_noarch(&self) -> bool {
        self.noarch.is_noarch()
    }

    /// Packages this metadata actually produces
    ///
    /// A recipe with outputs produces those outputs (recursively); one
    /// without produces itself.
    pub fn leaves(&self) -> Vec<&RenderedMetadata> {
        if self.outputs.is_empty() {
            return vec![self];
        }
        self.outputs.iter().flat_map(|o| o.leaves()).collect()
    }
}

/// Render every variant of the recipe at `path`
///
/// Selectors are evaluated for the configured host platform. The recipe
/// is released before this returns.
pub fn render_recipe(path: &Path, config: &RenderConfig) -> Result<Vec<RenderedMetadata>> {
    let selectors = PlatformSelectors::new(config.host_platform());
    with_recipe(path, |source| render_source(source, config, &selectors))
}

/// Render every variant of an opened recipe with a custom selector evaluator
pub fn render_source(
    source: &RecipeSource,
    config: &RenderConfig,
    evaluator: &dyn SelectorEvaluator,
) -> Result<Vec<RenderedMetadata>> {
    let recipe = source.read_recipe()?;
    for warning in validate_recipe(&recipe)? {
        warn!("{}: {}", source.origin().display(), warning);
    }

    let table = config
        .load_variants(source.read_variants()?)?
        .select(evaluator)?
        .restrict(&recipe.referenced_keys());

    let skip = recipe.build.skip.as_ref().and_then(|s| s.as_selector());
    let expander = VariantExpander::new(&table, evaluator)?.with_skip(skip);
    let variants = expander.expand();
    info!(
        "Rendering {} of {} variant(s) of {} for {}",
        variants.len(),
        expander.candidate_count(),
        recipe.package.name,
        config.host_subdir
    );

    let renderer = Renderer {
        recipe: &recipe,
        pin_rules: table.pin_run_as_build(),
        resolved: config.resolved_packages()?,
        evaluator,
        config: Arc::new(config.clone()),
    };

    variants
        .par_iter()
        .map(|variant| renderer.render_variant(variant))
        .collect()
}

/// Shared, read-only state of one render pass
struct Renderer<'a> {
    recipe: &'a RecipeTemplate,
    pin_rules: &'a PinRules,
    resolved: BTreeMap<String, ResolvedPackage>,
    evaluator: &'a dyn SelectorEvaluator,
    config: Arc<RenderConfig>,
}

impl Renderer<'_> {
    fn substitute(&self, template: &str, variant: &VariantCombination) -> String {
        self.recipe.substitute(
            template,
            variant,
            &self.config.host_subdir,
            &self.config.build_subdir,
        )
    }

    fn subdir_for(&self, noarch: Noarch) -> String {
        if noarch.is_noarch() {
            NOARCH_SUBDIR.to_string()
        } else {
            self.config.host_subdir.clone()
        }
    }

    fn render_variant(&self, variant: &VariantCombination) -> Result<RenderedMetadata> {
        let build = &self.recipe.build;
        let noarch = build.noarch();
        let version = self.substitute(&self.recipe.package.version, variant);
        let requirements = self.render_requirements(&self.recipe.requirements, variant, noarch)?;
        let build_string = match &build.string {
            Some(template) => self.substitute(template, variant),
            None => derive_build_string(variant, noarch, build.number)?,
        };

        let outputs = self
            .recipe
            .outputs
            .iter()
            .map(|output| self.render_output(output, variant, &version))
            .collect::<Result<Vec<_>>>()?;

        let metadata = RenderedMetadata {
            name: self.substitute(&self.recipe.package.name, variant),
            version,
            build_number: build.number,
            build_string,
            noarch,
            subdir: self.subdir_for(noarch),
            requirements,
            outputs,
            variant: variant.clone(),
            config: Arc::clone(&self.config),
        };
        debug!("Rendered {} for {}", metadata.dist_name(), variant);
        Ok(metadata)
    }

    fn render_output(
        &self,
        output: &OutputSection,
        variant: &VariantCombination,
        parent_version: &str,
    ) -> Result<RenderedMetadata> {
        let noarch = output.build.noarch.unwrap_or_else(|| self.recipe.build.noarch());
        let number = output.build.number.unwrap_or(self.recipe.build.number);
        let build_string = match &output.build.string {
            Some(template) => self.substitute(template, variant),
            None => derive_build_string(variant, noarch, number)?,
        };

        Ok(RenderedMetadata {
            name: self.substitute(&output.name, variant),
            version: match &output.version {
                Some(version) => self.substitute(version, variant),
                None => parent_version.to_string(),
            },
            build_number: number,
            build_string,
            noarch,
            subdir: self.subdir_for(noarch),
            requirements: self.render_requirements(&output.requirements, variant, noarch)?,
            outputs: Vec::new(),
            variant: variant.clone(),
            config: Arc::clone(&self.config),
        })
    }

    /// Resolve selectors and placeholders in one section
    fn render_section(
        &self,
        lines: &[String],
        variant: &VariantCombination,
    ) -> Result<Vec<RequirementSpec>> {
        let mut specs = Vec::with_capacity(lines.len());
        for line in lines {
            let (content, selector) = split_selector(line);
            if let Some(expr) = selector
                && !self.evaluator.evaluate(expr, variant)
            {
                continue;
            }
            specs.push(RequirementSpec::parse(&self.substitute(content, variant))?);
        }
        Ok(specs)
    }

    fn render_requirements(
        &self,
        section: &RequirementsSection,
        variant: &VariantCombination,
        noarch: Noarch,
    ) -> Result<Requirements> {
        let mut requirements = Requirements {
            build: pin_to_variant(self.render_section(&section.build, variant)?, variant)?,
            host: pin_to_variant(self.render_section(&section.host, variant)?, variant)?,
            run: self.render_section(&section.run, variant)?,
            run_constrained: self.render_section(&section.run_constrained, variant)?,
        };

        // Collapse build/host first so run pins see the winning exact pin
        simplify_to_exact_constraints(&mut requirements)?;

        let run = std::mem::take(&mut requirements.run);
        requirements.run = run
            .into_iter()
            .map(|spec| self.pin_run_as_build(spec, &requirements, variant, noarch))
            .collect::<Result<_>>()?;
        Ok(requirements)
    }

    /// Pin an unversioned run requirement to what it was built against
    fn pin_run_as_build(
        &self,
        spec: RequirementSpec,
        requirements: &Requirements,
        variant: &VariantCombination,
        noarch: Noarch,
    ) -> Result<RequirementSpec> {
        if spec.version_constraint().is_some() || !self.pin_rules.contains_key(&spec.name) {
            return Ok(spec);
        }
        if noarch.is_noarch() && spec.name == "python" {
            return Ok(spec);
        }

        let source = requirements.pin_source();
        let Some(built_with) = source.iter().find(|s| s.name == spec.name) else {
            return Ok(spec);
        };

        let resolved = self
            .resolved
            .get(&spec.name)
            .cloned()
            .or_else(|| exact_pin(built_with))
            .map(Ok)
            .or_else(|| variant_value(variant, &spec.name).map(ResolvedPackage::parse));
        let resolved = match resolved {
            Some(resolved) => resolved?,
            None => {
                debug!("No resolved version for {}; leaving it unpinned", spec.name);
                return Ok(spec);
            }
        };

        let resolved = BTreeMap::from([(spec.name.clone(), resolved)]);
        get_pin_from_build(&spec, self.pin_rules, &resolved)
    }
}

/// Variant value for a package, matching `-` and `_` alike
fn variant_value<'v>(variant: &'v VariantCombination, name: &str) -> Option<&'v str> {
    variant
        .get(name)
        .or_else(|| variant.get(&name.replace('-', "_")))
}

/// Resolved version and build of an exact pin
fn exact_pin(spec: &RequirementSpec) -> Option<ResolvedPackage> {
    if !spec.is_exact() {
        return None;
    }
    let version = spec.version_constraint()?.trim_start_matches("==");
    Some(ResolvedPackage::new(version, spec.build.clone()))
}

/// Pin bare build/host requirements to the variant's value for them
fn pin_to_variant(
    specs: Vec<RequirementSpec>,
    variant: &VariantCombination,
) -> Result<Vec<RequirementSpec>> {
    specs
        .into_iter()
        .map(|spec| {
            if spec.version.is_some() || spec.build.is_some() {
                return Ok(spec);
            }
            match variant_value(variant, &spec.name) {
                Some(value) => spec.pinned_to_variant(value),
                None => Ok(spec),
            }
        })
        .collect()
}

/// Build string for a variant: `<prefix>h<hash>_<number>`
///
/// Python and numpy versions become a readable prefix (`np126py310`) unless
/// the package is noarch. Every other variant entry feeds the hash.
pub fn derive_build_string(
    variant: &VariantCombination,
    noarch: Noarch,
    number: u64,
) -> Result<String> {
    let mut hashed: BTreeMap<&str, &str> = variant.iter().collect();
    let mut prefix = String::new();

    if !noarch.is_noarch() {
        for (key, tag) in BUILD_STRING_PREFIXES {
            if let Some(value) = variant.get(key)
                && let Some(short) = python_tag(value)
            {
                prefix.push_str(tag);
                prefix.push_str(&short);
                hashed.remove(key);
            }
        }
    }

    if !hashed.is_empty() {
        let encoded = serde_json::to_string(&hashed)
            .map_err(|e| Error::ParseError(format!("cannot hash variant: {}", e)))?;
        let digest = hex::encode(Sha256::digest(encoded.as_bytes()));
        prefix.push('h');
        prefix.push_str(&digest[..HASH_LENGTH]);
    }

    if prefix.is_empty() {
        Ok(number.to_string())
    } else {
        Ok(format!("{}_{}", prefix, number))
    }
}

/// Expand a recipe's variants without rendering them
///
/// Useful for counting builds or listing combinations.
pub fn expand_variants(
    recipe: &RecipeTemplate,
    table: &VariantTable,
    evaluator: &dyn SelectorEvaluator,
) -> Result<Vec<VariantCombination>> {
    let table = table.select(evaluator)?.restrict(&recipe.referenced_keys());
    let skip = recipe.build.skip.as_ref().and_then(|s| s.as_selector());
    Ok(VariantExpander::new(&table, evaluator)?
        .with_skip(skip)
        .expand())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::parser::parse_recipe;
    use crate::spec::{PinPrecision, PinRule};

    fn renderer<'a>(
        recipe: &'a RecipeTemplate,
        rules: &'a PinRules,
        evaluator: &'a dyn SelectorEvaluator,
    ) -> Renderer<'a> {
        Renderer {
            recipe,
            pin_rules: rules,
            resolved: BTreeMap::new(),
            evaluator,
            config: Arc::new(RenderConfig::new().with_host_subdir("linux-64")),
        }
    }

    fn strings(specs: &[RequirementSpec]) -> Vec<String> {
        specs.iter().map(ToString::to_string).collect()
    }

    const RECIPE: &str = r#"
[package]
name = "fancylib"
version = "2.4.1"

[build]
number = 1

[requirements]
build = ["%(compiler)s_%(target_platform)s", "cmake >=3.20", "nvcc  # [cuda != 'None']"]
host = ["python", "openssl", "cmake", "libblas * *%(blas)s"]
run = ["python", "openssl", "libblas * *%(blas)s"]
"#;

    fn variant() -> VariantCombination {
        VariantCombination::new()
            .with("compiler", "gcc")
            .with("python", "3.10")
            .with("openssl", "3")
            .with("blas", "mkl")
            .with("cuda", "None")
    }

    #[test]
    fn test_render_variant_requirements() {
        let recipe = parse_recipe(RECIPE).unwrap();
        let rules = PinRules::from([
            ("python".to_string(), PinRule::max(PinPrecision::new(2).unwrap())
                .with_min(PinPrecision::new(2).unwrap())),
            ("openssl".to_string(), PinRule::max(PinPrecision::new(1).unwrap())),
        ]);
        let selectors = PlatformSelectors::for_subdir("linux-64");
        let metadata = renderer(&recipe, &rules, &selectors)
            .render_variant(&variant())
            .unwrap();

        assert_eq!(
            strings(&metadata.requirements.build),
            vec!["gcc_linux-64", "cmake >=3.20"]
        );
        assert_eq!(
            strings(&metadata.requirements.host),
            vec!["python 3.10.*", "openssl 3.*", "cmake >=3.20", "libblas * *mkl"]
        );
        assert_eq!(
            strings(&metadata.requirements.run),
            vec!["python >=3.10,<3.11a0", "openssl >=3,<4a0", "libblas * *mkl"]
        );
        assert_eq!(metadata.subdir, "linux-64");
        assert!(metadata.build_string.starts_with("py310h"));
        assert!(metadata.build_string.ends_with("_1"));
    }

    #[test]
    fn test_resolved_version_wins_over_variant() {
        let recipe = parse_recipe(RECIPE).unwrap();
        let rules = PinRules::from([(
            "openssl".to_string(),
            PinRule::max(PinPrecision::new(2).unwrap()),
        )]);
        let selectors = PlatformSelectors::for_subdir("linux-64");
        let mut r = renderer(&recipe, &rules, &selectors);
        r.resolved
            .insert("openssl".to_string(), ResolvedPackage::parse("3.0.13 h1_0").unwrap());

        let metadata = r.render_variant(&variant()).unwrap();
        assert_eq!(metadata.requirements.run[1].to_string(), "openssl >=3.0.13,<3.1.0a0");
    }

    #[test]
    fn test_run_pin_uses_exact_host_pin() {
        let recipe = parse_recipe(
            r#"
[package]
name = "consumer"
version = "1.0"

[requirements]
host = ["zlib", "zlib 1.2.13 h0_0"]
run = ["zlib"]
"#,
        )
        .unwrap();
        let rules = PinRules::from([(
            "zlib".to_string(),
            PinRule::max(PinPrecision::new(2).unwrap()),
        )]);
        let selectors = PlatformSelectors::for_subdir("linux-64");
        let metadata = renderer(&recipe, &rules, &selectors)
            .render_variant(&VariantCombination::new())
            .unwrap();

        assert_eq!(strings(&metadata.requirements.host), vec!["zlib 1.2.13 h0_0"]);
        assert_eq!(
            strings(&metadata.requirements.run),
            vec!["zlib >=1.2.13,<1.3.0a0"]
        );
    }

    #[test]
    fn test_build_platform_placeholder() {
        let recipe = parse_recipe(
            r#"
[package]
name = "crossed"
version = "1.0"

[requirements]
build = ["%(compiler)s_%(build_platform)s"]
host = ["%(compiler)s_%(target_platform)s"]
"#,
        )
        .unwrap();
        let rules = PinRules::new();
        let selectors = PlatformSelectors::for_subdir("osx-arm64");
        let mut r = renderer(&recipe, &rules, &selectors);
        r.config = Arc::new(
            RenderConfig::new()
                .with_host_subdir("osx-arm64")
                .with_build_subdir("osx-64"),
        );

        let metadata = r
            .render_variant(&VariantCombination::new().with("compiler", "clang"))
            .unwrap();
        assert_eq!(strings(&metadata.requirements.build), vec!["clang_osx-64"]);
        assert_eq!(strings(&metadata.requirements.host), vec!["clang_osx-arm64"]);
        assert_eq!(metadata.subdir, "osx-arm64");
    }

    #[test]
    fn test_noarch_python_not_pinned() {
        let recipe = parse_recipe(
            r#"
[package]
name = "purepy"
version = "1.0"

[build]
noarch = "python"

[requirements]
host = ["python"]
run = ["python"]
"#,
        )
        .unwrap();
        let rules = PinRules::from([(
            "python".to_string(),
            PinRule::max(PinPrecision::new(2).unwrap()),
        )]);
        let selectors = PlatformSelectors::for_subdir("linux-64");
        let metadata = renderer(&recipe, &rules, &selectors)
            .render_variant(&VariantCombination::new().with("python", "3.10"))
            .unwrap();

        assert_eq!(metadata.subdir, "noarch");
        assert_eq!(strings(&metadata.requirements.run), vec!["python"]);
        // Noarch packages get no python prefix
        assert!(metadata.build_string.starts_with('h'));
    }

    #[test]
    fn test_outputs_inherit_from_parent() {
        let recipe = parse_recipe(
            r#"
[package]
name = "parent"
version = "1.0"

[build]
number = 3

[[outputs]]
name = "%(name)s-docs"
[outputs.build]
noarch = "generic"

[[outputs]]
name = "libparent"
version = "2.0"
"#,
        )
        .unwrap();
        let rules = PinRules::new();
        let selectors = PlatformSelectors::for_subdir("linux-64");
        let metadata = renderer(&recipe, &rules, &selectors)
            .render_variant(&VariantCombination::new())
            .unwrap();

        assert_eq!(metadata.outputs.len(), 2);
        let docs = &metadata.outputs[0];
        assert_eq!(docs.name, "parent-docs");
        assert_eq!(docs.version, "1.0");
        assert_eq!(docs.subdir, "noarch");
        assert_eq!(docs.build_number, 3);
        assert_eq!(docs.build_string, "3");
        assert_eq!(metadata.outputs[1].version, "2.0");
        assert_eq!(metadata.outputs[1].subdir, "linux-64");
        assert_eq!(metadata.leaves().len(), 2);
    }

    #[test]
    fn test_derive_build_string() {
        let combo = VariantCombination::new()
            .with("python", "3.10")
            .with("numpy", "1.26");
        assert_eq!(derive_build_string(&combo, Noarch::None, 0).unwrap(), "np126py310_0");

        assert_eq!(
            derive_build_string(&VariantCombination::new(), Noarch::None, 2).unwrap(),
            "2"
        );

        let hashed = derive_build_string(&combo.clone().with("zlib", "1.3"), Noarch::None, 0)
            .unwrap();
        assert!(hashed.starts_with("np126py310h"));
        assert_eq!(hashed.len(), "np126py310h".len() + HASH_LENGTH + 2);

        // Deterministic
        assert_eq!(
            hashed,
            derive_build_string(&combo.with("zlib", "1.3"), Noarch::None, 0).unwrap()
        );
    }

    #[test]
    fn test_expand_variants_ignores_unused_dimensions() {
        let recipe = parse_recipe(RECIPE).unwrap();
        let table = VariantTable::new()
            .with_dimension("python", ["3.10", "3.11"])
            .with_dimension("unused", ["a", "b", "c"]);
        let selectors = PlatformSelectors::for_subdir("linux-64");

        let combos = expand_variants(&recipe, &table, &selectors).unwrap();
        assert_eq!(combos.len(), 2);
        assert!(combos.iter().all(|c| !c.contains("unused")));
    }
}
