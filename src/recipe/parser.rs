// src/recipe/parser.rs

//! Recipe file parsing

use crate::error::{Error, Result};
use crate::recipe::format::RecipeTemplate;
use crate::selector::split_selector;
use std::collections::BTreeSet;
use std::path::Path;

/// Parse a recipe from a TOML string
pub fn parse_recipe(content: &str) -> Result<RecipeTemplate> {
    toml::from_str(content).map_err(|e| Error::ParseError(format!("Invalid recipe: {}", e)))
}

/// Parse a recipe from a file
pub fn parse_recipe_file(path: &Path) -> Result<RecipeTemplate> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::IoError(format!("Failed to read recipe file: {}", e)))?;

    parse_recipe(&content)
}

/// Validate a recipe for completeness and correctness
pub fn validate_recipe(recipe: &RecipeTemplate) -> Result<Vec<String>> {
    let mut warnings = Vec::new();

    if recipe.package.name.is_empty() {
        return Err(Error::ParseError("Recipe package name cannot be empty".to_string()));
    }
    if recipe.package.version.is_empty() {
        return Err(Error::ParseError("Recipe package version cannot be empty".to_string()));
    }

    let mut names = BTreeSet::from([recipe.package.name.as_str()]);
    for output in &recipe.outputs {
        if output.name.is_empty() {
            return Err(Error::ParseError("Output name cannot be empty".to_string()));
        }
        if !names.insert(output.name.as_str()) {
            return Err(Error::ParseError(format!(
                "Output name '{}' is used more than once",
                output.name
            )));
        }
    }

    if recipe.build.noarch.is_some() && recipe.build.noarch_python {
        warnings.push("Both noarch and noarch_python are set; noarch wins".to_string());
    }

    // Empty selectors are almost always a typo
    let sections = std::iter::once(&recipe.requirements)
        .chain(recipe.outputs.iter().map(|o| &o.requirements));
    for line in sections.flat_map(|r| r.lines()) {
        match split_selector(line) {
            ("", _) => warnings.push("Empty requirement line".to_string()),
            (_, Some("")) => warnings.push(format!("Empty selector on '{}'", line)),
            _ => {}
        }
    }

    Ok(warnings)
}
