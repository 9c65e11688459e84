// src/recipe/mod.rs

//! Recipe templates and rendering
//!
//! A recipe describes how to build one package (and optionally several
//! split outputs) across a space of build variants. Rendering turns it
//! into one [`RenderedMetadata`] per variant, with every requirement
//! resolved and pinned.
//!
//! # Example Recipe
//!
//! ```toml
//! [package]
//! name = "fancylib"
//! version = "2.4.1"
//!
//! [build]
//! number = 1
//! skip = "win"
//!
//! [requirements]
//! build = ["%(compiler)s_%(target_platform)s", "cmake >=3.20"]
//! host = ["python", "openssl", "libblas * *%(blas_impl)s"]
//! run = ["python", "openssl"]
//!
//! [[outputs]]
//! name = "fancylib-docs"
//! [outputs.build]
//! noarch = "generic"
//! ```

mod format;
pub mod parser;
mod render;
mod source;

pub use format::{
    BuildSection, Noarch, OutputBuildSection, OutputSection, PackageSection, RecipeTemplate,
    RequirementsSection, SkipCondition,
};
pub use parser::{parse_recipe, parse_recipe_file, validate_recipe};
pub use render::{
    RenderedMetadata, derive_build_string, expand_variants, render_recipe, render_source,
};
pub use source::{
    RECIPE_FILE, RecipeSource, VARIANT_FILE, is_recipe_archive, open_recipe, with_recipe,
};
