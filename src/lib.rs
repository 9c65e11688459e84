// src/lib.rs

//! larder: recipe rendering and build-variant resolution
//!
//! Takes a recipe template and a table of build variants and produces one
//! fully resolved package description per variant, with dependency pins
//! derived and duplicates collapsed. Also finds already-built packages in
//! local caches and works out where new ones will be written.
//!
//! # Architecture
//!
//! - `spec`: requirement specs, pin rules and duplicate collapsing
//! - `variant`: variant tables and their expansion into combinations
//! - `selector`: `# [expr]` line selectors
//! - `recipe`: recipe templates, scoped recipe sources and rendering
//! - `locate`: search of cache roots for built packages
//! - `output`: output paths of rendered packages

pub mod config;
mod error;
pub mod locate;
pub mod output;
pub mod platform;
pub mod recipe;
pub mod selector;
pub mod spec;
pub mod variant;

pub use config::RenderConfig;
pub use error::{Error, Result};
pub use locate::{
    ArtifactLocator, CacheRoot, IndexJson, LocatedArtifact, PackageIdentity,
    find_pkg_dir_or_file_in_pkgs_dirs,
};
pub use output::get_output_file_paths;
pub use platform::Platform;
pub use recipe::{RecipeSource, RenderedMetadata, open_recipe, render_recipe, with_recipe};
pub use selector::{PlatformSelectors, SelectorEvaluator};
pub use spec::{
    PinPrecision, PinRule, RequirementSpec, Requirements, ResolvedPackage, get_pin_from_build,
    simplify_to_exact_constraints,
};
pub use variant::{VariantCombination, VariantExpander, VariantTable};
