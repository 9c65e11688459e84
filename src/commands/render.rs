// src/commands/render.rs

//! Render command - expand a recipe into per-variant packages

use super::{apply_locations, load_config};
use anyhow::{Context, Result, anyhow};
use larder::{RenderedMetadata, get_output_file_paths, render_recipe};
use std::path::{Path, PathBuf};
use tracing::info;

/// Render a recipe for every variant and print the result
#[allow(clippy::too_many_arguments)]
pub fn cmd_render(
    recipe: &Path,
    config_path: Option<&Path>,
    variant_files: Vec<PathBuf>,
    croot: Option<PathBuf>,
    subdir: Option<String>,
    pkgs_dirs: Vec<PathBuf>,
    resolved: &[String],
    output_paths: bool,
    json: bool,
) -> Result<()> {
    let mut config = apply_locations(load_config(config_path)?, croot, subdir, pkgs_dirs);
    for file in variant_files {
        config = config.with_variant_file(file);
    }
    for entry in resolved {
        let (name, version_build) = entry.split_once('=').ok_or_else(|| {
            anyhow!("Invalid --resolved '{}': expected NAME=VERSION[ BUILD]", entry)
        })?;
        config = config.with_resolved(name.trim(), version_build.trim());
    }
    config
        .validate()
        .context("Invalid render configuration")?;

    let rendered = match render_recipe(recipe, &config) {
        Ok(rendered) => rendered,
        // Acquisition failures are reported verbatim
        Err(e) if e.is_recipe_acquisition() => return Err(e.into()),
        Err(e) => {
            return Err(anyhow::Error::new(e)
                .context(format!("Failed to render recipe: {}", recipe.display())));
        }
    };
    info!("Rendered {} variant(s)", rendered.len());

    if json {
        let out = serde_json::to_string_pretty(&rendered).context("Failed to encode metadata")?;
        println!("{}", out);
    } else if output_paths {
        for metadata in &rendered {
            for path in get_output_file_paths(metadata) {
                println!("{}", path.display());
            }
        }
    } else {
        for metadata in &rendered {
            print_metadata(metadata, 0);
        }
        println!("{} variant(s) for {}", rendered.len(), config.host_subdir);
    }

    Ok(())
}

fn print_metadata(metadata: &RenderedMetadata, depth: usize) {
    let indent = "  ".repeat(depth);
    println!("{}{} [{}]", indent, metadata.dist_name(), metadata.subdir);
    if depth == 0 && !metadata.variant.is_empty() {
        println!("{}  variant: {}", indent, metadata.variant);
    }

    let sections = [
        ("build", &metadata.requirements.build),
        ("host", &metadata.requirements.host),
        ("run", &metadata.requirements.run),
        ("run_constrained", &metadata.requirements.run_constrained),
    ];
    for (label, specs) in sections {
        if specs.is_empty() {
            continue;
        }
        let specs: Vec<String> = specs.iter().map(ToString::to_string).collect();
        println!("{}  {}: {}", indent, label, specs.join(", "));
    }

    for output in &metadata.outputs {
        print_metadata(output, depth + 1);
    }
}
