// src/commands/locate.rs

//! Locate command - find a built package in the local caches

use super::{apply_locations, load_config};
use anyhow::{Context, Result};
use larder::{ArtifactLocator, LocatedArtifact, PackageIdentity};
use std::path::{Path, PathBuf};

/// Search the caches for a distribution and print where it was found
///
/// Not finding the package is reported but is not a failure.
pub fn cmd_locate(
    distribution: &str,
    files_only: bool,
    subdir: Option<String>,
    croot: Option<PathBuf>,
    pkgs_dirs: Vec<PathBuf>,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = apply_locations(load_config(config_path)?, croot, subdir, pkgs_dirs);
    let identity = PackageIdentity::new(distribution, config.host_subdir.clone());

    let found = ArtifactLocator::locate(&config, &identity, files_only)
        .with_context(|| format!("Failed to search for {}", distribution))?;

    match found {
        Some(LocatedArtifact::Directory(path)) => println!("{} (directory)", path.display()),
        Some(LocatedArtifact::Archive(path)) => println!("{}", path.display()),
        None => println!("{} not found", distribution),
    }

    Ok(())
}
