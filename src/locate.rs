// src/locate.rs

//! Finding built packages in local caches
//!
//! A built package sits in a cache root either unpacked, as a directory
//! named after its distribution with an `info/index.json` inside, or as an
//! archive `<distribution>.tar.bz2` / `<distribution>.conda`. Roots are
//! searched in order and the first valid match wins; finding nothing is a
//! normal outcome, not an error.

use crate::config::RenderConfig;
use crate::error::{Error, Result};
use crate::recipe::RenderedMetadata;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Archive extensions searched, in preference order
pub const ARCHIVE_EXTENSIONS: &[&str] = &[".tar.bz2", ".conda"];

/// Metadata sidecar of an unpacked package, relative to its directory
pub const INDEX_JSON: &str = "info/index.json";

/// Logical key of a built package
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageIdentity {
    /// `name-version-build`, without extension
    pub distribution_name: String,
    /// Preferred platform subdir
    pub subdir: String,
}

impl PackageIdentity {
    pub fn new(distribution_name: impl Into<String>, subdir: impl Into<String>) -> Self {
        Self {
            distribution_name: distribution_name.into(),
            subdir: subdir.into(),
        }
    }
}

/// One directory searched for packages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRoot {
    pub path: PathBuf,
    /// Subdir every unpacked package here must record; `None` skips the check
    pub subdir: Option<String>,
}

impl CacheRoot {
    /// A root that holds packages of any subdir
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            subdir: None,
        }
    }

    /// A root dedicated to one subdir
    pub fn for_subdir(path: impl Into<PathBuf>, subdir: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            subdir: Some(subdir.into()),
        }
    }
}

/// The on-disk form a package was found in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocatedArtifact {
    Directory(PathBuf),
    Archive(PathBuf),
}

impl LocatedArtifact {
    pub fn path(&self) -> &Path {
        match self {
            LocatedArtifact::Directory(path) | LocatedArtifact::Archive(path) => path,
        }
    }

    pub fn into_path(self) -> PathBuf {
        match self {
            LocatedArtifact::Directory(path) | LocatedArtifact::Archive(path) => path,
        }
    }
}

/// The fields of `info/index.json` the locator reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexJson {
    pub subdir: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub build: Option<String>,
}

impl IndexJson {
    /// Read the sidecar of an unpacked package
    pub fn from_package_dir(dir: &Path) -> Result<Self> {
        let path = dir.join(INDEX_JSON);
        let content = std::fs::read_to_string(&path).map_err(|e| Error::MalformedIndex {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| Error::MalformedIndex {
            path,
            reason: e.to_string(),
        })
    }
}

/// Searches an ordered list of cache roots
#[derive(Debug, Clone)]
pub struct ArtifactLocator {
    roots: Vec<CacheRoot>,
}

impl ArtifactLocator {
    pub fn new(roots: Vec<CacheRoot>) -> Self {
        Self { roots }
    }

    /// Locator over the configured roots, preferred subdir first
    pub fn from_config(config: &RenderConfig, preferred_subdir: &str) -> Self {
        Self::new(config.cache_roots(preferred_subdir))
    }

    pub fn roots(&self) -> &[CacheRoot] {
        &self.roots
    }

    /// Find a package by distribution name
    ///
    /// Within each root an unpacked directory is preferred over an archive,
    /// unless `files_only` is set, in which case directories are never
    /// returned. A directory recording a different subdir than its root is
    /// not a match. Only an unreadable or unparseable `index.json` is an
    /// error.
    pub fn find(
        &self,
        distribution_name: &str,
        files_only: bool,
    ) -> Result<Option<LocatedArtifact>> {
        for root in &self.roots {
            if !root.path.is_dir() {
                debug!("Skipping missing cache root {}", root.path.display());
                continue;
            }
            if let Some(found) = search_root(root, distribution_name, files_only)? {
                debug!("Found {} at {}", distribution_name, found.path().display());
                return Ok(Some(found));
            }
        }
        debug!("{} not found in {} cache root(s)", distribution_name, self.roots.len());
        Ok(None)
    }

    /// Find a package by identity, searching its subdir's roots first
    pub fn locate(
        config: &RenderConfig,
        identity: &PackageIdentity,
        files_only: bool,
    ) -> Result<Option<LocatedArtifact>> {
        Self::from_config(config, &identity.subdir).find(&identity.distribution_name, files_only)
    }
}

fn search_root(
    root: &CacheRoot,
    distribution_name: &str,
    files_only: bool,
) -> Result<Option<LocatedArtifact>> {
    if !files_only {
        let dir = root.path.join(distribution_name);
        if dir.is_dir() && dir.join(INDEX_JSON).is_file() {
            let index = IndexJson::from_package_dir(&dir)?;
            match &root.subdir {
                Some(expected) if *expected != index.subdir => {
                    debug!(
                        "Ignoring {}: records subdir {} but sits in a {} root",
                        dir.display(),
                        index.subdir,
                        expected
                    );
                }
                _ => return Ok(Some(LocatedArtifact::Directory(dir))),
            }
        }
    }

    for ext in ARCHIVE_EXTENSIONS {
        let file = root.path.join(format!("{}{}", distribution_name, ext));
        if file.is_file() {
            return Ok(Some(LocatedArtifact::Archive(file)));
        }
    }

    Ok(None)
}

/// Find a built package for a rendered recipe's host platform
///
/// Searches the build root's host subdir, its `noarch` subdir, then the
/// configured package caches. Returns the package directory or archive
/// path, or `None` when no root has it.
pub fn find_pkg_dir_or_file_in_pkgs_dirs(
    distribution_name: &str,
    metadata: &RenderedMetadata,
    files_only: bool,
) -> Result<Option<PathBuf>> {
    let identity = PackageIdentity::new(distribution_name, metadata.config.host_subdir.clone());
    let found = ArtifactLocator::locate(&metadata.config, &identity, files_only)?;
    Ok(found.map(LocatedArtifact::into_path))
}
