// src/config.rs

//! Render configuration
//!
//! Settings are read from an optional TOML file and then adjusted by the
//! caller. A render call clones the configuration into an `Arc` snapshot
//! that every rendered package shares read-only.
//!
//! ```toml
//! croot = "/var/cache/larder/bld"
//! host_subdir = "linux-64"
//! pkgs_dirs = ["/opt/conda/pkgs"]
//! variant_files = ["/etc/larder/variants.toml"]
//!
//! [resolved]
//! openssl = "3.0.13 h1234_0"
//! ```

use crate::error::{Error, Result};
use crate::locate::CacheRoot;
use crate::platform::{NOARCH_SUBDIR, Platform};
use crate::spec::ResolvedPackage;
use crate::variant::VariantTable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default extension for built packages
pub const DEFAULT_PACKAGE_EXTENSION: &str = ".tar.bz2";

/// Settings shared by every package a render call produces
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Build root; built packages land in `<croot>/<subdir>/`
    pub croot: PathBuf,
    /// Platform packages are built for
    pub host_subdir: String,
    /// Platform build tools run on
    pub build_subdir: String,
    /// Extra package caches searched after the build root
    pub pkgs_dirs: Vec<PathBuf>,
    /// Extension of built packages
    pub package_extension: String,
    /// Variant tables layered over the recipe's own
    pub variant_files: Vec<PathBuf>,
    /// Exact `"version build"` of packages already resolved, by name
    pub resolved: BTreeMap<String, String>,
    /// Variant overrides applied last
    #[serde(skip)]
    pub variants: VariantTable,
}

impl Default for RenderConfig {
    fn default() -> Self {
        let platform = Platform::detect();
        Self {
            croot: default_croot(),
            host_subdir: platform.subdir().to_string(),
            build_subdir: platform.subdir().to_string(),
            pkgs_dirs: Vec::new(),
            package_extension: DEFAULT_PACKAGE_EXTENSION.to_string(),
            variant_files: Vec::new(),
            resolved: BTreeMap::new(),
            variants: VariantTable::new(),
        }
    }
}

fn default_croot() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("larder")
        .join("bld")
}

impl RenderConfig {
    /// Configuration for the running platform
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::IoError(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::ParseError(format!("Invalid config {}: {}", path.display(), e)))?;
        config.validate()?;
        debug!("Loaded render config from {}", path.display());
        Ok(config)
    }

    /// Set the build root
    pub fn with_croot(mut self, croot: impl Into<PathBuf>) -> Self {
        self.croot = croot.into();
        self
    }

    /// Set the host (target) platform
    pub fn with_host_subdir(mut self, subdir: impl Into<String>) -> Self {
        self.host_subdir = subdir.into();
        self
    }

    /// Set the build platform
    pub fn with_build_subdir(mut self, subdir: impl Into<String>) -> Self {
        self.build_subdir = subdir.into();
        self
    }

    /// Add a package cache to search
    pub fn with_pkgs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.pkgs_dirs.push(dir.into());
        self
    }

    /// Set the built package extension
    pub fn with_package_extension(mut self, extension: impl Into<String>) -> Self {
        self.package_extension = extension.into();
        self
    }

    /// Add a variant file
    pub fn with_variant_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.variant_files.push(path.into());
        self
    }

    /// Record the exact version (and build) a package resolved to
    pub fn with_resolved(
        mut self,
        name: impl Into<String>,
        version_build: impl Into<String>,
    ) -> Self {
        self.resolved.insert(name.into(), version_build.into());
        self
    }

    /// Set programmatic variant overrides
    pub fn with_variants(mut self, variants: VariantTable) -> Self {
        self.variants = variants;
        self
    }

    /// Check settings that would otherwise fail later and less clearly
    pub fn validate(&self) -> Result<()> {
        if !self.package_extension.starts_with('.') {
            return Err(Error::ParseError(format!(
                "package_extension must start with '.': {}",
                self.package_extension
            )));
        }
        if self.host_subdir.is_empty() || self.build_subdir.is_empty() {
            return Err(Error::ParseError("subdirs cannot be empty".to_string()));
        }
        self.resolved_packages().map(|_| ())
    }

    /// Target platform
    pub fn host_platform(&self) -> Platform {
        Platform::from_subdir(&self.host_subdir)
    }

    /// Parsed form of [`RenderConfig::resolved`]
    pub fn resolved_packages(&self) -> Result<BTreeMap<String, ResolvedPackage>> {
        self.resolved
            .iter()
            .map(|(name, value)| Ok((name.clone(), ResolvedPackage::parse(value)?)))
            .collect()
    }

    /// Cache roots in search order for a preferred subdir
    ///
    /// The build root's subdir comes first, then its `noarch` subdir, then
    /// every configured package cache. A root is listed once.
    pub fn cache_roots(&self, preferred_subdir: &str) -> Vec<CacheRoot> {
        let mut roots = vec![CacheRoot::for_subdir(
            self.croot.join(preferred_subdir),
            preferred_subdir,
        )];
        if preferred_subdir != NOARCH_SUBDIR {
            roots.push(CacheRoot::for_subdir(
                self.croot.join(NOARCH_SUBDIR),
                NOARCH_SUBDIR,
            ));
        }
        roots.extend(self.pkgs_dirs.iter().map(|dir| CacheRoot::new(dir.clone())));

        let mut seen = Vec::new();
        roots.retain(|root| {
            if seen.contains(&root.path) {
                false
            } else {
                seen.push(root.path.clone());
                true
            }
        });
        roots
    }

    /// Build the effective variant table
    ///
    /// Layers, in order: the recipe's table, each variant file, then the
    /// programmatic overrides.
    pub fn load_variants(&self, recipe_variants: Option<VariantTable>) -> Result<VariantTable> {
        let mut table = recipe_variants.unwrap_or_default();
        for path in &self.variant_files {
            table.merge(&VariantTable::from_file(path)?);
        }
        table.merge(&self.variants);
        table.validate()?;
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_from_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("larder.toml");
        fs::write(
            &path,
            concat!(
                "croot = \"/tmp/bld\"\n",
                "host_subdir = \"osx-arm64\"\n\n",
                "[resolved]\n",
                "zlib = \"1.3 h0_0\"\n",
            ),
        )
        .unwrap();

        let config = RenderConfig::from_file(&path).unwrap();
        assert_eq!(config.croot, PathBuf::from("/tmp/bld"));
        assert_eq!(config.host_subdir, "osx-arm64");
        assert_eq!(config.package_extension, DEFAULT_PACKAGE_EXTENSION);
        assert_eq!(
            config.resolved_packages().unwrap()["zlib"],
            ResolvedPackage::new("1.3", Some("h0_0".to_string()))
        );
    }

    #[test]
    fn test_from_file_rejects_bad_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("larder.toml");
        fs::write(&path, "package_extension = \"conda\"\n").unwrap();
        assert!(RenderConfig::from_file(&path).is_err());
    }

    #[test]
    fn test_cache_roots_order() {
        let config = RenderConfig::new()
            .with_croot("/bld")
            .with_pkgs_dir("/pkgs")
            .with_pkgs_dir("/bld/linux-64");

        let roots = config.cache_roots("linux-64");
        let paths: Vec<_> = roots.iter().map(|r| r.path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/bld/linux-64"),
                PathBuf::from("/bld/noarch"),
                PathBuf::from("/pkgs"),
            ]
        );
        assert_eq!(roots[0].subdir.as_deref(), Some("linux-64"));
        assert_eq!(roots[2].subdir, None);

        assert_eq!(config.cache_roots("noarch").len(), 2);
    }

    #[test]
    fn test_load_variants_layers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("extra.toml");
        fs::write(&path, "python = [\"3.12\"]\nzlib = [\"1.3\"]\n").unwrap();

        let recipe = VariantTable::new()
            .with_dimension("python", ["3.10", "3.11"])
            .with_dimension("openssl", ["3"]);
        let config = RenderConfig::new()
            .with_variant_file(&path)
            .with_variants(VariantTable::new().with_dimension("zlib", ["1.2"]));

        let table = config.load_variants(Some(recipe)).unwrap();
        assert_eq!(table.dimension("python").unwrap().values, vec!["3.12"]);
        assert_eq!(table.dimension("zlib").unwrap().values, vec!["1.2"]);
        assert_eq!(table.dimension("openssl").unwrap().values, vec!["3"]);
    }
}
