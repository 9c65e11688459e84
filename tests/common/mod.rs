// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use bzip2::write::BzEncoder;
use bzip2::Compression;
use larder::recipe::Noarch;
use larder::{RenderConfig, RenderedMetadata, Requirements, VariantCombination};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Path of a recipe fixture under `tests/fixtures`
pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Render configuration rooted in a scratch directory
pub fn config(croot: &Path, subdir: &str) -> RenderConfig {
    RenderConfig::new()
        .with_croot(croot)
        .with_host_subdir(subdir)
        .with_build_subdir(subdir)
}

/// Pack a recipe directory into a `.tar.bz2` under `info/recipe/`
pub fn pack_recipe(recipe_dir: &Path, archive: &Path) {
    let file = File::create(archive).unwrap();
    let encoder = BzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.append_dir_all("info/recipe", recipe_dir).unwrap();
    builder.into_inner().unwrap().finish().unwrap();
}

/// Metadata carrying only a configuration, for cache lookups
pub fn metadata_with(config: RenderConfig) -> RenderedMetadata {
    let subdir = config.host_subdir.clone();
    RenderedMetadata {
        name: "consumer".to_string(),
        version: "1.0".to_string(),
        build_number: 0,
        build_string: "0".to_string(),
        noarch: Noarch::None,
        subdir,
        requirements: Requirements::default(),
        outputs: Vec::new(),
        variant: VariantCombination::new(),
        config: Arc::new(config),
    }
}

/// Unpack a fake package directory with an `info/index.json`
pub fn unpacked_package(root: &Path, dist: &str, subdir: &str) -> PathBuf {
    let dir = root.join(dist);
    std::fs::create_dir_all(dir.join("info")).unwrap();
    std::fs::write(
        dir.join("info").join("index.json"),
        format!(
            r#"{{"subdir": "{}", "name": "pkg", "version": "1.0", "build": "0"}}"#,
            subdir
        ),
    )
    .unwrap();
    dir
}
