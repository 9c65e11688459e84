// src/output.rs

//! Where built packages land
//!
//! A package is written to `<croot>/<subdir>/<name>-<version>-<build><ext>`,
//! with `subdir` being `noarch` for platform-independent packages.

use crate::platform::NOARCH_SUBDIR;
use crate::recipe::RenderedMetadata;
use std::path::PathBuf;

/// File name of a built package, extension included
pub fn package_file_name(metadata: &RenderedMetadata) -> String {
    format!(
        "{}{}",
        metadata.dist_name(),
        metadata.config.package_extension
    )
}

/// Subdir a built package is filed under
///
/// Follows the package's `noarch` setting, not the stored `subdir`, so a
/// noarch package always lands in `noarch/`.
pub fn output_subdir(metadata: &RenderedMetadata) -> &str {
    if metadata.is_noarch() {
        NOARCH_SUBDIR
    } else {
        &metadata.config.host_subdir
    }
}

/// Output path of every package a rendered recipe produces
///
/// Paths follow the order of the recipe's outputs; a recipe without
/// outputs yields its own path.
pub fn get_output_file_paths(metadata: &RenderedMetadata) -> Vec<PathBuf> {
    metadata
        .leaves()
        .into_iter()
        .map(|leaf| {
            leaf.config
                .croot
                .join(output_subdir(leaf))
                .join(package_file_name(leaf))
        })
        .collect()
}
