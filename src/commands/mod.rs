// src/commands/mod.rs
//! Command handlers for the larder CLI

mod locate;
mod render;

pub use locate::cmd_locate;
pub use render::cmd_render;

use anyhow::{Context, Result};
use larder::RenderConfig;
use std::path::{Path, PathBuf};

/// Load the configuration file, or defaults when none is given
fn load_config(path: Option<&Path>) -> Result<RenderConfig> {
    match path {
        Some(path) => RenderConfig::from_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display())),
        None => Ok(RenderConfig::new()),
    }
}

/// Apply the location flags shared by every command
fn apply_locations(
    mut config: RenderConfig,
    croot: Option<PathBuf>,
    subdir: Option<String>,
    pkgs_dirs: Vec<PathBuf>,
) -> RenderConfig {
    if let Some(croot) = croot {
        config = config.with_croot(croot);
    }
    if let Some(subdir) = subdir {
        config = config.with_host_subdir(subdir);
    }
    for dir in pkgs_dirs {
        config = config.with_pkgs_dir(dir);
    }
    config
}
