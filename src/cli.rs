// src/cli.rs
//! CLI definitions for larder
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "larder")]
#[command(version)]
#[command(about = "Render package recipes across build variants", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render a recipe into one package per variant
    Render {
        /// Recipe directory, recipe.toml, or recipe archive
        recipe: PathBuf,

        /// Configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Extra variant file, layered in order (repeatable)
        #[arg(short = 'm', long = "variants")]
        variants: Vec<PathBuf>,

        /// Build root
        #[arg(long)]
        croot: Option<PathBuf>,

        /// Target platform subdir (e.g. linux-64)
        #[arg(short, long)]
        subdir: Option<String>,

        /// Extra package cache (repeatable)
        #[arg(long = "pkgs-dir")]
        pkgs_dirs: Vec<PathBuf>,

        /// Resolved package as NAME=VERSION[ BUILD] (repeatable)
        #[arg(long)]
        resolved: Vec<String>,

        /// Print only the paths packages will be written to
        #[arg(long)]
        output_paths: bool,

        /// Print rendered metadata as JSON
        #[arg(long, conflicts_with = "output_paths")]
        json: bool,
    },

    /// Find a built package in the local caches
    Locate {
        /// Distribution name (name-version-build, no extension)
        distribution: String,

        /// Only accept package archives, not unpacked directories
        #[arg(long)]
        files_only: bool,

        /// Platform subdir to search first
        #[arg(short, long)]
        subdir: Option<String>,

        /// Build root
        #[arg(long)]
        croot: Option<PathBuf>,

        /// Extra package cache (repeatable)
        #[arg(long = "pkgs-dir")]
        pkgs_dirs: Vec<PathBuf>,

        /// Configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_render() {
        let cli = Cli::try_parse_from([
            "larder",
            "render",
            "recipes/fancylib",
            "--subdir",
            "osx-arm64",
            "--variants",
            "a.toml",
            "-m",
            "b.toml",
            "--resolved",
            "openssl=3.0.13 h1_0",
        ])
        .unwrap();

        match cli.command {
            Commands::Render {
                recipe,
                subdir,
                variants,
                resolved,
                ..
            } => {
                assert_eq!(recipe, PathBuf::from("recipes/fancylib"));
                assert_eq!(subdir.as_deref(), Some("osx-arm64"));
                assert_eq!(variants.len(), 2);
                assert_eq!(resolved, vec!["openssl=3.0.13 h1_0"]);
            }
            _ => panic!("expected render"),
        }
    }

    #[test]
    fn test_json_conflicts_with_output_paths() {
        let result = Cli::try_parse_from(["larder", "render", "r", "--json", "--output-paths"]);
        assert!(result.is_err());
    }
}
