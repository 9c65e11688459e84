// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: build root
fn croot_arg() -> Arg {
    Arg::new("croot")
        .long("croot")
        .value_name("DIR")
        .help("Build root")
}

/// Common argument: target platform subdir
fn subdir_arg() -> Arg {
    Arg::new("subdir")
        .short('s')
        .long("subdir")
        .value_name("SUBDIR")
        .help("Target platform subdir (e.g. linux-64)")
}

/// Common argument: extra package caches
fn pkgs_dir_arg() -> Arg {
    Arg::new("pkgs_dirs")
        .long("pkgs-dir")
        .value_name("DIR")
        .action(ArgAction::Append)
        .help("Extra package cache (repeatable)")
}

/// Common argument: configuration file
fn config_arg() -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .value_name("FILE")
        .help("Configuration file")
}

fn build_cli() -> Command {
    Command::new("larder")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Larder Contributors")
        .about("Render package recipes across build variants")
        .subcommand_required(true)
        .subcommand(
            Command::new("render")
                .about("Render a recipe into one package per variant")
                .arg(
                    Arg::new("recipe")
                        .required(true)
                        .help("Recipe directory, recipe.toml, or recipe archive"),
                )
                .arg(config_arg())
                .arg(
                    Arg::new("variants")
                        .short('m')
                        .long("variants")
                        .value_name("FILE")
                        .action(ArgAction::Append)
                        .help("Extra variant file, layered in order (repeatable)"),
                )
                .arg(croot_arg())
                .arg(subdir_arg())
                .arg(pkgs_dir_arg())
                .arg(
                    Arg::new("resolved")
                        .long("resolved")
                        .value_name("NAME=VERSION[ BUILD]")
                        .action(ArgAction::Append)
                        .help("Resolved package (repeatable)"),
                )
                .arg(
                    Arg::new("output_paths")
                        .long("output-paths")
                        .action(ArgAction::SetTrue)
                        .help("Print only the paths packages will be written to"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print rendered metadata as JSON"),
                ),
        )
        .subcommand(
            Command::new("locate")
                .about("Find a built package in the local caches")
                .arg(
                    Arg::new("distribution")
                        .required(true)
                        .help("Distribution name (name-version-build, no extension)"),
                )
                .arg(
                    Arg::new("files_only")
                        .long("files-only")
                        .action(ArgAction::SetTrue)
                        .help("Only accept package archives, not unpacked directories"),
                )
                .arg(subdir_arg())
                .arg(croot_arg())
                .arg(pkgs_dir_arg())
                .arg(config_arg()),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory - use CARGO_MANIFEST_DIR which is always set by cargo
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("larder.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
