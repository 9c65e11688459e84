// src/main.rs

//! larder command-line entry point

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Render {
            recipe,
            config,
            variants,
            croot,
            subdir,
            pkgs_dirs,
            resolved,
            output_paths,
            json,
        } => commands::cmd_render(
            &recipe,
            config.as_deref(),
            variants,
            croot,
            subdir,
            pkgs_dirs,
            &resolved,
            output_paths,
            json,
        ),
        Commands::Locate {
            distribution,
            files_only,
            subdir,
            croot,
            pkgs_dirs,
            config,
        } => commands::cmd_locate(
            &distribution,
            files_only,
            subdir,
            croot,
            pkgs_dirs,
            config.as_deref(),
        ),
    }
}
