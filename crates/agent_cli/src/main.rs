//! CLI entry point for observed agent invocations.

mod cli;
mod commands;
mod output;

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::cli::Cli;

/// Nearest `.env`, searching the working directory and up to 32 parents.
fn find_env_file(start: &Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    for _ in 0..32 {
        let env_file = dir.join(".env");
        if env_file.exists() {
            return Some(env_file);
        }
        dir = dir.parent()?.to_path_buf();
    }
    None
}

/// Environment is the only configuration source; the project `.env` fills
/// in whatever the shell did not set.
fn load_env() {
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(env_file) = find_env_file(&cwd) {
            let _ = dotenvy::from_path(&env_file);
        }
    }
}

#[tokio::main]
async fn main() {
    load_env();
    let cli = Cli::parse();
    output::init(cli.output, cli.verbose);

    if let Err(e) = commands::handle(cli).await {
        output::error(&format!("{e:#}"));
        std::process::exit(1);
    }
}
