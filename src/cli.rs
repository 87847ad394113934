//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// mtar-build - Build multi-module archives from mta.yaml projects
#[derive(Parser, Debug)]
#[command(name = "mtar-build")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Set log level (error, warn, info, debug, trace)
    ///
    /// `RUST_LOG`, when set, takes precedence.
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the project and package it into an .mtar archive
    Build(commands::build::BuildArgs),

    /// Print the module build order
    Modules(commands::modules::ModulesArgs),

    /// Zip a file or directory, honoring ignore patterns and symbolic links
    Archive(commands::archive::ArchiveArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);

        match self.command {
            Commands::Build(args) => commands::build::execute(args),
            Commands::Modules(args) => commands::modules::execute(args),
            Commands::Archive(args) => commands::archive::execute(args),
        }
    }
}

fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    // A logger may already be installed when running inside tests.
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}
