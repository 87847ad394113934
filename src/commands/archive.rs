//! Archive command implementation
//!
//! Zips a file or directory the same way module build results are packed:
//! ignore patterns are matched relative to the source and symbolic links are
//! followed, with recursive links rejected.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use mtar_build::archive;
use mtar_build::filesystem;

/// Arguments for the archive command
#[derive(Args, Debug)]
pub struct ArchiveArgs {
    /// File or directory to archive
    #[arg(value_name = "SOURCE")]
    pub source: PathBuf,

    /// Zip file to create
    #[arg(value_name = "TARGET")]
    pub target: PathBuf,

    /// Patterns of entries to leave out, relative to SOURCE
    #[arg(short, long, value_name = "PATTERN")]
    pub ignore: Vec<String>,
}

/// Execute the archive command
pub fn execute(args: ArchiveArgs) -> Result<()> {
    if let Some(parent) = args.target.parent().filter(|p| !p.as_os_str().is_empty()) {
        filesystem::create_dir_if_not_exist(parent)?;
    }
    archive::archive(&args.source, &args.target, &args.ignore)
        .with_context(|| format!("Failed to archive {}", args.source.display()))?;
    println!("{}", args.target.display());
    Ok(())
}
