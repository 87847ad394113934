//! Modules command implementation
//!
//! Prints the modules of a project in build order, one per line, after the
//! extension descriptors have been applied. Nothing is built.

use anyhow::{bail, Result};
use clap::Args;
use std::path::PathBuf;

use mtar_build::location::{DescriptorSource, Location};
use mtar_build::phases::{extensions, ordering};

/// Arguments for the modules command
#[derive(Args, Debug)]
pub struct ModulesArgs {
    /// Project directory containing mta.yaml
    #[arg(short, long, value_name = "DIR", env = "MTAR_BUILD_SOURCE", default_value = ".")]
    pub source: PathBuf,

    /// Extension descriptors (.mtaext) to apply, in any order
    #[arg(short, long = "extensions", value_name = "FILE", value_delimiter = ',')]
    pub extensions: Vec<PathBuf>,

    /// Only list these modules and the modules they depend on
    #[arg(short, long, value_name = "NAME", value_delimiter = ',')]
    pub modules: Vec<String>,
}

/// Compute the build order for `args`.
pub fn build_order(args: &ModulesArgs) -> Result<Vec<String>> {
    let location = Location::new(&args.source, None).with_extensions(args.extensions.clone());
    if !location.descriptor_file().exists() {
        bail!(
            "Project descriptor not found: {}",
            location.descriptor_file().display()
        );
    }

    let mut descriptor = location.descriptor()?;
    extensions::execute(&mut descriptor, location.extension_files())?;

    let order = if args.modules.is_empty() {
        ordering::execute(&descriptor)?
    } else {
        ordering::select_with_dependencies(&descriptor, &args.modules, true)?
    };
    Ok(order)
}

/// Execute the modules command
pub fn execute(args: ModulesArgs) -> Result<()> {
    for name in build_order(&args)? {
        println!("{}", name);
    }
    Ok(())
}
