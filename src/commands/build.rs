//! Build command implementation
//!
//! Runs the complete build of an MTA project:
//! 1. Apply the extension descriptors to `mta.yaml`
//! 2. Order the modules by their build-time dependencies
//! 3. Copy requirements, build and pack every module
//! 4. Assemble the `.mtar` archive

use anyhow::{bail, Context, Result};
use clap::Args;
use std::path::PathBuf;

use mtar_build::builders::BuilderTable;
use mtar_build::defaults;
use mtar_build::filesystem::CopyStrategy;
use mtar_build::location::Location;
use mtar_build::phases::orchestrator;
use mtar_build::phases::{BuildOptions, FailurePolicy};

/// Arguments for the build command
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Project directory containing mta.yaml
    #[arg(short, long, value_name = "DIR", env = "MTAR_BUILD_SOURCE", default_value = ".")]
    pub source: PathBuf,

    /// Directory receiving the archive (defaults to <SOURCE>/mta_archives)
    #[arg(short, long, value_name = "DIR", env = "MTAR_BUILD_TARGET")]
    pub target: Option<PathBuf>,

    /// Extension descriptors (.mtaext) to apply, in any order
    #[arg(short, long = "extensions", value_name = "FILE", value_delimiter = ',')]
    pub extensions: Vec<PathBuf>,

    /// Target deployment platform (cf, neo, xsa)
    #[arg(short, long, value_name = "PLATFORM", default_value = defaults::DEFAULT_PLATFORM)]
    pub platform: String,

    /// Build only these modules
    #[arg(short, long, value_name = "NAME", value_delimiter = ',')]
    pub modules: Vec<String>,

    /// With --modules, also build the modules they depend on
    #[arg(long, requires = "modules")]
    pub with_dependencies: bool,

    /// Copy whole build results on a bounded worker pool
    #[arg(long)]
    pub parallel_copy: bool,

    /// Keep building independent modules after a module fails
    #[arg(short, long)]
    pub keep_going: bool,

    /// Leave the temporary staging directory in place
    #[arg(long)]
    pub keep_temp: bool,

    /// Builder table replacing the built-in one
    #[arg(long, value_name = "FILE", env = "MTAR_BUILD_BUILDERS")]
    pub builders: Option<PathBuf>,
}

impl BuildArgs {
    fn options(&self) -> BuildOptions {
        BuildOptions {
            platform: self.platform.clone(),
            modules: (!self.modules.is_empty()).then(|| self.modules.clone()),
            with_dependencies: self.with_dependencies,
            copy_strategy: if self.parallel_copy {
                CopyStrategy::Parallel
            } else {
                CopyStrategy::Sequential
            },
            failure_policy: if self.keep_going {
                FailurePolicy::Continue
            } else {
                FailurePolicy::FailFast
            },
            keep_temp: self.keep_temp,
        }
    }
}

/// Execute the build command
pub fn execute(args: BuildArgs) -> Result<()> {
    let location = Location::new(&args.source, args.target.clone())
        .with_extensions(args.extensions.clone());

    if !location.descriptor_file().exists() {
        bail!(
            "Project descriptor not found: {}",
            location.descriptor_file().display()
        );
    }

    let builders = match &args.builders {
        Some(path) => BuilderTable::from_file(path)
            .with_context(|| format!("Failed to load builders from {}", path.display()))?,
        None => BuilderTable::builtin()?,
    };

    let report = orchestrator::execute_build(&location, &builders, args.options())?;

    let failures = report.failures();
    if !failures.is_empty() {
        for failure in &failures {
            eprintln!(
                "{}: {}",
                failure.name,
                failure.error.as_deref().unwrap_or("failed")
            );
        }
        bail!("{} module(s) failed to build", failures.len());
    }

    if let Some(archive) = &report.archive {
        println!("{}", archive.display());
    }
    Ok(())
}
