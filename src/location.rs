//! Where a build reads its sources from and writes its results to.
//!
//! The orchestrator only sees three narrow capabilities so tests can swap any
//! of them for a fake:
//!
//! - [`SourceModules`]: where a module's sources live.
//! - [`TargetPaths`]: the staging directory and the final archive location.
//! - [`DescriptorSource`]: the base descriptor and the extension files.
//!
//! [`Location`] implements all three over a project directory on disk.

use crate::defaults;
use crate::descriptor::{self, Descriptor, Module};
use crate::error::Result;
use std::path::{Path, PathBuf};

/// Resolves module source directories.
pub trait SourceModules {
    /// Project root directory.
    fn source_dir(&self) -> &Path;

    /// Directory holding a module's sources (`path`, relative to the project).
    fn module_dir(&self, module: &Module) -> PathBuf {
        match module.path.as_deref() {
            Some(path) if !path.is_empty() => self.source_dir().join(path),
            _ => self.source_dir().to_path_buf(),
        }
    }
}

/// Resolves the staging and output locations of a build.
pub trait TargetPaths {
    /// Directory receiving the final archive.
    fn target_dir(&self) -> &Path;

    /// Staging directory archived into the final archive.
    fn temp_dir(&self) -> PathBuf;

    /// Staging directory of a single module's packed output.
    fn module_target_dir(&self, module: &str) -> PathBuf {
        self.temp_dir().join(module)
    }

    /// Final archive path: `<target>/<ID>_<version>.mtar`.
    fn archive_path(&self, descriptor: &Descriptor) -> PathBuf {
        let name = match descriptor.version.as_deref() {
            Some(version) if !version.is_empty() => format!("{}_{}.mtar", descriptor.id, version),
            _ => format!("{}.mtar", descriptor.id),
        };
        self.target_dir().join(name)
    }
}

/// Supplies the base descriptor and the extension files layered onto it.
pub trait DescriptorSource {
    /// Parse the base descriptor.
    fn descriptor(&self) -> Result<Descriptor>;

    /// Extension files, in the order they were given.
    fn extension_files(&self) -> &[PathBuf];
}

/// A project directory on disk
#[derive(Debug, Clone)]
pub struct Location {
    source: PathBuf,
    target: PathBuf,
    descriptor_file: PathBuf,
    extensions: Vec<PathBuf>,
}

impl Location {
    /// Location of the project in `source`; archives go to `target`, or to
    /// `<source>/mta_archives` when `None`.
    ///
    /// Relative paths are made absolute against the current directory.
    pub fn new(source: impl Into<PathBuf>, target: Option<PathBuf>) -> Self {
        let source = absolute(source.into());
        let target = target
            .map(absolute)
            .unwrap_or_else(|| defaults::default_target(&source));
        let descriptor_file = source.join(defaults::DESCRIPTOR_FILE);
        Self {
            source,
            target,
            descriptor_file,
            extensions: Vec::new(),
        }
    }

    /// Layer these extension files onto the base descriptor.
    pub fn with_extensions(mut self, extensions: Vec<PathBuf>) -> Self {
        self.extensions = extensions;
        self
    }

    /// Path of the base descriptor.
    pub fn descriptor_file(&self) -> &Path {
        &self.descriptor_file
    }
}

fn absolute(path: PathBuf) -> PathBuf {
    std::path::absolute(&path).unwrap_or(path)
}

impl SourceModules for Location {
    fn source_dir(&self) -> &Path {
        &self.source
    }
}

impl TargetPaths for Location {
    fn target_dir(&self) -> &Path {
        &self.target
    }

    fn temp_dir(&self) -> PathBuf {
        self.target.join(defaults::temp_dir_name(&self.source))
    }
}

impl DescriptorSource for Location {
    fn descriptor(&self) -> Result<Descriptor> {
        descriptor::from_file(&self.descriptor_file)
    }

    fn extension_files(&self) -> &[PathBuf] {
        &self.extensions
    }
}
