//! Phase 3: Copying Required Artifacts
//!
//! Before a module is built, the artifacts it requires from other modules
//! (`build-parameters.requires`) are copied into its source tree, since its
//! own build may consume them.
//!
//! For each requirement the dependency's build result is located, then:
//!
//! - a build result that is a single file is copied into the target path;
//! - a requirement selecting everything copies the whole build result with
//!   the configured [`CopyStrategy`];
//! - otherwise each `artifacts` pattern is copied with
//!   [`filesystem::copy_by_patterns`].
//!
//! The target is `<module dir>/<target-path>`, or the module directory itself.

use std::path::PathBuf;

use log::info;

use crate::builders::BuilderTable;
use crate::descriptor::{Descriptor, Module};
use crate::error::{Error, Result};
use crate::filesystem::{self, CopyStrategy};
use crate::location::SourceModules;

/// Execute Phase 3: Copy the artifacts `module` requires from its dependencies
pub fn execute<L: SourceModules + ?Sized>(
    location: &L,
    descriptor: &Descriptor,
    module: &Module,
    builders: &BuilderTable,
    strategy: CopyStrategy,
) -> Result<()> {
    let module_dir = location.module_dir(module);

    for requirement in module.build_requires()? {
        let dependency =
            descriptor
                .module(&requirement.name)
                .ok_or_else(|| Error::UnresolvedReference {
                    module: module.name.clone(),
                    missing: requirement.name.clone(),
                })?;

        let source = build_result_path(location, dependency, builders)?;
        let target = match requirement.target_path.as_deref() {
            Some(path) if !path.is_empty() => module_dir.join(path),
            _ => module_dir.clone(),
        };

        info!(
            "copying the artifacts of the \"{}\" module required by the \"{}\" module into {}",
            dependency.name,
            module.name,
            target.display()
        );

        if source.is_file() {
            filesystem::create_dir_if_not_exist(&target)?;
            if let Some(name) = source.file_name() {
                filesystem::copy_file(&source, &target.join(name))?;
            }
        } else if requirement.copies_everything() {
            filesystem::copy_dir(&source, &target, true, strategy)?;
        } else {
            filesystem::copy_by_patterns(&source, &target, &requirement.artifact_patterns())?;
        }
    }
    Ok(())
}

/// Location of a module's build result
///
/// `build-result` (or the builder's default) is a path or glob relative to
/// the module directory and must match exactly one entry. Without either, the
/// module directory itself is the build result.
pub fn build_result_path<L: SourceModules + ?Sized>(
    location: &L,
    module: &Module,
    builders: &BuilderTable,
) -> Result<PathBuf> {
    let module_dir = location.module_dir(module);
    let pattern = match module.build_result()? {
        Some(pattern) => Some(pattern),
        None => builders.commands_for(module)?.build_result,
    };

    let Some(pattern) = pattern else {
        return Ok(module_dir);
    };

    let mut matches = filesystem::glob_relative(&module_dir, &pattern)?;
    match matches.len() {
        1 => Ok(matches.remove(0)),
        0 => Err(Error::Filesystem {
            path: module_dir.join(&pattern).display().to_string(),
            message: format!(
                "the build result of the \"{}\" module was not found",
                module.name
            ),
        }),
        n => Err(Error::Filesystem {
            path: module_dir.join(&pattern).display().to_string(),
            message: format!(
                "the build result of the \"{}\" module matches {} entries",
                module.name, n
            ),
        }),
    }
}
