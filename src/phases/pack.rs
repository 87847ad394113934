//! Phase 5: Packing a Module
//!
//! Stages a module's build result under `<temp dir>/<module>/`:
//!
//! - a build result that is a file (an archive produced by the builder) is
//!   copied as is;
//! - a directory is zipped into `<build-artifact-name or "data">.zip`,
//!   leaving out the module's `ignore` patterns.
//!
//! When the target directory lives inside the directory being zipped it is
//! left out as well, so a build never archives its own output.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::info;

use crate::archive;
use crate::builders::BuilderTable;
use crate::defaults;
use crate::descriptor::Module;
use crate::error::{Error, Result};
use crate::filesystem;
use crate::location::{SourceModules, TargetPaths};

use super::requirements::build_result_path;
use super::PackedModule;

/// Execute Phase 5: Stage the build result of `module`
///
/// `staged` maps every artifact staged so far to its module; two modules
/// resolving to the same artifact is an error.
pub fn execute<L: SourceModules + TargetPaths + ?Sized>(
    location: &L,
    module: &Module,
    builders: &BuilderTable,
    staged: &mut HashMap<PathBuf, String>,
) -> Result<PackedModule> {
    let result = build_result_path(location, module, builders)?;
    let target_dir = location.module_target_dir(&module.name);
    let is_file = result.is_file();

    let file_name = if is_file {
        result
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::at_path(&result, "the build result has no file name"))?
    } else {
        let name = module
            .build_artifact_name()?
            .unwrap_or_else(|| defaults::DEFAULT_ARTIFACT_NAME.to_string());
        format!("{}.zip", name)
    };
    let artifact = target_dir.join(&file_name);

    if let Some(first) = staged.get(&artifact) {
        return Err(Error::ArtifactConflict {
            first: first.clone(),
            second: module.name.clone(),
            artifact: artifact.display().to_string(),
        });
    }

    filesystem::create_dir_if_not_exist(&target_dir)?;
    if is_file {
        info!(
            "copying the \"{}\" build result of the \"{}\" module",
            result.display(),
            module.name
        );
        filesystem::copy_file(&result, &artifact)?;
    } else {
        info!("archiving the \"{}\" module", module.name);
        let mut ignore = module.ignore_patterns()?;
        if let Some(own_output) = nested_output(location.target_dir(), &result) {
            ignore.push(own_output);
        }
        archive::archive(&result, &artifact, &ignore)?;
    }

    staged.insert(artifact.clone(), module.name.clone());
    Ok(PackedModule {
        module: module.name.clone(),
        entry: format!("{}/{}", module.name, file_name),
        artifact,
    })
}

/// The target directory relative to `dir`, if the build writes inside it.
///
/// Both sides are canonicalized so `.`, `..` and links do not hide nesting.
fn nested_output(target: &Path, dir: &Path) -> Option<String> {
    let target = target.canonicalize().ok()?;
    let dir = dir.canonicalize().ok()?;
    relative_inside(&target, &dir)
}

/// `path` relative to `dir` as a forward-slash pattern, if it lies inside it.
fn relative_inside(path: &Path, dir: &Path) -> Option<String> {
    let rel = path.strip_prefix(dir).ok()?;
    if rel.as_os_str().is_empty() {
        return None;
    }
    Some(
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
    )
}
