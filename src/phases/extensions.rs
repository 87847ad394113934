//! Phase 1: Extension Resolution
//!
//! Extension descriptors (`*.mtaext`) overlay the base descriptor. Each one
//! `extends` either the base descriptor's ID or another extension's ID, so
//! together they form a single chain starting at the base.
//!
//! ## Process
//!
//! 1.  **Loading**: Every extension file is parsed on its own; the file path is
//!     kept for error messages.
//!
//! 2.  **Validation**: Before anything is merged, the set of extensions is
//!     checked for ID collisions (with the base or with each other), schema
//!     major-version mismatches, two extensions extending the same ID, and
//!     extensions whose `extends` target is never reached from the base.
//!
//! 3.  **Chain Walk**: Starting from the base ID, the extension extending the
//!     current ID is taken next until none is left. The walk is a loop over a
//!     map keyed by `extends`, so the input file order does not matter.
//!
//! 4.  **Merge**: Extensions are applied front to back. Module and resource
//!     overlays shallow-merge their maps into the matching base entries;
//!     extension keys win and `null` values leave the base key untouched.
//!     Overlays for unknown modules or resources are ignored.

use std::collections::HashMap;
use std::path::PathBuf;

use log::{debug, info};

use crate::descriptor::{self, schema_major, Descriptor, ExtensionDescriptor, Map};
use crate::error::{Error, Result};

/// Execute Phase 1: Load `paths` and apply them to `base` in chain order
///
/// On error `base` is left untouched.
pub fn execute(base: &mut Descriptor, paths: &[PathBuf]) -> Result<()> {
    if paths.is_empty() {
        return Ok(());
    }
    let extensions = load_extensions(paths)?;
    let ordered = resolve_chain(base, extensions)?;
    apply(base, &ordered);
    Ok(())
}

/// Parse each extension file independently
pub fn load_extensions(paths: &[PathBuf]) -> Result<Vec<ExtensionDescriptor>> {
    paths
        .iter()
        .map(|path| {
            debug!("loading the extension file {}", path.display());
            descriptor::extension_from_file(path)
        })
        .collect()
}

/// Validate `extensions` against `base` and order them along the `extends` chain
pub fn resolve_chain(
    base: &Descriptor,
    extensions: Vec<ExtensionDescriptor>,
) -> Result<Vec<ExtensionDescriptor>> {
    check_ids(base, &extensions)?;
    check_schema_versions(base, &extensions)?;

    let mut by_target: HashMap<String, ExtensionDescriptor> = HashMap::new();
    for extension in extensions {
        if let Some(existing) = by_target.get(&extension.extends) {
            return Err(Error::AmbiguousExtends {
                target: extension.extends.clone(),
                first: existing.file.clone(),
                second: extension.file,
            });
        }
        by_target.insert(extension.extends.clone(), extension);
    }

    let mut ordered = Vec::with_capacity(by_target.len());
    let mut current = base.id.clone();
    while let Some(extension) = by_target.remove(&current) {
        current = extension.id.clone();
        ordered.push(extension);
    }

    if !by_target.is_empty() {
        let mut orphans: Vec<&ExtensionDescriptor> = by_target.values().collect();
        orphans.sort_by(|a, b| a.file.cmp(&b.file));
        let details = orphans
            .iter()
            .map(|e| format!("{} extends \"{}\"", e.file, e.extends))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(Error::UnknownExtends { details });
    }

    Ok(ordered)
}

fn check_ids(base: &Descriptor, extensions: &[ExtensionDescriptor]) -> Result<()> {
    let mut seen: HashMap<&str, &str> = HashMap::new();
    for extension in extensions {
        if extension.id == base.id {
            return Err(Error::ExtensionIdMatchesBase {
                file: extension.file.clone(),
                id: extension.id.clone(),
            });
        }
        if let Some(first) = seen.insert(extension.id.as_str(), extension.file.as_str()) {
            return Err(Error::DuplicateExtensionId {
                id: extension.id.clone(),
                first: first.to_string(),
                second: extension.file.clone(),
            });
        }
    }
    Ok(())
}

fn check_schema_versions(base: &Descriptor, extensions: &[ExtensionDescriptor]) -> Result<()> {
    let Some(base_version) = base.schema_version.as_deref() else {
        return Ok(());
    };
    let base_major = schema_major(base_version)?;
    for extension in extensions {
        let Some(version) = extension.schema_version.as_deref() else {
            continue;
        };
        let major = schema_major(version).map_err(|_| Error::DescriptorParse {
            file: extension.file.clone(),
            message: format!("invalid schema version \"{}\"", version),
        })?;
        if major != base_major {
            return Err(Error::SchemaMismatch {
                file: extension.file.clone(),
                extension_version: version.to_string(),
                base_version: base_version.to_string(),
            });
        }
    }
    Ok(())
}

/// Overlay the extensions onto `base`, front to back
pub fn apply(base: &mut Descriptor, ordered: &[ExtensionDescriptor]) {
    for extension in ordered {
        info!(
            "applying the \"{}\" extension from {}",
            extension.id, extension.file
        );

        for overlay in &extension.modules {
            match base.module_mut(&overlay.name) {
                Some(module) => {
                    merge_map(&mut module.properties, overlay.properties.as_ref());
                    merge_map(&mut module.parameters, overlay.parameters.as_ref());
                    merge_map(&mut module.build_params, overlay.build_params.as_ref());
                }
                None => debug!(
                    "the \"{}\" extension refers to the unknown \"{}\" module",
                    extension.id, overlay.name
                ),
            }
        }

        for overlay in &extension.resources {
            match base.resource_mut(&overlay.name) {
                Some(resource) => {
                    merge_map(&mut resource.properties, overlay.properties.as_ref());
                    merge_map(&mut resource.parameters, overlay.parameters.as_ref());
                }
                None => debug!(
                    "the \"{}\" extension refers to the unknown \"{}\" resource",
                    extension.id, overlay.name
                ),
            }
        }

        merge_map(&mut base.parameters, extension.parameters.as_ref());
    }
}

/// Shallow merge: overlay keys win, `null` overlay values are skipped.
fn merge_map(target: &mut Map, overlay: Option<&Map>) {
    let Some(overlay) = overlay else {
        return;
    };
    for (key, value) in overlay {
        if value.is_null() {
            continue;
        }
        target.insert(key.clone(), value.clone());
    }
}
