//! Phase 6: Assembling the Final Archive
//!
//! Copies the content named by `path` parameters of module requirements and
//! resources into the temporary directory, writes the archive metadata into
//! `<temp dir>/META-INF/` through a [`MetadataWriter`], zips the temporary
//! directory into `<target>/<ID>_<version>.mtar` and removes the temporary
//! directory unless asked to keep it.
//!
//! Manifest lines are at most 72 bytes; longer headers continue on lines
//! starting with a single space.

use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use log::{debug, info};

use crate::archive;
use crate::defaults;
use crate::descriptor::{Descriptor, Map};
use crate::error::{Error, Result};
use crate::filesystem::{self, CopyStrategy};
use crate::location::{SourceModules, TargetPaths};

use super::{EntryKind, ManifestEntry, PackedModule};

/// Parameter naming project content that is copied into the archive as is.
pub const PATH_PARAMETER: &str = "path";

/// Longest manifest line in bytes; longer headers continue on lines starting
/// with a space.
const MAX_LINE_BYTES: usize = 72;

const DIRECTORY_CONTENT_TYPE: &str = "text/directory";

/// Produces the `META-INF` content of the final archive.
pub trait MetadataWriter {
    /// Write metadata describing `entries` of `descriptor` into `meta_inf`.
    fn write(&self, descriptor: &Descriptor, entries: &[ManifestEntry], meta_inf: &Path)
        -> Result<()>;
}

/// Writes `MANIFEST.MF` and the deployment descriptor `mtad.yaml`
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestWriter;

impl ManifestWriter {
    /// Manifest text: a main section followed by one section per entry.
    pub fn manifest(entries: &[ManifestEntry]) -> String {
        let mut manifest = String::new();
        push_header(&mut manifest, "Manifest-Version", "1.0");
        push_header(&mut manifest, "Created-By", env!("CARGO_PKG_NAME"));
        for entry in entries {
            manifest.push('\n');
            push_header(&mut manifest, "Name", &entry.path);
            match &entry.kind {
                EntryKind::Module(name) => push_header(&mut manifest, "MTA-Module", name),
                EntryKind::Requires(name) => push_header(&mut manifest, "MTA-Requires", name),
                EntryKind::Resource(name) => push_header(&mut manifest, "MTA-Resource", name),
            }
            push_header(&mut manifest, "Content-Type", &entry.content_type);
        }
        manifest
    }
}

impl MetadataWriter for ManifestWriter {
    fn write(
        &self,
        descriptor: &Descriptor,
        entries: &[ManifestEntry],
        meta_inf: &Path,
    ) -> Result<()> {
        filesystem::create_dir_if_not_exist(meta_inf)?;

        let manifest_path = meta_inf.join(defaults::MANIFEST_FILE);
        fs::write(&manifest_path, Self::manifest(entries))
            .map_err(|e| Error::at_path(&manifest_path, e))?;

        let mtad_path = meta_inf.join(defaults::DEPLOYMENT_DESCRIPTOR_FILE);
        let mtad = serde_yaml::to_string(descriptor)?;
        fs::write(&mtad_path, mtad).map_err(|e| Error::at_path(&mtad_path, e))?;
        debug!("metadata written to {}", meta_inf.display());
        Ok(())
    }
}

/// Append `name: value`, wrapped at [`MAX_LINE_BYTES`] without splitting a
/// character.
fn push_header(out: &mut String, name: &str, value: &str) {
    let header = format!("{}: {}", name, value);
    let mut rest = header.as_str();
    let mut width = MAX_LINE_BYTES;
    while rest.len() > width {
        let mut cut = width;
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        out.push_str(&rest[..cut]);
        out.push_str("\n ");
        rest = &rest[cut..];
        // The leading space counts towards the line.
        width = MAX_LINE_BYTES - 1;
    }
    out.push_str(rest);
    out.push('\n');
}

/// Content type of a staged entry; directories are `text/directory`.
pub fn content_type(path: &Path) -> Result<String> {
    let metadata = fs::metadata(path).map_err(|e| Error::at_path(path, e))?;
    if metadata.is_dir() {
        return Ok(DIRECTORY_CONTENT_TYPE.to_string());
    }
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let content_type = match extension.as_deref() {
        Some("zip") | Some("jar") | Some("war") | Some("mtar") => "application/zip",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("yaml") | Some("yml") => "text/yaml",
        Some("txt") => "text/plain",
        Some("html") | Some("htm") => "text/html",
        _ => "application/octet-stream",
    };
    Ok(content_type.to_string())
}

/// Manifest entry of a packed module.
pub fn module_entry(packed: &PackedModule) -> Result<ManifestEntry> {
    Ok(ManifestEntry {
        path: packed.entry.clone(),
        kind: EntryKind::Module(packed.module.clone()),
        content_type: content_type(&packed.artifact)?,
    })
}

/// Copy the content named by `requires[].parameters.path` of the given modules
/// and by `resources[].parameters.path` into the temporary directory.
///
/// The content keeps its project-relative path inside the archive. A path
/// shared by several entries is copied once but listed for each of them.
/// Returns the manifest entries of the copied content, requirements first.
pub fn stage_content<L>(
    location: &L,
    descriptor: &Descriptor,
    modules: &[String],
    strategy: CopyStrategy,
) -> Result<Vec<ManifestEntry>>
where
    L: SourceModules + TargetPaths + ?Sized,
{
    let mut wanted = Vec::new();
    for module in descriptor.modules.iter().filter(|m| modules.contains(&m.name)) {
        for requires in &module.requires {
            if let Some(path) = path_parameter(&requires.parameters, &module.name)? {
                wanted.push((path, EntryKind::Requires(format!("{}/{}", module.name, requires.name))));
            }
        }
    }
    for resource in &descriptor.resources {
        if let Some(path) = path_parameter(&resource.parameters, &resource.name)? {
            wanted.push((path, EntryKind::Resource(resource.name.clone())));
        }
    }

    let temp_dir = location.temp_dir();
    let mut copied: HashSet<String> = HashSet::new();
    let mut entries = Vec::new();
    for (path, kind) in wanted {
        let relative = content_path(&path)?;
        let source = location.source_dir().join(&relative);
        let target = temp_dir.join(&relative);
        let entry_path = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/");
        if copied.insert(entry_path.clone()) {
            copy_content(&source, &target, strategy)?;
            debug!("copied {} into the archive", entry_path);
        }
        entries.push(ManifestEntry {
            path: entry_path,
            kind,
            content_type: content_type(&target)?,
        });
    }
    Ok(entries)
}

fn path_parameter(parameters: &Map, owner: &str) -> Result<Option<String>> {
    match parameters.get(PATH_PARAMETER) {
        None | Some(serde_yaml::Value::Null) => Ok(None),
        Some(serde_yaml::Value::String(path)) => Ok(Some(path.replace('\\', "/"))),
        Some(_) => Err(Error::Filesystem {
            path: owner.to_string(),
            message: format!("the \"{}\" parameter must be a string", PATH_PARAMETER),
        }),
    }
}

/// Validate a project-relative content path.
fn content_path(path: &str) -> Result<PathBuf> {
    let relative = Path::new(path);
    let inside = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        && relative.components().any(|c| matches!(c, Component::Normal(_)));
    if !inside {
        return Err(Error::Filesystem {
            path: path.to_string(),
            message: "content paths must stay inside the project directory".to_string(),
        });
    }
    Ok(relative.to_path_buf())
}

fn copy_content(source: &Path, target: &Path, strategy: CopyStrategy) -> Result<()> {
    let metadata = fs::metadata(source).map_err(|e| Error::at_path(source, e))?;
    if metadata.is_dir() {
        return filesystem::copy_dir(source, target, true, strategy);
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::at_path(parent, e))?;
    }
    filesystem::copy_file(source, target)
}

/// Execute Phase 6: Write metadata and archive the temporary directory
///
/// Returns the path of the final archive.
pub fn execute<L: TargetPaths + ?Sized>(
    location: &L,
    descriptor: &Descriptor,
    entries: &[ManifestEntry],
    writer: &dyn MetadataWriter,
    keep_temp: bool,
) -> Result<PathBuf> {
    let temp_dir = location.temp_dir();
    filesystem::create_dir_if_not_exist(&temp_dir)?;
    writer.write(descriptor, entries, &temp_dir.join(defaults::META_INF))?;

    let archive_path = location.archive_path(descriptor);
    filesystem::create_dir_if_not_exist(location.target_dir())?;
    archive::archive(&temp_dir, &archive_path, &[])?;
    info!("the archive has been generated at {}", archive_path.display());

    if !keep_temp {
        fs::remove_dir_all(&temp_dir).map_err(|e| Error::at_path(&temp_dir, e))?;
    }
    Ok(archive_path)
}
