//! # Archive Engine
//!
//! Produces zip archives from a directory tree (or a single file).
//!
//! ## Entry layout
//!
//! - Entry names are relative to the source root and always use `/`.
//! - Directory entries end with `/`; the root itself is never an entry.
//! - A single-file source becomes one entry named by its base name.
//!
//! ## Ignore patterns
//!
//! Patterns are globs relative to the (dereferenced) source root and are
//! expanded once, up front, into a set of absolute paths. An ignored directory
//! prunes its whole subtree. A directory whose entries are all ignored counts
//! as ignored too, so `sub/*` leaves no empty `sub/` behind.
//!
//! ## Symbolic links
//!
//! Links are followed, chain by chain. The resolved content is archived under
//! the link's own path; a linked directory is walked as if it lived there. A
//! chain that revisits one of its links fails with
//! [`Error::RecursiveSymlink`].

use crate::error::{Error, Result};
use crate::filesystem::glob_relative;
use log::debug;
use std::collections::{BTreeSet, HashSet};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Zip `source` into the file `target`, skipping entries matched by `ignore`.
///
/// `target` is created or overwritten. On failure a partial archive may be left
/// behind.
pub fn archive(source: &Path, target: &Path, ignore: &[String]) -> Result<()> {
    if source.as_os_str().is_empty() {
        return Err(Error::Filesystem {
            path: String::new(),
            message: "the archive source path is empty".to_string(),
        });
    }
    if target.as_os_str().is_empty() {
        return Err(Error::Filesystem {
            path: String::new(),
            message: "the archive target path is empty".to_string(),
        });
    }
    if target.is_dir() {
        return Err(Error::Filesystem {
            path: target.display().to_string(),
            message: "the archive target is a directory".to_string(),
        });
    }

    let root = resolve_root(source)?;
    let is_dir = fs::metadata(&root)
        .map_err(|e| Error::at_path(&root, e))?
        .is_dir();
    let ignored = if is_dir {
        expand_ignores(&root, ignore)?
    } else {
        HashSet::new()
    };

    debug!(
        "archiving {} into {} ({} ignored entries)",
        source.display(),
        target.display(),
        ignored.len()
    );

    let file = File::create(target).map_err(|e| Error::at_path(target, e))?;
    let mut archiver = Archiver {
        writer: ZipWriter::new(file),
        chain: HashSet::new(),
        root: root.clone(),
    };

    if is_dir {
        archiver.walk(&root, Path::new(""), &ignored)?;
    } else {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        archiver.add_file(&root, &name)?;
    }

    archiver.writer.finish()?;
    Ok(())
}

fn resolve_root(source: &Path) -> Result<PathBuf> {
    let mut chain = HashSet::new();
    let (resolved, _) = dereference(source, &mut chain)?;
    fs::canonicalize(&resolved).map_err(|e| Error::at_path(&resolved, e))
}

fn expand_ignores(root: &Path, patterns: &[String]) -> Result<HashSet<PathBuf>> {
    let mut ignored = HashSet::new();
    for pattern in patterns {
        ignored.extend(glob_relative(root, pattern)?);
    }

    // Directories left with nothing but ignored entries are ignored as well,
    // checked deepest first so emptiness propagates upwards.
    let mut candidates: BTreeSet<PathBuf> = ignored
        .iter()
        .filter_map(|p| p.parent())
        .filter(|p| p.starts_with(root) && *p != root)
        .map(Path::to_path_buf)
        .collect();
    while let Some(dir) = candidates.pop_last() {
        if ignored.contains(&dir) {
            continue;
        }
        let entries = fs::read_dir(&dir)
            .map_err(|e| Error::at_path(&dir, e))?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<Vec<_>>>()
            .map_err(|e| Error::at_path(&dir, e))?;
        if !entries.is_empty() && entries.iter().all(|e| ignored.contains(e)) {
            if let Some(parent) = dir.parent() {
                if parent.starts_with(root) && parent != root {
                    candidates.insert(parent.to_path_buf());
                }
            }
            ignored.insert(dir);
        }
    }
    Ok(ignored)
}

/// Follow the chain of links starting at `path`.
///
/// Returns the first non-link path along with the links recorded in `chain`
/// for this call, so the caller can release them once the branch is done.
fn dereference(path: &Path, chain: &mut HashSet<PathBuf>) -> Result<(PathBuf, Vec<PathBuf>)> {
    let mut current = normalize_link_path(path)?;
    let mut added = Vec::new();

    loop {
        let meta = fs::symlink_metadata(&current).map_err(|e| Error::at_path(&current, e))?;
        if !meta.file_type().is_symlink() {
            return Ok((current, added));
        }
        if !chain.insert(current.clone()) {
            for link in &added {
                chain.remove(link);
            }
            return Err(Error::RecursiveSymlink {
                path: current.display().to_string(),
            });
        }
        added.push(current.clone());

        let link_target = fs::read_link(&current).map_err(|e| Error::at_path(&current, e))?;
        let next = if link_target.is_absolute() {
            link_target
        } else {
            current
                .parent()
                .map(|parent| parent.join(&link_target))
                .unwrap_or(link_target)
        };
        current = normalize_link_path(&next)?;
    }
}

/// Canonicalize the parent of `path` without resolving `path` itself.
fn normalize_link_path(path: &Path) -> Result<PathBuf> {
    let Some(name) = path.file_name() else {
        return fs::canonicalize(path).map_err(|e| Error::at_path(path, e));
    };
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let parent = fs::canonicalize(parent).map_err(|e| Error::at_path(path, e))?;
    Ok(parent.join(name))
}

struct Archiver {
    writer: ZipWriter<File>,
    chain: HashSet<PathBuf>,
    root: PathBuf,
}

impl Archiver {
    /// Archive the content of `dir` under the entry prefix `prefix`.
    fn walk(&mut self, dir: &Path, prefix: &Path, ignored: &HashSet<PathBuf>) -> Result<()> {
        let root = self.root.clone();
        let is_ignored = |path: &Path| -> bool {
            if ignored.contains(path) {
                return true;
            }
            // Paths reached through a linked directory are also checked under
            // the link's location.
            match path.strip_prefix(dir) {
                Ok(rel) if !prefix.as_os_str().is_empty() => {
                    ignored.contains(&root.join(prefix).join(rel))
                }
                _ => false,
            }
        };

        let walker = WalkDir::new(dir)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_ignored(entry.path()));

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(dir).to_path_buf();
                Error::at_path(&path, e)
            })?;
            let rel = entry.path().strip_prefix(dir).map_err(|e| Error::at_path(entry.path(), e))?;
            let entry_path = prefix.join(rel);
            let name = entry_name(&entry_path);

            if entry.path_is_symlink() {
                self.add_link(entry.path(), &entry_path, &name, ignored)?;
            } else if entry.file_type().is_dir() {
                self.add_directory(&name)?;
            } else {
                self.add_file(entry.path(), &name)?;
            }
        }
        Ok(())
    }

    fn add_link(
        &mut self,
        link: &Path,
        entry_path: &Path,
        name: &str,
        ignored: &HashSet<PathBuf>,
    ) -> Result<()> {
        let (resolved, added) = dereference(link, &mut self.chain)?;
        let outcome = match fs::metadata(&resolved) {
            Ok(meta) if meta.is_dir() => self
                .add_directory(name)
                .and_then(|_| self.walk(&resolved, entry_path, ignored)),
            Ok(_) => self.add_file(&resolved, name),
            Err(e) => Err(Error::at_path(&resolved, e)),
        };
        for link in added {
            self.chain.remove(&link);
        }
        outcome
    }

    fn add_directory(&mut self, name: &str) -> Result<()> {
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        self.writer.add_directory(format!("{}/", name), options)?;
        Ok(())
    }

    fn add_file(&mut self, path: &Path, name: &str) -> Result<()> {
        let meta = fs::metadata(path).map_err(|e| Error::at_path(path, e))?;
        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .large_file(meta.len() >= u32::MAX as u64);
        #[cfg(unix)]
        let options = {
            use std::os::unix::fs::PermissionsExt;
            options.unix_permissions(meta.permissions().mode())
        };

        self.writer.start_file(name, options)?;
        let mut input = File::open(path).map_err(|e| Error::at_path(path, e))?;
        io::copy(&mut input, &mut self.writer).map_err(|e| Error::at_path(path, e))?;
        Ok(())
    }
}

/// Forward-slash entry name for a relative path.
fn entry_name(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
