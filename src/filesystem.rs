//! Directory and pattern copy operations used to stage module artifacts.
//!
//! Two interchangeable strategies copy directory entries: [`CopyStrategy::Sequential`]
//! copies one entry at a time, [`CopyStrategy::Parallel`] hands each entry to a
//! fixed pool of [`MAX_OPEN_FILES`] rayon workers. Both skip symbolic links;
//! only [`crate::archive`] follows them.

use crate::error::{Error, Result};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::fs::{self, DirEntry, File, OpenOptions, Permissions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Upper bound on concurrently copied entries in parallel mode.
pub const MAX_OPEN_FILES: usize = 5;

/// How directory entries are copied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CopyStrategy {
    /// One entry at a time, recursing into subdirectories.
    #[default]
    Sequential,
    /// Entries dispatched to a bounded worker pool; subdirectories reuse the pool.
    Parallel,
}

/// Create `dir` (and its parents) unless it already exists.
///
/// Fails if a file with the same name is in the way.
pub fn create_dir_if_not_exist(dir: &Path) -> Result<()> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(Error::NotADirectory {
            path: dir.display().to_string(),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|e| Error::at_path(dir, e))
        }
        Err(e) => Err(Error::at_path(dir, e)),
    }
}

/// Copy the content of `src` into `dst`.
///
/// `dst` is created if missing; with `create_parents` its missing ancestors are
/// created too. Symbolic links inside `src` are skipped with a warning.
pub fn copy_dir(src: &Path, dst: &Path, create_parents: bool, strategy: CopyStrategy) -> Result<()> {
    match strategy {
        CopyStrategy::Sequential => copy_dir_with(src, dst, create_parents, strategy),
        CopyStrategy::Parallel => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(MAX_OPEN_FILES)
                .build()
                .map_err(|e| Error::at_path(src, e))?;
            pool.install(|| copy_dir_with(src, dst, create_parents, strategy))
        }
    }
}

fn copy_dir_with(src: &Path, dst: &Path, create_parents: bool, strategy: CopyStrategy) -> Result<()> {
    match fs::metadata(dst) {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let created = if create_parents {
                fs::create_dir_all(dst)
            } else {
                fs::create_dir(dst)
            };
            created.map_err(|e| Error::at_path(dst, e))?;
        }
        Err(e) => return Err(Error::at_path(dst, e)),
    }

    let entries = fs::read_dir(src)
        .map_err(|e| Error::at_path(src, e))?
        .collect::<io::Result<Vec<DirEntry>>>()
        .map_err(|e| Error::at_path(src, e))?;

    match strategy {
        CopyStrategy::Sequential => {
            for entry in &entries {
                copy_entry(entry, dst, strategy)?;
            }
            Ok(())
        }
        CopyStrategy::Parallel => copy_entries_in_parallel(&entries, dst),
    }
}

/// Copies every entry on the current rayon pool.
///
/// All workers run to completion; the first error handed off is returned and
/// the rest are logged.
fn copy_entries_in_parallel(entries: &[DirEntry], dst: &Path) -> Result<()> {
    let errors: Mutex<Vec<Error>> = Mutex::new(Vec::new());

    entries.par_iter().for_each(|entry| {
        if let Err(e) = copy_entry(entry, dst, CopyStrategy::Parallel) {
            match errors.lock() {
                Ok(mut guard) => guard.push(e),
                Err(poisoned) => poisoned.into_inner().push(e),
            }
        }
    });

    let collected = errors.into_inner().map_err(|_| Error::LockPoisoned {
        context: format!("parallel copy into {}", dst.display()),
    })?;
    let mut collected = collected.into_iter();
    match collected.next() {
        Some(first) => {
            for other in collected {
                debug!("additional copy failure discarded: {}", other);
            }
            Err(first)
        }
        None => Ok(()),
    }
}

fn copy_entry(entry: &DirEntry, dst: &Path, strategy: CopyStrategy) -> Result<()> {
    let src_path = entry.path();
    let dst_path = dst.join(entry.file_name());
    let file_type = entry.file_type().map_err(|e| Error::at_path(&src_path, e))?;

    if file_type.is_symlink() {
        warn!(
            "copying of the entries from the \"{}\" folder to the \"{}\" folder skipped the \"{}\" entry because it is a symbolic link",
            src_path.parent().unwrap_or(&src_path).display(),
            dst.display(),
            entry.file_name().to_string_lossy()
        );
        return Ok(());
    }

    if file_type.is_dir() {
        copy_dir_with(&src_path, &dst_path, false, strategy)
    } else {
        let permissions = entry
            .metadata()
            .map_err(|e| Error::at_path(&src_path, e))?
            .permissions();
        copy_file_with_mode(&src_path, &dst_path, permissions)
    }
}

/// Copy a file's content, giving the copy the supplied permissions.
pub fn copy_file_with_mode(src: &Path, dst: &Path, permissions: Permissions) -> Result<()> {
    let mut input = File::open(src).map_err(|e| Error::at_path(src, e))?;
    let mut output = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(dst)
        .map_err(|e| Error::at_path(dst, e))?;
    io::copy(&mut input, &mut output).map_err(|e| Error::at_path(dst, e))?;
    drop(output);
    fs::set_permissions(dst, permissions).map_err(|e| Error::at_path(dst, e))
}

/// Copy a file, preserving its permission mode.
pub fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    let permissions = fs::metadata(src)
        .map_err(|e| Error::at_path(src, e))?
        .permissions();
    copy_file_with_mode(src, dst, permissions)
}

/// Copy everything matching `patterns` (globs relative to `source`) into `target`.
///
/// Each match keeps its base name. An empty pattern list is a no-op, and a
/// pattern matching nothing is not an error. A `target` that exists but is not
/// a directory fails before anything is copied.
pub fn copy_by_patterns(source: &Path, target: &Path, patterns: &[String]) -> Result<()> {
    let Some(first) = patterns.first() else {
        return Ok(());
    };

    info!(
        "copying the patterns [{},...] from the {} folder to the {} folder",
        first,
        source.display(),
        target.display()
    );

    match fs::metadata(target) {
        Ok(meta) if !meta.is_dir() => {
            return Err(Error::NotADirectory {
                path: target.display().to_string(),
            })
        }
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(target).map_err(|e| Error::at_path(target, e))?;
            info!("the \"{}\" folder has been created", target.display());
        }
        Err(e) => return Err(Error::at_path(target, e)),
    }

    for pattern in patterns {
        copy_by_pattern(source, target, pattern)?;
    }
    Ok(())
}

fn copy_by_pattern(source: &Path, target: &Path, pattern: &str) -> Result<()> {
    debug!(
        "copying the \"{}\" pattern from the \"{}\" folder to the \"{}\" folder",
        pattern,
        source.display(),
        target.display()
    );

    for entry in glob_relative(source, pattern)? {
        let meta = fs::metadata(&entry).map_err(|e| Error::at_path(&entry, e))?;
        let Some(name) = entry.file_name() else {
            continue;
        };
        let target_entry = target.join(name);
        if meta.is_dir() {
            copy_dir(&entry, &target_entry, true, CopyStrategy::Sequential)?;
        } else {
            copy_file_with_mode(&entry, &target_entry, meta.permissions())?;
        }
    }
    Ok(())
}

/// Expand a glob relative to `base`, stripping a leading `./` and escaping
/// `base` itself so its name is matched literally.
pub fn glob_relative(base: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let mut relative = pattern;
    while let Some(stripped) = relative.strip_prefix("./") {
        relative = stripped;
    }
    let relative = relative.trim_end_matches('/');

    let escaped_base = glob::Pattern::escape(&base.to_string_lossy());
    let full_pattern = if relative.is_empty() {
        escaped_base
    } else {
        format!("{}/{}", escaped_base.trim_end_matches('/'), relative)
    };

    let mut matches = Vec::new();
    for entry in glob::glob(&full_pattern)? {
        let path = entry.map_err(|e| Error::at_path(&e.path().to_path_buf(), e.error()))?;
        matches.push(path);
    }
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn sample_tree(root: &Path) {
        write(root, "a.txt", "a");
        write(root, "sub/b.txt", "b");
        write(root, "sub/deeper/c.txt", "c");
        write(root, "other/d.txt", "d");
        write(root, "other/e.txt", "e");
        write(root, "f.txt", "f");
    }

    fn assert_sample_copied(dst: &Path) {
        assert_eq!(fs::read_to_string(dst.join("a.txt")).unwrap(), "a");
        assert_eq!(fs::read_to_string(dst.join("sub/b.txt")).unwrap(), "b");
        assert_eq!(fs::read_to_string(dst.join("sub/deeper/c.txt")).unwrap(), "c");
        assert_eq!(fs::read_to_string(dst.join("other/e.txt")).unwrap(), "e");
        assert_eq!(fs::read_to_string(dst.join("f.txt")).unwrap(), "f");
    }

    #[test]
    fn test_copy_dir_sequential() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        sample_tree(src.path());

        let target = dst.path().join("out");
        copy_dir(src.path(), &target, false, CopyStrategy::Sequential).unwrap();
        assert_sample_copied(&target);
    }

    #[test]
    fn test_copy_dir_parallel() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        sample_tree(src.path());

        let target = dst.path().join("out");
        copy_dir(src.path(), &target, false, CopyStrategy::Parallel).unwrap();
        assert_sample_copied(&target);
    }

    #[test]
    fn test_copy_dir_without_parents_fails_on_missing_ancestor() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        sample_tree(src.path());

        let target = dst.path().join("missing/out");
        let err = copy_dir(src.path(), &target, false, CopyStrategy::Sequential).unwrap_err();
        assert!(err.to_string().contains("missing/out"));

        copy_dir(src.path(), &target, true, CopyStrategy::Sequential).unwrap();
        assert_sample_copied(&target);
    }

    #[test]
    fn test_copy_dir_missing_source() {
        let dst = TempDir::new().unwrap();
        let err = copy_dir(
            Path::new("/nonexistent/source"),
            &dst.path().join("out"),
            false,
            CopyStrategy::Parallel,
        )
        .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/source"));
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_dir_skips_symlinks() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        write(src.path(), "real.txt", "real");
        std::os::unix::fs::symlink(src.path().join("real.txt"), src.path().join("link.txt"))
            .unwrap();

        for strategy in [CopyStrategy::Sequential, CopyStrategy::Parallel] {
            let target = dst.path().join(format!("{:?}", strategy));
            copy_dir(src.path(), &target, false, strategy).unwrap();
            assert!(target.join("real.txt").exists());
            assert!(fs::symlink_metadata(target.join("link.txt")).is_err());
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_preserves_mode() {
        use std::os::unix::fs::PermissionsExt;

        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        write(src.path(), "run.sh", "#!/bin/sh\n");
        fs::set_permissions(src.path().join("run.sh"), Permissions::from_mode(0o755)).unwrap();

        let target = dst.path().join("out");
        copy_dir(src.path(), &target, false, CopyStrategy::Parallel).unwrap();
        let mode = fs::metadata(target.join("run.sh")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_copy_dir_parallel_reports_failure() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        sample_tree(src.path());
        let target = dst.path().join("out");
        fs::create_dir_all(target.join("sub")).unwrap();
        // A file where a directory must go makes one worker fail.
        fs::write(target.join("sub/deeper"), "in the way").unwrap();

        let err = copy_dir(src.path(), &target, false, CopyStrategy::Parallel).unwrap_err();
        assert!(err.to_string().contains("deeper"));
        // Sibling workers still ran to completion.
        assert!(target.join("other/d.txt").exists());
    }

    #[test]
    fn test_copy_by_patterns_empty_is_noop() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        sample_tree(src.path());

        let target = dst.path().join("never-created");
        copy_by_patterns(src.path(), &target, &[]).unwrap();
        assert!(!target.exists());
    }

    #[test]
    fn test_copy_by_patterns_files_and_dirs() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        sample_tree(src.path());

        let target = dst.path().join("out");
        copy_by_patterns(
            src.path(),
            &target,
            &["./sub".to_string(), "other/*.txt".to_string(), "nothing-*".to_string()],
        )
        .unwrap();

        assert_eq!(fs::read_to_string(target.join("sub/deeper/c.txt")).unwrap(), "c");
        assert_eq!(fs::read_to_string(target.join("d.txt")).unwrap(), "d");
        assert_eq!(fs::read_to_string(target.join("e.txt")).unwrap(), "e");
        assert!(!target.join("a.txt").exists());
    }

    #[test]
    fn test_copy_by_patterns_target_is_file() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        sample_tree(src.path());
        write(dst.path(), "file", "x");

        let err = copy_by_patterns(src.path(), &dst.path().join("file"), &["*".to_string()])
            .unwrap_err();
        assert!(matches!(err, Error::NotADirectory { .. }));
    }

    #[test]
    fn test_create_dir_if_not_exist() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("x/y");
        create_dir_if_not_exist(&dir).unwrap();
        assert!(dir.is_dir());
        create_dir_if_not_exist(&dir).unwrap();

        write(root.path(), "file", "x");
        assert!(create_dir_if_not_exist(&root.path().join("file")).is_err());
    }

    #[test]
    fn test_glob_relative_strips_prefix() {
        let src = TempDir::new().unwrap();
        sample_tree(src.path());
        let matches = glob_relative(src.path(), "./././sub/").unwrap();
        assert_eq!(matches, vec![src.path().join("sub")]);
    }
}
