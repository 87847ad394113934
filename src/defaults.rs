//! Default values for mtar-build.
//!
//! This module provides centralized default values used across commands,
//! ensuring consistency and avoiding duplication.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the base descriptor inside a project directory.
pub const DESCRIPTOR_FILE: &str = "mta.yaml";

/// File name of the deployment descriptor written into the archive metadata.
pub const DEPLOYMENT_DESCRIPTOR_FILE: &str = "mtad.yaml";

/// Folder, relative to the project directory, receiving archives by default.
pub const ARCHIVES_FOLDER: &str = "mta_archives";

/// Metadata folder inside the archive.
pub const META_INF: &str = "META-INF";

/// Manifest file inside [`META_INF`].
pub const MANIFEST_FILE: &str = "MANIFEST.MF";

/// File name of a packed module directory without `build-artifact-name`.
pub const DEFAULT_ARTIFACT_NAME: &str = "data";

/// Platform assumed when none is requested.
pub const DEFAULT_PLATFORM: &str = "cf";

/// Timeout applied to a module's build commands unless it sets `timeout`.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Returns the default target directory for a project: `<source>/mta_archives`.
///
/// This can be overridden by the `--target` CLI flag or the
/// `MTAR_BUILD_TARGET` environment variable.
pub fn default_target(source: &Path) -> PathBuf {
    source.join(ARCHIVES_FOLDER)
}

/// Name of the staging directory created under the target directory.
///
/// The project directory's base name keeps builds of different projects
/// sharing a target apart.
pub fn temp_dir_name(source: &Path) -> String {
    let project = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string());
    format!(".{}_mta_build_tmp", project)
}
