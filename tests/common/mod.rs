//! Shared test utilities for integration and E2E tests.
//!
//! This module provides common fixtures, helper functions and descriptor
//! snippets to reduce duplication across test files.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_descriptor(descriptors::TWO_MODULES);
//!     // ... test code
//! }
//! ```

use assert_fs::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Re-export commonly used test dependencies for convenience.
#[allow(unused_imports)]
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    pub use super::descriptors;
    pub use super::zip_entries;
    pub use super::TestFixture;
}

/// Common descriptor YAML snippets for testing.
#[allow(dead_code)]
pub mod descriptors {
    /// Two modules with no build commands; `ui` requires the `lib` build result.
    pub const TWO_MODULES: &str = r#"ID: shop
version: 1.0.0
modules:
  - name: ui
    type: sitecontent
    path: ui
    build-parameters:
      requires:
        - name: lib
          artifacts: ["*.js"]
          target-path: vendor
  - name: lib
    type: sitecontent
    path: lib
    build-parameters:
      build-result: dist
"#;

    /// A module whose build command fails.
    pub const FAILING: &str = r#"ID: broken
modules:
  - name: bad
    type: custom
    path: bad
    build-parameters:
      builder: custom
      commands:
        - exit 3
"#;

    /// Two modules requiring each other.
    pub const CYCLE: &str = r#"ID: loop
modules:
  - name: a
    type: sitecontent
    build-parameters:
      requires: [{name: b}]
  - name: b
    type: sitecontent
    build-parameters:
      requires: [{name: a}]
"#;

    /// Invalid YAML for error testing.
    pub const INVALID_YAML: &str = "ID: [unterminated";
}

/// Sorted entry names of a zip file.
#[allow(dead_code)]
pub fn zip_entries(path: &Path) -> Vec<String> {
    let file = File::open(path).expect("Failed to open archive");
    let archive = zip::ZipArchive::new(file).expect("Failed to read archive");
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
}

/// A test fixture that provides a temporary MTA project directory.
///
/// # Example
///
/// ```rust,ignore
/// let fixture = TestFixture::new()
///     .with_descriptor(descriptors::TWO_MODULES)
///     .with_file("ui/index.html", "<html/>");
///
/// fixture.command().arg("build").assert().success();
/// ```
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add an `mta.yaml` with the given content.
    pub fn with_descriptor(self, content: &str) -> Self {
        self.with_file("mta.yaml", content)
    }

    /// Add the sources of [`descriptors::TWO_MODULES`] along with it.
    #[allow(dead_code)]
    pub fn with_two_modules(self) -> Self {
        self.with_descriptor(descriptors::TWO_MODULES)
            .with_file("ui/index.html", "<html/>")
            .with_file("lib/dist/lib.js", "export {}")
            .with_file("lib/dist/lib.css", "body {}")
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Get the path to the project directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Default location of the built archive for a descriptor file name.
    #[allow(dead_code)]
    pub fn archive(&self, name: &str) -> PathBuf {
        self.path().join("mta_archives").join(name)
    }

    /// Create a child path in the temp directory.
    #[allow(dead_code)]
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl TestFixture {
    /// Create a command configured to run in this fixture's directory.
    #[allow(dead_code)]
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("mtar-build");
        cmd.current_dir(self.path());
        cmd.env_remove("MTAR_BUILD_SOURCE");
        cmd.env_remove("MTAR_BUILD_TARGET");
        cmd.env_remove("RUST_LOG");
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_creates_temp_dir() {
        let fixture = TestFixture::new();
        assert!(fixture.path().exists());
    }

    #[test]
    fn test_fixture_with_two_modules() {
        let fixture = TestFixture::new().with_two_modules();
        assert!(fixture.path().join("mta.yaml").exists());
        assert!(fixture.path().join("lib/dist/lib.js").exists());
    }

    #[test]
    fn test_descriptors_are_valid_yaml() {
        for descriptor in [
            descriptors::TWO_MODULES,
            descriptors::FAILING,
            descriptors::CYCLE,
        ] {
            let parsed: Result<serde_yaml::Value, _> = serde_yaml::from_str(descriptor);
            assert!(parsed.is_ok(), "invalid descriptor: {}", descriptor);
        }
    }
}
