//! # Error Handling
//!
//! This module defines the centralized error type for `mtar-build`. It uses
//! the `thiserror` library to build a single `Error` enum that covers every
//! anticipated failure mode of the build-ordering and packaging engine.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum. Each variant carries the names or paths needed
//!   to locate the problem (module names, extension files, filesystem paths)
//!   without re-running the build with verbose output.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! The variants fall into four groups:
//!
//! - Reference errors: a `requires` entry naming an unknown module, an
//!   extension whose `extends` target nothing produces.
//! - Structural errors: dependency cycles, ambiguous `extends` targets,
//!   extension ID collisions, schema major-version mismatches, duplicate
//!   module names.
//! - Filesystem errors: path-bearing I/O failures, recursive symbolic links,
//!   a target that exists but is not a directory.
//! - Build errors: failing or timed-out module commands, invalid build
//!   parameters, module-level failures raised by the orchestrator.

use thiserror::Error;

/// Main error type for mtar-build operations
#[derive(Error, Debug)]
pub enum Error {
    /// A descriptor or extension file could not be parsed.
    #[error("Descriptor parsing error in {file}: {message}")]
    DescriptorParse { file: String, message: String },

    /// Two modules in one descriptor share a name.
    #[error("Duplicate module \"{module}\" in descriptor \"{descriptor}\"")]
    DuplicateModule { descriptor: String, module: String },

    /// A module was requested by name but the descriptor does not define it.
    #[error("Module \"{module}\" is not defined in the descriptor")]
    UnknownModule { module: String },

    /// A build-time `requires` entry names a module that does not exist.
    #[error("Module \"{module}\" requires the unknown module \"{missing}\"")]
    UnresolvedReference { module: String, missing: String },

    /// A circular dependency was detected between modules.
    #[error("Circular dependency found between modules \"{first}\" and \"{second}\"")]
    CycleDetected { first: String, second: String },

    /// An extension declares the same ID as the base descriptor.
    #[error("Extension file {file} declares the ID \"{id}\" which is already used by the base descriptor")]
    ExtensionIdMatchesBase { file: String, id: String },

    /// Two extensions declare the same ID.
    #[error("Extension files {first} and {second} both declare the ID \"{id}\"")]
    DuplicateExtensionId {
        id: String,
        first: String,
        second: String,
    },

    /// An extension's schema major version differs from the base descriptor's.
    #[error("Extension file {file} has schema version \"{extension_version}\" which is incompatible with the base descriptor schema version \"{base_version}\"")]
    SchemaMismatch {
        file: String,
        extension_version: String,
        base_version: String,
    },

    /// Two extensions extend the same descriptor.
    #[error("Extension files {first} and {second} both extend \"{target}\"")]
    AmbiguousExtends {
        target: String,
        first: String,
        second: String,
    },

    /// One or more extensions extend an ID that neither the base descriptor
    /// nor any other extension in the chain provides.
    #[error("Unknown extends target: {details}")]
    UnknownExtends { details: String },

    /// A symbolic link chain revisits a path already in the chain.
    #[error("Recursive symbolic link found at {path}")]
    RecursiveSymlink { path: String },

    /// A path that must be a directory exists as something else.
    #[error("The target {path} exists and is not a directory")]
    NotADirectory { path: String },

    /// A filesystem operation failed on a specific path.
    #[error("Filesystem operation error on {path}: {message}")]
    Filesystem { path: String, message: String },

    /// A build parameter has an unexpected shape.
    #[error("Invalid build parameter \"{parameter}\" in module \"{module}\": {message}")]
    BuildParameter {
        module: String,
        parameter: String,
        message: String,
    },

    /// The builder table could not be parsed or lacks an entry.
    #[error("Builder configuration error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    BuilderConfig {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// A module build command exited unsuccessfully.
    #[error("Command failed: {command} ({status}) - {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// A module's commands did not finish within its timeout.
    #[error("Commands timed out after {timeout}: {command}")]
    CommandTimeout { command: String, timeout: String },

    /// A module failed at a specific stage of the build.
    #[error("Could not {stage} the \"{module}\" module: {message}")]
    ModuleBuild {
        module: String,
        stage: String,
        message: String,
    },

    /// A `before-all` or `after-all` project builder failed.
    #[error("The \"{phase}\" project build failed: {message}")]
    ProjectBuild { phase: String, message: String },

    /// Two modules would write the same target artifact.
    #[error("Modules \"{first}\" and \"{second}\" both produce the artifact {artifact}")]
    ArtifactConflict {
        first: String,
        second: String,
        artifact: String,
    },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// A semantic versioning parsing error, wrapped from `semver::Error`.
    #[error("Semver parsing error: {0}")]
    Semver(#[from] semver::Error),

    /// A zip archive error, wrapped from `zip::result::ZipError`.
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// An error indicating that a mutex or other lock has been poisoned.
    #[error("Lock poisoned: {context}")]
    LockPoisoned { context: String },
}

impl Error {
    /// Builds a `Filesystem` error from an I/O error and the path it concerns.
    pub fn at_path(path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        Error::Filesystem {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_cycle_detected() {
        let error = Error::CycleDetected {
            first: "X".to_string(),
            second: "Y".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("Circular dependency"));
        assert!(display.contains("\"X\""));
        assert!(display.contains("\"Y\""));
    }

    #[test]
    fn test_error_display_unresolved_reference() {
        let error = Error::UnresolvedReference {
            module: "ui".to_string(),
            missing: "backend".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("\"ui\""));
        assert!(display.contains("unknown module \"backend\""));
    }

    #[test]
    fn test_error_display_ambiguous_extends() {
        let error = Error::AmbiguousExtends {
            target: "m1".to_string(),
            first: "a.mtaext".to_string(),
            second: "b.mtaext".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("a.mtaext"));
        assert!(display.contains("b.mtaext"));
        assert!(display.contains("extend \"m1\""));
    }

    #[test]
    fn test_error_display_schema_mismatch() {
        let error = Error::SchemaMismatch {
            file: "cf.mtaext".to_string(),
            extension_version: "2.1".to_string(),
            base_version: "3.1".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("cf.mtaext"));
        assert!(display.contains("\"2.1\""));
        assert!(display.contains("\"3.1\""));
    }

    #[test]
    fn test_error_display_builder_config_with_hint() {
        let error = Error::BuilderConfig {
            message: "unknown builder \"maven\"".to_string(),
            hint: Some("use the custom builder with commands".to_string()),
        };
        let display = format!("{}", error);
        assert!(display.contains("Builder configuration error"));
        assert!(display.contains("hint:"));
        assert!(display.contains("custom builder"));
    }

    #[test]
    fn test_error_display_module_build() {
        let error = Error::ModuleBuild {
            module: "ui".to_string(),
            stage: "pack".to_string(),
            message: "disk full".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Could not pack the \"ui\" module: disk full"
        );
    }

    #[test]
    fn test_error_at_path() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let error = Error::at_path(std::path::Path::new("/tmp/missing"), io_error);
        let display = format!("{}", error);
        assert!(display.contains("/tmp/missing"));
        assert!(display.contains("File not found"));
    }

    #[test]
    fn test_error_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let error: Error = io_error.into();
        let display = format!("{}", error);
        assert!(display.contains("I/O error"));
        assert!(display.contains("File not found"));
    }

    #[test]
    fn test_error_from_yaml_error() {
        let yaml_str = "invalid: [unclosed";
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>(yaml_str).unwrap_err();
        let error: Error = yaml_error.into();
        let display = format!("{}", error);
        assert!(display.contains("YAML parsing error"));
    }

    #[test]
    fn test_error_from_glob_error() {
        let glob_error = glob::Pattern::new("[").unwrap_err();
        let error: Error = glob_error.into();
        assert!(error.to_string().contains("Glob pattern error"));
    }
}
