//! # mtar-build Library
//!
//! This library provides the core functionality for building multi-module
//! archives (`.mtar`) from an `mta.yaml` project descriptor. It is designed to
//! be used by the `mtar-build` command-line tool but can also be integrated
//! into other applications that need to order, build or package MTA modules.
//!
//! ## Quick Example
//!
//! ```
//! use mtar_build::descriptor;
//! use mtar_build::phases::ordering;
//!
//! let yaml = r#"
//! ID: shop
//! modules:
//!   - name: ui
//!     type: html5
//!     build-parameters:
//!       requires:
//!         - name: lib
//!   - name: lib
//!     type: html5
//! "#;
//! let descriptor = descriptor::parse(yaml, "mta.yaml").unwrap();
//! let order = ordering::execute(&descriptor).unwrap();
//! assert_eq!(order, vec!["lib", "ui"]);
//! ```
//!
//! ## Core Concepts
//!
//! - **Descriptor (`descriptor`, `build_params`)**: The `mta.yaml` and
//!   `.mtaext` data model, with typed access to module build parameters.
//! - **Archive Engine (`archive`, `filesystem`)**: Zip creation with ignore
//!   patterns and symbolic link handling, directory copy (sequential or on a
//!   bounded worker pool) and glob-based pattern copy.
//! - **Builders (`builders`, `exec`)**: The immutable table mapping module
//!   types to build commands, and the runner executing them.
//! - **Locations (`location`)**: Narrow capability traits telling a build
//!   where sources, staging and output live.
//! - **Phases (`phases`)**: The pipeline driving a build from descriptor to
//!   archive.
//!
//! ## Execution Flow
//!
//! The main entry point is `phases::orchestrator`, which executes the
//! following high-level steps:
//!
//! 1.  **Extensions**: Resolve the `extends` chain and overlay the extensions.
//! 2.  **Ordering**: Compute the module build order.
//! 3.  **Requirements**: Copy required artifacts between modules.
//! 4.  **Build**: Run each module's build commands.
//! 5.  **Pack**: Stage each module's build result.
//! 6.  **Assembly**: Write metadata and archive everything into the `.mtar`.

pub mod archive;
pub mod build_params;
pub mod builders;
pub mod defaults;
pub mod descriptor;
pub mod error;
pub mod exec;
pub mod filesystem;
pub mod location;
pub mod phases;

#[cfg(test)]
mod ordering_proptest;
