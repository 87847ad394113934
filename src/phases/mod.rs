//! Implementation of the phases of an mtar build.
//!
//! ## Overview
//!
//! A build runs through these phases:
//! 1. Extensions - Load `.mtaext` files, resolve their `extends` chain and
//!    overlay them onto the base descriptor
//! 2. Ordering - Compute the module build order from build-time `requires`
//! 3. Requirements - Copy the artifacts each module requires from the build
//!    results of its dependencies
//! 4. Build - Run the module's build commands
//! 5. Pack - Stage the module's build result in the temporary directory
//! 6. Assembly - Copy requirement and resource content, write metadata and
//!    archive the temporary directory
//!
//! Project builders (`before-all`, `after-all`) run before phase 3 and
//! before phase 6. Phases 3 to 5 run once per module, in build order. The orchestrator
//! tracks each module through [`ModuleState`] and applies the
//! [`FailurePolicy`].

use std::path::PathBuf;

use crate::defaults;
use crate::filesystem::CopyStrategy;

// Phase modules
pub mod assembly;
pub mod build;
pub mod extensions;
pub mod orchestrator;
pub mod ordering;
pub mod pack;
pub mod requirements;

// Phase aliases
pub use assembly as phase6;
pub use build as phase4;
pub use extensions as phase1;
pub use ordering as phase2;
pub use pack as phase5;
pub use requirements as phase3;

/// Progress of a single module through the build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Pending,
    RequirementsCopied,
    Built,
    Packed,
    /// Not applicable to the target platform, or declared `no-source`.
    Skipped,
    Failed,
}

/// What the orchestrator does when a module fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Abort the whole build at the first failing module.
    #[default]
    FailFast,
    /// Record the failure and keep building modules that do not depend on it.
    Continue,
}

/// Options of one build invocation
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Target platform (`cf`, `neo`, `xsa`).
    pub platform: String,
    /// Build only these modules; `None` builds all of them.
    pub modules: Option<Vec<String>>,
    /// With `modules`, also build their transitive build dependencies.
    pub with_dependencies: bool,
    /// Strategy used when a requirement copies a whole build result.
    pub copy_strategy: CopyStrategy,
    pub failure_policy: FailurePolicy,
    /// Leave the temporary directory in place after a successful build.
    pub keep_temp: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            platform: defaults::DEFAULT_PLATFORM.to_string(),
            modules: None,
            with_dependencies: false,
            copy_strategy: CopyStrategy::default(),
            failure_policy: FailurePolicy::default(),
            keep_temp: false,
        }
    }
}

/// A module's build result staged in the temporary directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedModule {
    pub module: String,
    /// Absolute path of the staged artifact.
    pub artifact: PathBuf,
    /// Path of the artifact inside the final archive (`<module>/<file>`).
    pub entry: String,
}

/// What an archive entry listed in the manifest stands for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// Packed build result of the named module.
    Module(String),
    /// Content a module requirement points at, named `<module>/<requirement>`.
    Requires(String),
    /// Content of the named resource.
    Resource(String),
}

/// One name section of the archive manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Forward-slash path inside the archive.
    pub path: String,
    pub kind: EntryKind,
    pub content_type: String,
}

/// Final state of one module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleOutcome {
    pub name: String,
    pub state: ModuleState,
    /// Failure description when `state` is [`ModuleState::Failed`].
    pub error: Option<String>,
}

/// Result of a build invocation
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    /// Path of the final archive; `None` when modules failed under
    /// [`FailurePolicy::Continue`].
    pub archive: Option<PathBuf>,
    /// One outcome per processed module, in build order.
    pub modules: Vec<ModuleOutcome>,
}

impl BuildReport {
    /// Outcomes of the modules that failed.
    pub fn failures(&self) -> Vec<&ModuleOutcome> {
        self.modules
            .iter()
            .filter(|m| m.state == ModuleState::Failed)
            .collect()
    }

    /// Outcome of a module by name.
    pub fn module(&self, name: &str) -> Option<&ModuleOutcome> {
        self.modules.iter().find(|m| m.name == name)
    }
}
