//! Orchestrator for the complete build operation
//!
//! This module coordinates all phases to provide a clean API for a complete
//! build. The builder table, command runner and metadata writer are passed in
//! at construction, so a build has no dependency on global state.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;

use log::{debug, error, info, warn};

use super::{
    phase1, phase2, phase3, phase4, phase5, phase6, BuildOptions, BuildReport, FailurePolicy,
    ModuleOutcome, ModuleState, PackedModule,
};
use crate::build_params::{AFTER_ALL, BEFORE_ALL};
use crate::builders::BuilderTable;
use crate::descriptor::{Descriptor, Module};
use crate::error::{Error, Result};
use crate::exec::{CommandRunner, ShellRunner};
use crate::location::{DescriptorSource, SourceModules, TargetPaths};
use crate::phases::assembly::{ManifestWriter, MetadataWriter};

/// Runs builds with fixed collaborators
pub struct Orchestrator<'a> {
    builders: &'a BuilderTable,
    runner: &'a dyn CommandRunner,
    metadata: &'a dyn MetadataWriter,
    options: BuildOptions,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        builders: &'a BuilderTable,
        runner: &'a dyn CommandRunner,
        metadata: &'a dyn MetadataWriter,
        options: BuildOptions,
    ) -> Self {
        Self {
            builders,
            runner,
            metadata,
            options,
        }
    }

    /// Execute the complete build
    ///
    /// 1. Parse the base descriptor and apply the extensions
    /// 2. Determine the module order (optionally a selection)
    /// 3. Run the `before-all` project builders
    /// 4. For each module: copy its requirements, build it, pack it
    /// 5. Copy the content named by `path` parameters of requirements and
    ///    resources
    /// 6. Run the `after-all` project builders
    /// 7. Write metadata and produce the final archive
    ///
    /// Under [`FailurePolicy::FailFast`] the first module failure is returned
    /// as an error. Under [`FailurePolicy::Continue`] failures are recorded in
    /// the report, their dependents are failed without running, and no final
    /// archive is produced. A failing project builder always stops the build.
    pub fn execute<L>(&self, location: &L) -> Result<BuildReport>
    where
        L: SourceModules + TargetPaths + DescriptorSource + ?Sized,
    {
        // Phase 1: Extensions
        let mut descriptor = location.descriptor()?;
        phase1::execute(&mut descriptor, location.extension_files())?;

        // Phase 2: Ordering
        let order = match &self.options.modules {
            Some(names) => phase2::select_with_dependencies(
                &descriptor,
                names,
                self.options.with_dependencies,
            )?,
            None => phase2::execute(&descriptor)?,
        };
        info!("building the modules in the order: {}", order.join(", "));

        let temp_dir = location.temp_dir();
        if temp_dir.exists() {
            fs::remove_dir_all(&temp_dir).map_err(|e| Error::at_path(&temp_dir, e))?;
        }

        self.run_project_builders(location, &descriptor, BEFORE_ALL)?;

        let mut report = BuildReport::default();
        let mut failed: HashSet<String> = HashSet::new();
        let mut staged: HashMap<PathBuf, String> = HashMap::new();
        let mut packed: Vec<PackedModule> = Vec::new();

        // Phases 3-5, per module
        for name in &order {
            let module = descriptor.require_module(name)?;

            let blocked_by = module
                .build_requires()?
                .into_iter()
                .find(|r| failed.contains(&r.name));
            if let Some(requirement) = blocked_by {
                warn!(
                    "the \"{}\" module is not built because the \"{}\" module failed",
                    module.name, requirement.name
                );
                failed.insert(module.name.clone());
                report.modules.push(ModuleOutcome {
                    name: module.name.clone(),
                    state: ModuleState::Failed,
                    error: Some(format!("the required \"{}\" module failed", requirement.name)),
                });
                continue;
            }

            match self.process_module(location, &descriptor, module, &mut staged) {
                Ok((state, staged_module)) => {
                    packed.extend(staged_module);
                    report.modules.push(ModuleOutcome {
                        name: module.name.clone(),
                        state,
                        error: None,
                    });
                }
                Err(err) => match self.options.failure_policy {
                    FailurePolicy::FailFast => return Err(err),
                    FailurePolicy::Continue => {
                        error!("{}", err);
                        failed.insert(module.name.clone());
                        report.modules.push(ModuleOutcome {
                            name: module.name.clone(),
                            state: ModuleState::Failed,
                            error: Some(err.to_string()),
                        });
                    }
                },
            }
        }

        if !failed.is_empty() {
            warn!(
                "{} module(s) failed, the archive is not generated",
                failed.len()
            );
            return Ok(report);
        }

        let deployment = self.deployment_descriptor(&descriptor, &packed)?;
        let mut entries = packed
            .iter()
            .map(phase6::module_entry)
            .collect::<Result<Vec<_>>>()?;
        entries.extend(phase6::stage_content(
            location,
            &deployment,
            &order,
            self.options.copy_strategy,
        )?);

        self.run_project_builders(location, &descriptor, AFTER_ALL)?;

        // Phase 6: Assembly
        report.archive = Some(phase6::execute(
            location,
            &deployment,
            &entries,
            self.metadata,
            self.options.keep_temp,
        )?);
        Ok(report)
    }

    /// Run the project builders of `phase` in the project directory.
    fn run_project_builders<L>(
        &self,
        location: &L,
        descriptor: &Descriptor,
        phase: &str,
    ) -> Result<()>
    where
        L: SourceModules + ?Sized,
    {
        let project_error = |err: Error| match err {
            Error::ProjectBuild { .. } => err,
            other => Error::ProjectBuild {
                phase: phase.to_string(),
                message: other.to_string(),
            },
        };

        let builders = descriptor.project_builders(phase)?;
        if builders.is_empty() {
            return Ok(());
        }
        info!("running the \"{}\" build", phase);
        for builder in &builders {
            let commands = self.builders.project_commands(builder).map_err(project_error)?;
            if commands.is_empty() {
                continue;
            }
            let timeout = builder.timeout().map_err(project_error)?;
            self.runner
                .run(&commands, location.source_dir(), timeout)
                .map_err(project_error)?;
        }
        Ok(())
    }

    /// Move one module from `Pending` to a terminal state.
    fn process_module<L>(
        &self,
        location: &L,
        descriptor: &Descriptor,
        module: &Module,
        staged: &mut HashMap<PathBuf, String>,
    ) -> Result<(ModuleState, Option<PackedModule>)>
    where
        L: SourceModules + TargetPaths + ?Sized,
    {
        let stage_error = |stage: &str, err: Error| Error::ModuleBuild {
            module: module.name.clone(),
            stage: stage.to_string(),
            message: err.to_string(),
        };

        let mut state = ModuleState::Pending;
        if self.is_skipped(module)? {
            info!(
                "the \"{}\" module is skipped for the \"{}\" platform",
                module.name, self.options.platform
            );
            return Ok((ModuleState::Skipped, None));
        }

        phase3::execute(
            location,
            descriptor,
            module,
            self.builders,
            self.options.copy_strategy,
        )
        .map_err(|e| stage_error("copy the requirements of", e))?;
        state = advance(state, ModuleState::RequirementsCopied);

        phase4::execute(location, module, self.builders, self.runner)
            .map_err(|e| stage_error("build", e))?;
        state = advance(state, ModuleState::Built);

        let staged_module = phase5::execute(location, module, self.builders, staged)
            .map_err(|e| stage_error("pack", e))?;
        state = advance(state, ModuleState::Packed);

        Ok((state, Some(staged_module)))
    }

    fn is_skipped(&self, module: &Module) -> Result<bool> {
        Ok(module.no_source() || !module.supports_platform(&self.options.platform)?)
    }

    /// The effective descriptor as deployed: modules excluded from the
    /// platform are dropped, build parameters are cleared and each module's
    /// `path` names its packed entry in the archive.
    fn deployment_descriptor(
        &self,
        descriptor: &Descriptor,
        packed: &[PackedModule],
    ) -> Result<Descriptor> {
        let mut deployment = descriptor.clone();
        let mut excluded = Vec::new();
        for module in &descriptor.modules {
            if !module.supports_platform(&self.options.platform)? {
                excluded.push(module.name.clone());
            }
        }
        deployment.modules.retain(|m| !excluded.contains(&m.name));
        deployment.build_params.clear();
        for module in &mut deployment.modules {
            module.build_params.clear();
            module.path = packed
                .iter()
                .find(|p| p.module == module.name)
                .map(|p| p.entry.clone());
        }
        Ok(deployment)
    }
}

fn advance(from: ModuleState, to: ModuleState) -> ModuleState {
    debug!("module state {:?} -> {:?}", from, to);
    to
}

/// Execute a build with the default collaborators
///
/// Commands run through [`ShellRunner`] and metadata is written by
/// [`ManifestWriter`].
pub fn execute_build<L>(
    location: &L,
    builders: &BuilderTable,
    options: BuildOptions,
) -> Result<BuildReport>
where
    L: SourceModules + TargetPaths + DescriptorSource + ?Sized,
{
    let runner = ShellRunner;
    let metadata = ManifestWriter;
    Orchestrator::new(builders, &runner, &metadata, options).execute(location)
}
