//! Phase 4: Building a Module
//!
//! Resolves the module's commands from the [`BuilderTable`] and hands them to
//! the [`CommandRunner`], in the module directory, bounded by the module's
//! `timeout` (ten minutes by default).

use log::info;

use crate::builders::BuilderTable;
use crate::defaults;
use crate::descriptor::Module;
use crate::error::Result;
use crate::exec::CommandRunner;
use crate::location::SourceModules;

/// Execute Phase 4: Run the build commands of `module`
pub fn execute<L: SourceModules + ?Sized>(
    location: &L,
    module: &Module,
    builders: &BuilderTable,
    runner: &dyn CommandRunner,
) -> Result<()> {
    let resolved = builders.commands_for(module)?;
    if resolved.commands.is_empty() {
        info!(
            "the \"{}\" module has no build commands, nothing to run",
            module.name
        );
        return Ok(());
    }

    let timeout = module.timeout()?.unwrap_or(defaults::DEFAULT_TIMEOUT);
    info!(
        "building the \"{}\" module with the \"{}\" builder",
        module.name, resolved.builder
    );
    runner.run(&resolved.commands, &location.module_dir(module), timeout)
}
