//! # Builder Table
//!
//! Maps module types and builder names to the commands that build a module.
//!
//! The table is an immutable value handed to the orchestrator; nothing reads
//! it from global state. [`BuilderTable::builtin`] returns the table embedded
//! in the crate, [`BuilderTable::from_file`] loads a replacement.
//!
//! ## Resolution
//!
//! 1. `build-parameters.builder: custom` takes the commands from
//!    `build-parameters.commands`.
//! 2. Any other explicit `builder` must name an entry of `builders`.
//! 3. Without `builder`, the module's `type` is looked up in `module-types`,
//!    which either lists commands itself or delegates to a builder.
//!
//! `{{key}}` placeholders in commands are replaced with the values of the
//! `<builder>-opts` build parameter.
//!
//! Project builders (`before-all`, `after-all`) resolve the same way, except
//! that a `custom` project builder without commands only warns.

use crate::build_params::ProjectBuilder;
use crate::descriptor::Module;
use crate::error::{Error, Result};
use log::warn;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Builder name whose commands come from the module itself.
pub const CUSTOM_BUILDER: &str = "custom";

const BUILTIN: &str = include_str!("builders.yaml");

/// One command of a builder or module type
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommandEntry {
    pub command: String,
}

/// A named, reusable list of build commands
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BuilderDef {
    pub name: String,
    #[serde(default)]
    pub info: Option<String>,
    #[serde(default)]
    pub commands: Vec<CommandEntry>,
    /// Build result used when the module does not set its own.
    #[serde(rename = "build-result", default)]
    pub build_result: Option<String>,
}

/// How modules of one type are built
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModuleTypeDef {
    pub name: String,
    #[serde(default)]
    pub info: Option<String>,
    /// Delegate to this builder; exclusive with `commands`.
    #[serde(default)]
    pub builder: Option<String>,
    #[serde(default)]
    pub commands: Vec<CommandEntry>,
}

/// Module type and builder definitions
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BuilderTable {
    #[serde(default)]
    pub version: Option<serde_yaml::Value>,
    #[serde(default)]
    pub builders: Vec<BuilderDef>,
    #[serde(rename = "module-types", default)]
    pub module_types: Vec<ModuleTypeDef>,
}

/// Commands resolved for one module
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModuleCommands {
    /// Builder (or module type) the commands came from.
    pub builder: String,
    pub commands: Vec<String>,
    /// Default build result of the builder.
    pub build_result: Option<String>,
}

impl BuilderTable {
    /// The table shipped with the crate.
    pub fn builtin() -> Result<Self> {
        Self::parse(BUILTIN, "built-in builders")
    }

    /// Parse a table from YAML; `source` names it in error messages.
    pub fn parse(yaml: &str, source: &str) -> Result<Self> {
        let table: BuilderTable = serde_yaml::from_str(yaml).map_err(|e| Error::BuilderConfig {
            message: format!("could not parse {}: {}", source, e),
            hint: None,
        })?;
        table.validate()?;
        Ok(table)
    }

    /// Load a table from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::at_path(path, e))?;
        Self::parse(&content, &path.display().to_string())
    }

    fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for builder in &self.builders {
            if !names.insert(builder.name.as_str()) {
                return Err(Error::BuilderConfig {
                    message: format!("the \"{}\" builder is defined more than once", builder.name),
                    hint: None,
                });
            }
        }

        for module_type in &self.module_types {
            match &module_type.builder {
                Some(_) if !module_type.commands.is_empty() => {
                    return Err(Error::BuilderConfig {
                        message: format!(
                            "the \"{}\" module type defines both a builder and commands",
                            module_type.name
                        ),
                        hint: Some("keep either the builder or the commands".to_string()),
                    })
                }
                Some(builder) if !names.contains(builder.as_str()) => {
                    return Err(Error::BuilderConfig {
                        message: format!(
                            "the \"{}\" module type refers to the undefined \"{}\" builder",
                            module_type.name, builder
                        ),
                        hint: None,
                    })
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Look up a builder by name.
    pub fn builder(&self, name: &str) -> Option<&BuilderDef> {
        self.builders.iter().find(|b| b.name == name)
    }

    /// Look up a module type by name.
    pub fn module_type(&self, name: &str) -> Option<&ModuleTypeDef> {
        self.module_types.iter().find(|t| t.name == name)
    }

    /// Resolve the commands building `module`.
    pub fn commands_for(&self, module: &Module) -> Result<ModuleCommands> {
        let resolved = match module.builder()? {
            Some(name) if name == CUSTOM_BUILDER => {
                let commands = module.custom_commands()?.ok_or_else(|| Error::BuildParameter {
                    module: module.name.clone(),
                    parameter: crate::build_params::COMMANDS.to_string(),
                    message: "the custom builder requires a list of commands".to_string(),
                })?;
                ModuleCommands {
                    builder: name,
                    commands,
                    build_result: None,
                }
            }
            Some(name) => {
                self.from_builder(&name, &format!("the \"{}\" module", module.name))?
            }
            None => self.from_module_type(module)?,
        };

        let options = builder_options(module, &resolved.builder)?;
        Ok(ModuleCommands {
            commands: resolved
                .commands
                .into_iter()
                .map(|command| substitute_options(&command, &options))
                .collect(),
            ..resolved
        })
    }

    /// Resolve the commands of a project builder.
    pub fn project_commands(&self, project_builder: &ProjectBuilder) -> Result<Vec<String>> {
        let commands = project_builder.commands.as_deref().unwrap_or_default();
        if project_builder.builder == CUSTOM_BUILDER {
            if commands.is_empty() {
                warn!(
                    "the \"commands\" property is missing in the \"{}\" builder",
                    CUSTOM_BUILDER
                );
            }
            return Ok(commands.to_vec());
        }
        if !commands.is_empty() {
            warn!(
                "the \"commands\" property is not supported by the \"{}\" builder",
                project_builder.builder
            );
        }
        Ok(self.from_builder(&project_builder.builder, "the project")?.commands)
    }

    /// Commands of the named builder; `owner` describes who asked for it.
    fn from_builder(&self, name: &str, owner: &str) -> Result<ModuleCommands> {
        let builder = self.builder(name).ok_or_else(|| Error::BuilderConfig {
            message: format!("{} uses the undefined \"{}\" builder", owner, name),
            hint: Some(format!(
                "use one of the defined builders or \"{}\" with a list of commands",
                CUSTOM_BUILDER
            )),
        })?;
        Ok(ModuleCommands {
            builder: builder.name.clone(),
            commands: builder.commands.iter().map(|c| c.command.clone()).collect(),
            build_result: builder.build_result.clone(),
        })
    }

    fn from_module_type(&self, module: &Module) -> Result<ModuleCommands> {
        match self.module_type(&module.module_type) {
            Some(ModuleTypeDef {
                builder: Some(builder),
                ..
            }) => self.from_builder(builder, &format!("the \"{}\" module", module.name)),
            Some(module_type) => Ok(ModuleCommands {
                builder: module_type.name.clone(),
                commands: module_type.commands.iter().map(|c| c.command.clone()).collect(),
                build_result: None,
            }),
            None => {
                warn!(
                    "the \"{}\" module type of the \"{}\" module has no build commands",
                    module.module_type, module.name
                );
                Ok(ModuleCommands {
                    builder: module.module_type.clone(),
                    ..ModuleCommands::default()
                })
            }
        }
    }
}

/// Values of the `<builder>-opts` build parameter, rendered as strings.
fn builder_options(module: &Module, builder: &str) -> Result<BTreeMap<String, String>> {
    let key = format!("{}-opts", builder);
    let Some(value) = module.build_params.get(&key) else {
        return Ok(BTreeMap::new());
    };
    let raw: BTreeMap<String, serde_yaml::Value> =
        serde_yaml::from_value(value.clone()).map_err(|e| Error::BuildParameter {
            module: module.name.clone(),
            parameter: key.clone(),
            message: e.to_string(),
        })?;
    Ok(raw
        .into_iter()
        .map(|(k, v)| {
            let rendered = match v {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::Bool(b) => b.to_string(),
                serde_yaml::Value::Null => String::new(),
                other => serde_yaml::to_string(&other)
                    .map(|s| s.trim_end().to_string())
                    .unwrap_or_default(),
            };
            (k, rendered)
        })
        .collect())
}

fn substitute_options(command: &str, options: &BTreeMap<String, String>) -> String {
    options.iter().fold(command.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{{{}}}}}", key), value)
    })
}
