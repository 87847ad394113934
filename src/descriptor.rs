//! # Descriptor Model and Parsing
//!
//! This module defines the data structures that represent an `mta.yaml`
//! project descriptor and its `.mtaext` extension descriptors, together with
//! the functions that parse them.
//!
//! ## Key Components
//!
//! - **`Descriptor`**: The base descriptor: identity (`ID`, `_schema-version`,
//!   `version`), the ordered list of modules, the ordered list of resources
//!   and free-form parameters.
//!
//! - **`Module`**: One buildable unit. Its `build-parameters` map is kept
//!   free-form so that extensions can overlay arbitrary keys; the typed view
//!   over the recognised keys lives in [`crate::build_params`].
//!
//! - **`ExtensionDescriptor`**: An overlay that `extends` either the base
//!   descriptor or another extension, by ID.
//!
//! Module names are unique within a descriptor; `parse` rejects duplicates.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Free-form map used for properties, parameters and build parameters.
pub type Map = BTreeMap<String, Value>;

/// Runtime requirement of a module (a resource or a provided name)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requires {
    /// Name of the required resource or provided section
    pub name: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub parameters: Map,
}

/// Named section a module provides to other modules at runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provides {
    pub name: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map,
}

/// A buildable unit of the project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    /// Name, unique within the descriptor.
    pub name: String,
    /// Module type; selects the builder when `build-parameters.builder` is absent.
    #[serde(rename = "type", default)]
    pub module_type: String,
    /// Source path relative to the project root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<Requires>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provides: Vec<Provides>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub parameters: Map,
    /// Parameters steering the build tool rather than the deployed module.
    #[serde(
        rename = "build-parameters",
        default,
        skip_serializing_if = "Map::is_empty"
    )]
    pub build_params: Map,
}

/// Anything the application needs at runtime that it does not provide itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub parameters: Map,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map,
}

/// The base project descriptor (`mta.yaml`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    #[serde(
        rename = "_schema-version",
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub schema_version: Option<String>,
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modules: Vec<Module>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<Resource>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub parameters: Map,
    /// Project-wide build settings (`before-all`, `after-all`).
    #[serde(
        rename = "build-parameters",
        default,
        skip_serializing_if = "Map::is_empty"
    )]
    pub build_params: Map,
}

impl Descriptor {
    /// Look up a module by name.
    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Look up a module by name, for in-place mutation.
    pub fn module_mut(&mut self, name: &str) -> Option<&mut Module> {
        self.modules.iter_mut().find(|m| m.name == name)
    }

    /// Look up a module by name, failing with `UnknownModule` if it is absent.
    pub fn require_module(&self, name: &str) -> Result<&Module> {
        self.module(name).ok_or_else(|| Error::UnknownModule {
            module: name.to_string(),
        })
    }

    /// Look up a resource by name.
    pub fn resource_mut(&mut self, name: &str) -> Option<&mut Resource> {
        self.resources.iter_mut().find(|r| r.name == name)
    }

}

/// Per-module overlay carried by an extension descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleExtension {
    pub name: String,
    #[serde(default)]
    pub properties: Option<Map>,
    #[serde(default)]
    pub parameters: Option<Map>,
    #[serde(rename = "build-parameters", default)]
    pub build_params: Option<Map>,
}

/// Per-resource overlay carried by an extension descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceExtension {
    pub name: String,
    #[serde(default)]
    pub properties: Option<Map>,
    #[serde(default)]
    pub parameters: Option<Map>,
}

/// An extension descriptor (`*.mtaext`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionDescriptor {
    #[serde(
        rename = "_schema-version",
        default,
        deserialize_with = "string_or_number"
    )]
    pub schema_version: Option<String>,
    #[serde(rename = "ID")]
    pub id: String,
    /// ID of the descriptor this extension overlays.
    pub extends: String,
    #[serde(default)]
    pub modules: Vec<ModuleExtension>,
    #[serde(default)]
    pub resources: Vec<ResourceExtension>,
    #[serde(default)]
    pub parameters: Option<Map>,
    /// File the extension was read from; used in error messages.
    #[serde(skip)]
    pub file: String,
}

/// Accepts `3.1` as well as `"3.1"` for version-like fields.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(other) => {
            return Err(serde::de::Error::custom(format!(
                "expected a version string, found {:?}",
                other
            )))
        }
    })
}

/// Parse a base descriptor from YAML content.
///
/// `file` names the source for error messages.
pub fn parse(yaml_content: &str, file: &str) -> Result<Descriptor> {
    let descriptor: Descriptor =
        serde_yaml::from_str(yaml_content).map_err(|e| Error::DescriptorParse {
            file: file.to_string(),
            message: e.to_string(),
        })?;

    let mut seen = HashSet::new();
    for module in &descriptor.modules {
        if !seen.insert(module.name.as_str()) {
            return Err(Error::DuplicateModule {
                descriptor: descriptor.id.clone(),
                module: module.name.clone(),
            });
        }
    }

    Ok(descriptor)
}

/// Read and parse a base descriptor file.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Descriptor> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| Error::at_path(path, e))?;
    parse(&content, &path.display().to_string())
}

/// Parse an extension descriptor from YAML content.
pub fn parse_extension(yaml_content: &str, file: &str) -> Result<ExtensionDescriptor> {
    let mut extension: ExtensionDescriptor =
        serde_yaml::from_str(yaml_content).map_err(|e| Error::DescriptorParse {
            file: file.to_string(),
            message: e.to_string(),
        })?;
    extension.file = file.to_string();
    Ok(extension)
}

/// Read and parse an extension descriptor file.
pub fn extension_from_file<P: AsRef<Path>>(path: P) -> Result<ExtensionDescriptor> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| Error::at_path(path, e))?;
    parse_extension(&content, &path.display().to_string())
}

/// Major component of a schema version string (`"3.1"` -> 3).
pub fn schema_major(version: &str) -> Result<u64> {
    let trimmed = version.trim();
    if let Ok(parsed) = semver::Version::parse(trimmed) {
        return Ok(parsed.major);
    }
    let major = trimmed.split('.').next().unwrap_or_default();
    major.parse::<u64>().map_err(|_| Error::DescriptorParse {
        file: String::new(),
        message: format!("invalid schema version \"{}\"", version),
    })
}
