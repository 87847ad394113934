//! Typed access to the `build-parameters` maps of modules and of the project.
//!
//! The map itself stays free-form on [`Module`] so extensions can overlay any
//! key; the accessors here validate the recognised keys on read and report
//! malformed values as `Error::BuildParameter` naming the module and key.
//! Project-level `before-all` and `after-all` builders are read from the
//! descriptor's own map.

use crate::defaults;
use crate::descriptor::{Descriptor, Module};
use crate::error::{Error, Result};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

pub const BUILDER: &str = "builder";
pub const SUPPORTED_PLATFORMS: &str = "supported-platforms";
pub const REQUIRES: &str = "requires";
pub const IGNORE: &str = "ignore";
pub const BUILD_RESULT: &str = "build-result";
pub const BUILD_RESULTS: &str = "build-results";
pub const TIMEOUT: &str = "timeout";
pub const COMMANDS: &str = "commands";
pub const BUILD_ARTIFACT_NAME: &str = "build-artifact-name";
pub const NO_SOURCE: &str = "no-source";
pub const BEFORE_ALL: &str = "before-all";
pub const AFTER_ALL: &str = "after-all";

/// A module's build-time dependency on another module's build output
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BuildRequires {
    /// Name of the module whose build output is required.
    pub name: String,
    /// Glob patterns selecting files from the dependency's build output.
    #[serde(default)]
    pub artifacts: Option<Vec<String>>,
    /// Subdirectory of the dependent module receiving the artifacts.
    #[serde(rename = "target-path", default)]
    pub target_path: Option<String>,
}

impl BuildRequires {
    /// Patterns to copy; an absent list means everything.
    pub fn artifact_patterns(&self) -> Vec<String> {
        if self.copies_everything() {
            return vec!["*".to_string()];
        }
        self.artifacts.clone().unwrap_or_default()
    }

    /// True when the requirement selects the whole build output.
    pub fn copies_everything(&self) -> bool {
        match &self.artifacts {
            None => true,
            Some(patterns) => {
                patterns.len() == 1 && (patterns[0] == "*" || patterns[0] == ".")
            }
        }
    }
}

/// A builder run once for the whole project, in the project directory
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProjectBuilder {
    pub builder: String,
    /// Commands of the `custom` builder.
    #[serde(default)]
    pub commands: Option<Vec<String>>,
    #[serde(default)]
    pub timeout: Option<String>,
}

impl ProjectBuilder {
    /// Timeout of the builder's commands, ten minutes unless set.
    pub fn timeout(&self) -> Result<Duration> {
        match &self.timeout {
            None => Ok(defaults::DEFAULT_TIMEOUT),
            Some(text) => parse_duration(text),
        }
    }
}

/// `before-all`/`after-all` accept a plain list or a `builders` list.
#[derive(Deserialize)]
#[serde(untagged)]
enum ProjectBuilders {
    List(Vec<ProjectBuilder>),
    Nested { builders: Vec<ProjectBuilder> },
}

impl Descriptor {
    /// Project builders of `phase` ([`BEFORE_ALL`] or [`AFTER_ALL`]).
    pub fn project_builders(&self, phase: &str) -> Result<Vec<ProjectBuilder>> {
        match self.build_params.get(phase) {
            None | Some(serde_yaml::Value::Null) => Ok(Vec::new()),
            Some(value) => match serde_yaml::from_value(value.clone()) {
                Ok(ProjectBuilders::List(builders)) => Ok(builders),
                Ok(ProjectBuilders::Nested { builders }) => Ok(builders),
                Err(e) => Err(Error::ProjectBuild {
                    phase: phase.to_string(),
                    message: format!("invalid builders: {}", e),
                }),
            },
        }
    }
}

impl Module {
    fn build_param<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.build_params.get(key) {
            None | Some(serde_yaml::Value::Null) => Ok(None),
            Some(value) => serde_yaml::from_value(value.clone()).map(Some).map_err(|e| {
                Error::BuildParameter {
                    module: self.name.clone(),
                    parameter: key.to_string(),
                    message: e.to_string(),
                }
            }),
        }
    }

    /// Explicit builder name, if the module overrides its type's builder.
    pub fn builder(&self) -> Result<Option<String>> {
        self.build_param(BUILDER)
    }

    /// Platforms this module is built for; `None` means all platforms.
    pub fn supported_platforms(&self) -> Result<Option<Vec<String>>> {
        self.build_param(SUPPORTED_PLATFORMS)
    }

    /// Whether the module applies to `platform`.
    ///
    /// An absent list means every platform; an empty list excludes the module
    /// from all of them. Comparison ignores case.
    pub fn supports_platform(&self, platform: &str) -> Result<bool> {
        Ok(match self.supported_platforms()? {
            None => true,
            Some(platforms) => platforms.iter().any(|p| p.eq_ignore_ascii_case(platform)),
        })
    }

    /// Build-time requirements on other modules.
    pub fn build_requires(&self) -> Result<Vec<BuildRequires>> {
        Ok(self.build_param(REQUIRES)?.unwrap_or_default())
    }

    /// Glob patterns excluded when packing the module's build output.
    pub fn ignore_patterns(&self) -> Result<Vec<String>> {
        Ok(self.build_param(IGNORE)?.unwrap_or_default())
    }

    /// Subpath (possibly a glob) of the module's build output.
    ///
    /// `build-results` is accepted as a spelling of `build-result`.
    pub fn build_result(&self) -> Result<Option<String>> {
        match self.build_param(BUILD_RESULT)? {
            Some(result) => Ok(Some(result)),
            None => self.build_param(BUILD_RESULTS),
        }
    }

    /// File name (without `.zip`) of the packed module archive.
    pub fn build_artifact_name(&self) -> Result<Option<String>> {
        self.build_param(BUILD_ARTIFACT_NAME)
    }

    /// Commands of the `custom` builder.
    pub fn custom_commands(&self) -> Result<Option<Vec<String>>> {
        self.build_param(COMMANDS)
    }

    /// Build timeout, parsed from a `[123h][123m][123s]` string.
    pub fn timeout(&self) -> Result<Option<Duration>> {
        match self.build_param::<String>(TIMEOUT)? {
            None => Ok(None),
            Some(text) => parse_duration(&text).map(Some).map_err(|_| Error::BuildParameter {
                module: self.name.clone(),
                parameter: TIMEOUT.to_string(),
                message: format!(
                    "invalid timeout value \"{}\", it should be in the form \"[123h][123m][123s]\"",
                    text
                ),
            }),
        }
    }

    /// Modules flagged `no-source` have nothing to build or pack.
    pub fn no_source(&self) -> bool {
        matches!(
            self.build_params.get(NO_SOURCE),
            Some(serde_yaml::Value::Bool(true))
        )
    }
}

/// Parse a `[123h][123m][123s]` duration string.
pub fn parse_duration(text: &str) -> Result<Duration> {
    let re = Regex::new(r"^(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?$")?;
    let trimmed = text.trim();
    let captures = re
        .captures(trimmed)
        .filter(|_| !trimmed.is_empty())
        .ok_or_else(|| Error::BuildParameter {
            module: String::new(),
            parameter: TIMEOUT.to_string(),
            message: format!("invalid duration \"{}\"", text),
        })?;

    let mut seconds = 0u64;
    for (index, factor) in [(1, 3600u64), (2, 60), (3, 1)] {
        if let Some(m) = captures.get(index) {
            let amount: u64 = m.as_str().parse().map_err(|_| Error::BuildParameter {
                module: String::new(),
                parameter: TIMEOUT.to_string(),
                message: format!("duration component out of range in \"{}\"", text),
            })?;
            seconds = amount
                .checked_mul(factor)
                .and_then(|part| seconds.checked_add(part))
                .ok_or_else(|| Error::BuildParameter {
                    module: String::new(),
                    parameter: TIMEOUT.to_string(),
                    message: format!("duration \"{}\" is too large", text),
                })?;
        }
    }
    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::parse;

    fn module(build_params: &str) -> Module {
        let yaml = format!(
            "ID: t\nmodules:\n  - name: m\n    type: html5\n    build-parameters:\n{}",
            build_params
        );
        parse(&yaml, "mta.yaml").unwrap().modules.remove(0)
    }

    #[test]
    fn test_build_requires() {
        let m = module(
            "      requires:\n        - name: a\n        - name: b\n          artifacts: [\"dist/*\"]\n          target-path: lib\n",
        );
        let requires = m.build_requires().unwrap();
        assert_eq!(requires.len(), 2);
        assert!(requires[0].copies_everything());
        assert_eq!(requires[0].artifact_patterns(), vec!["*"]);
        assert_eq!(requires[1].target_path.as_deref(), Some("lib"));
        assert!(!requires[1].copies_everything());
    }

    #[test]
    fn test_build_requires_dot_means_everything() {
        let m = module("      requires:\n        - name: a\n          artifacts: [\".\"]\n");
        assert!(m.build_requires().unwrap()[0].copies_everything());
    }

    #[test]
    fn test_malformed_requires_names_module() {
        let m = module("      requires: nope\n");
        let err = m.build_requires().unwrap_err();
        let display = err.to_string();
        assert!(display.contains("\"requires\""));
        assert!(display.contains("\"m\""));
    }

    #[test]
    fn test_supported_platforms() {
        let absent = module("      builder: npm\n");
        assert!(absent.supports_platform("cf").unwrap());

        let empty = module("      supported-platforms: []\n");
        assert!(!empty.supports_platform("cf").unwrap());

        let listed = module("      supported-platforms: [CF, neo]\n");
        assert!(listed.supports_platform("cf").unwrap());
        assert!(!listed.supports_platform("xsa").unwrap());
    }

    #[test]
    fn test_timeout() {
        let m = module("      timeout: 1h30m\n");
        assert_eq!(m.timeout().unwrap(), Some(Duration::from_secs(5400)));

        let bad = module("      timeout: soon\n");
        let err = bad.timeout().unwrap_err();
        assert!(err.to_string().contains("[123h][123m][123s]"));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h2m3s").unwrap(), Duration::from_secs(3723));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("3m1h").is_err());
    }

    #[test]
    fn test_oversized_timeout_is_an_error() {
        assert!(parse_duration("6000000000000000h").is_err());
        assert!(parse_duration("5124095576030431h60s").is_err());
        assert!(parse_duration("99999999999999999999s").is_err());

        let m = module("      timeout: 6000000000000000h\n");
        let err = m.timeout().unwrap_err();
        assert!(err.to_string().contains("\"m\""));
    }

    #[test]
    fn test_project_builders_both_forms() {
        let listed = parse(
            "ID: t\nbuild-parameters:\n  before-all:\n    - builder: custom\n      commands: [\"npm ci\"]\n      timeout: 2m\n",
            "mta.yaml",
        )
        .unwrap();
        let builders = listed.project_builders(BEFORE_ALL).unwrap();
        assert_eq!(builders.len(), 1);
        assert_eq!(builders[0].builder, "custom");
        assert_eq!(builders[0].commands.as_deref(), Some(&["npm ci".to_string()][..]));
        assert_eq!(builders[0].timeout().unwrap(), Duration::from_secs(120));
        assert!(listed.project_builders(AFTER_ALL).unwrap().is_empty());

        let nested = parse(
            "ID: t\nbuild-parameters:\n  after-all:\n    builders:\n      - builder: npm\n",
            "mta.yaml",
        )
        .unwrap();
        let builders = nested.project_builders(AFTER_ALL).unwrap();
        assert_eq!(builders[0].builder, "npm");
        assert_eq!(builders[0].timeout().unwrap(), defaults::DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_malformed_project_builders() {
        let descriptor =
            parse("ID: t\nbuild-parameters:\n  before-all: npm\n", "mta.yaml").unwrap();
        let err = descriptor.project_builders(BEFORE_ALL).unwrap_err();
        assert!(err.to_string().contains("\"before-all\""));
    }

    #[test]
    fn test_build_result_spellings() {
        let singular = module("      build-result: dist\n");
        assert_eq!(singular.build_result().unwrap().as_deref(), Some("dist"));
        let plural = module("      build-results: target/*.war\n");
        assert_eq!(plural.build_result().unwrap().as_deref(), Some("target/*.war"));
        assert_eq!(module("      ignore: []\n").build_result().unwrap(), None);
    }

    #[test]
    fn test_no_source_and_ignore() {
        let m = module("      no-source: true\n      ignore: [\"node_modules/\", \"*.log\"]\n");
        assert!(m.no_source());
        assert_eq!(m.ignore_patterns().unwrap(), vec!["node_modules/", "*.log"]);
    }
}
