//! Package build configuration from YAML

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use anyhow::{Context, Result};

/// Top-level package configuration loaded from YAML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// The main package being built
    pub package: Package,

    /// Build environment (packages installed before the build runs)
    #[serde(default)]
    pub environment: Environment,

    /// Main build pipeline
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pipeline: Vec<Pipeline>,

    /// Subpackages split out of the main build
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subpackages: Vec<Subpackage>,

    /// Test pipeline for the main package
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<Test>,

    /// User-defined variables, exposed as `${{vars.<name>}}`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vars: BTreeMap<String, String>,

    /// Variables derived from other values by regex replacement
    #[serde(default, rename = "var-transforms", skip_serializing_if = "Vec::is_empty")]
    pub var_transforms: Vec<VarTransform>,

    /// Optional build variants that can be switched on at build time
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, BuildOption>,
}

/// Package metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub epoch: u64,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl Package {
    /// Version with the epoch suffix, e.g. `1.2.3-r0`
    pub fn full_version(&self) -> String {
        format!("{}-r{}", self.version, self.epoch)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default)]
    pub contents: Contents,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contents {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<String>,
}

/// A single pipeline step
///
/// A step is either literal (its fields are its definition) or refers to a
/// named template through `uses`, in which case the template supplies the
/// definition and `with` carries the caller's parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    /// Human-readable step name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Template reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uses: Option<String>,

    /// Parameter overrides passed to the template
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub with: BTreeMap<String, String>,

    /// Documented inputs accepted by this step
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, Input>,

    /// Shell script body
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub runs: String,

    /// Working directory for `runs`
    #[serde(default, rename = "working-directory", skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,

    /// Guard expression; the step is skipped when it evaluates false
    #[serde(default, rename = "if", skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    /// Packages required at runtime by this step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needs: Option<Needs>,

    /// Nested steps
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pipeline: Vec<Pipeline>,
}

impl Pipeline {
    /// Name used to refer to the step in logs and errors
    pub fn identity(&self) -> &str {
        self.name
            .as_deref()
            .or(self.uses.as_deref())
            .unwrap_or("???")
    }

    /// Lay a loaded template over this step.
    ///
    /// Every field the template sets replaces the step's own value; fields the
    /// template leaves empty keep what the caller wrote.
    pub fn overlay(self, template: Pipeline) -> Pipeline {
        let mut with = self.with;
        with.extend(template.with);

        Pipeline {
            name: template.name.or(self.name),
            uses: template.uses.or(self.uses),
            with,
            inputs: if template.inputs.is_empty() { self.inputs } else { template.inputs },
            runs: if template.runs.is_empty() { self.runs } else { template.runs },
            workdir: template.workdir.or(self.workdir),
            condition: template.condition.or(self.condition),
            needs: template.needs.or(self.needs),
            pipeline: if template.pipeline.is_empty() { self.pipeline } else { template.pipeline },
        }
    }
}

/// Documented step input
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Input {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Value used when the caller does not pass one
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default: String,

    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Needs {
    #[serde(default)]
    pub packages: Vec<String>,
}

/// A package split out of the main build
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subpackage {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Guard expression deciding whether the subpackage is produced
    #[serde(default, rename = "if", skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pipeline: Vec<Pipeline>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<Test>,
}

/// Test definition for a package or subpackage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Test {
    #[serde(default)]
    pub environment: Environment,

    #[serde(default)]
    pub pipeline: Vec<Pipeline>,
}

/// Build option that can be enabled at build time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildOption {
    /// Variable overrides applied when the option is enabled
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vars: BTreeMap<String, String>,

    /// Extra build environment packages when the option is enabled
    #[serde(default)]
    pub environment: Environment,
}

/// Derives `${{vars.<to>}}` by running `match`/`replace` over `from`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VarTransform {
    pub from: String,

    #[serde(rename = "match")]
    pub match_: String,

    pub replace: String,

    pub to: String,
}

impl Configuration {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Configuration = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.package.name.trim().is_empty() {
            anyhow::bail!("package name must not be empty");
        }

        let mut seen = HashSet::new();
        for sp in &self.subpackages {
            if sp.name.trim().is_empty() {
                anyhow::bail!("subpackage name must not be empty");
            }
            if sp.name == self.package.name {
                anyhow::bail!("subpackage '{}' has the same name as the main package", sp.name);
            }
            if !seen.insert(&sp.name) {
                anyhow::bail!("duplicate subpackage: {}", sp.name);
            }
        }

        for vt in &self.var_transforms {
            if self.vars.contains_key(&vt.to) {
                anyhow::bail!(
                    "var-transform target '{}' shadows a variable of the same name",
                    vt.to
                );
            }
        }

        Ok(())
    }
}
