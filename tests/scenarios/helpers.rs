//! Test utility functions for pkgpipe scenarios

use pkgpipe::compile::{Build, Compiled, TemplateResolver, Test};
use pkgpipe::core::config::{Configuration, Pipeline};
use pkgpipe::core::SubstitutionMap;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Parse a package configuration, panicking on invalid YAML
pub fn config(yaml: &str) -> Configuration {
    Configuration::from_yaml(yaml).expect("configuration should parse")
}

/// Parse a bare list of steps
pub fn steps(yaml: &str) -> Vec<Pipeline> {
    serde_yaml::from_str(yaml).expect("steps should parse")
}

/// Catalog made of in-memory templates
pub fn catalog(templates: &[(&str, &str)]) -> Arc<HashMap<String, Vec<u8>>> {
    Arc::new(
        templates
            .iter()
            .map(|(name, body)| (name.to_string(), body.as_bytes().to_vec()))
            .collect(),
    )
}

/// Write a template file into a pipeline directory
pub fn write_template(dir: &Path, name: &str, body: &str) {
    let path = dir.join(format!("{}.yaml", name));
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, body).unwrap();
}

/// Accumulator over the built-in templates
pub fn builtin_compiled() -> Compiled {
    Compiled::new(TemplateResolver::default(), Arc::new(AtomicBool::new(false)))
}

/// Substitution context for a package at a version
pub fn context(name: &str, version: &str) -> SubstitutionMap {
    let cfg = config(&format!("package:\n  name: {}\n  version: {}\n", name, version));
    SubstitutionMap::new(&cfg, "x86_64", "gnu", &[]).unwrap()
}

/// Build on x86_64 with the built-in templates
pub fn build(yaml: &str) -> Build {
    Build::new(config(yaml), "x86_64")
}

/// Standalone test on x86_64 with the built-in templates
pub fn test(yaml: &str) -> Test {
    Test::new(config(yaml), "x86_64")
}

/// Packages of the main build environment
pub fn build_env(cfg: &Configuration) -> Vec<&str> {
    cfg.environment.contents.packages.iter().map(String::as_str).collect()
}

/// Packages of the main test environment
pub fn test_env(cfg: &Configuration) -> Vec<&str> {
    cfg.test
        .as_ref()
        .map(|t| t.environment.contents.packages.iter().map(String::as_str).collect())
        .unwrap_or_default()
}

/// Packages of a subpackage's test environment
pub fn subpackage_test_env<'a>(cfg: &'a Configuration, name: &str) -> Vec<&'a str> {
    cfg.subpackages
        .iter()
        .find(|sp| sp.name == name)
        .and_then(|sp| sp.test.as_ref())
        .map(|t| t.environment.contents.packages.iter().map(String::as_str).collect())
        .unwrap_or_default()
}
