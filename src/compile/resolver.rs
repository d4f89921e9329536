//! Template lookup for `uses:` steps
//!
//! Templates are looked up in the configured pipeline directories first, in
//! order, and then in a read-only catalog (by default the templates built into
//! the binary).

use crate::compile::error::CompileError;
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// File extension of template files in pipeline directories
pub const TEMPLATE_EXT: &str = "yaml";

/// Read-only table of named templates
pub trait TemplateCatalog: Send + Sync {
    /// Raw template definition for `name`
    fn lookup(&self, name: &str) -> Option<Cow<'_, [u8]>>;

    /// All template names, sorted
    fn names(&self) -> Vec<String>;
}

const BUILTIN: &[(&str, &str)] = &[
    ("autoconf/configure", include_str!("../../pipelines/autoconf/configure.yaml")),
    ("autoconf/make", include_str!("../../pipelines/autoconf/make.yaml")),
    ("autoconf/make-install", include_str!("../../pipelines/autoconf/make-install.yaml")),
    ("fetch", include_str!("../../pipelines/fetch.yaml")),
    ("git-checkout", include_str!("../../pipelines/git-checkout.yaml")),
    ("strip", include_str!("../../pipelines/strip.yaml")),
];

/// Templates compiled into the binary
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinCatalog;

impl TemplateCatalog for BuiltinCatalog {
    fn lookup(&self, name: &str) -> Option<Cow<'_, [u8]>> {
        BUILTIN
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, body)| Cow::Borrowed(body.as_bytes()))
    }

    fn names(&self) -> Vec<String> {
        BUILTIN.iter().map(|(n, _)| n.to_string()).collect()
    }
}

impl TemplateCatalog for HashMap<String, Vec<u8>> {
    fn lookup(&self, name: &str) -> Option<Cow<'_, [u8]>> {
        self.get(name).map(|body| Cow::Borrowed(body.as_slice()))
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Resolves template names to their raw definitions
#[derive(Clone)]
pub struct TemplateResolver {
    pipeline_dirs: Vec<PathBuf>,
    catalog: Arc<dyn TemplateCatalog>,
}

impl std::fmt::Debug for TemplateResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateResolver")
            .field("pipeline_dirs", &self.pipeline_dirs)
            .field("catalog", &self.catalog.names())
            .finish()
    }
}

impl Default for TemplateResolver {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl TemplateResolver {
    /// Resolver over `pipeline_dirs` backed by the built-in catalog
    pub fn new(pipeline_dirs: Vec<PathBuf>) -> Self {
        Self::with_catalog(pipeline_dirs, Arc::new(BuiltinCatalog))
    }

    pub fn with_catalog(pipeline_dirs: Vec<PathBuf>, catalog: Arc<dyn TemplateCatalog>) -> Self {
        Self {
            pipeline_dirs,
            catalog,
        }
    }

    pub fn pipeline_dirs(&self) -> &[PathBuf] {
        &self.pipeline_dirs
    }

    pub fn catalog(&self) -> &dyn TemplateCatalog {
        self.catalog.as_ref()
    }

    pub fn shared_catalog(&self) -> Arc<dyn TemplateCatalog> {
        Arc::clone(&self.catalog)
    }

    /// Raw definition of the template `name`; the first directory hit wins
    pub fn resolve(&self, name: &str) -> Result<Vec<u8>, CompileError> {
        for dir in &self.pipeline_dirs {
            let path = dir.join(format!("{}.{}", name, TEMPLATE_EXT));
            debug!("trying to load pipeline {:?} from {}", name, dir.display());

            match std::fs::read(&path) {
                Ok(data) => {
                    info!("Found pipeline {:?} at {}", name, path.display());
                    return Ok(data);
                }
                Err(e) => debug!("  {}: {}", path.display(), e),
            }
        }

        debug!("trying to load pipeline {:?} from the embedded catalog", name);
        self.catalog
            .lookup(name)
            .map(Cow::into_owned)
            .ok_or_else(|| CompileError::TemplateNotFound(name.to_string()))
    }
}
