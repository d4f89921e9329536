//! Build and test entry points
//!
//! Each build context (main package, every subpackage, and the tests of each)
//! gets its own substitution context and its own [`Compiled`] accumulator.
//! Results are merged into a fresh copy of the configuration; the input
//! configuration is never modified.

use crate::{
    compile::{
        compiler::Compiled,
        error::CompileError,
        resolver::{TemplateCatalog, TemplateResolver},
    },
    core::{
        config::{Configuration, Subpackage},
        provenance::PackageUrl,
        substitution::substitute_and_quote,
        SubstitutionMap,
    },
};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

/// Build flavor used when none is requested
pub const DEFAULT_FLAVOR: &str = "gnu";

/// A full package build: main pipeline, subpackages and their tests
#[derive(Debug, Clone)]
pub struct Build {
    pub configuration: Configuration,
    pub arch: String,
    pub flavor: String,
    pub enabled_build_options: Vec<String>,
    resolver: TemplateResolver,
    interrupted: Arc<AtomicBool>,
}

/// Output of [`Build::compile`]
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledBuild {
    /// Compiled copy of the configuration with merged environment packages
    pub configuration: Configuration,

    /// Needs gathered from the main and subpackage build pipelines
    pub needs: Vec<String>,

    /// References to every externally fetched source of the build
    pub external_refs: Vec<PackageUrl>,
}

impl Build {
    pub fn new(configuration: Configuration, arch: impl Into<String>) -> Self {
        Self {
            configuration,
            arch: arch.into(),
            flavor: DEFAULT_FLAVOR.to_string(),
            enabled_build_options: Vec::new(),
            resolver: TemplateResolver::default(),
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_flavor(mut self, flavor: impl Into<String>) -> Self {
        self.flavor = flavor.into();
        self
    }

    pub fn with_build_options(mut self, options: Vec<String>) -> Self {
        self.enabled_build_options = options;
        self
    }

    pub fn with_pipeline_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.resolver = TemplateResolver::with_catalog(dirs, self.resolver.shared_catalog());
        self
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn TemplateCatalog>) -> Self {
        self.resolver = TemplateResolver::with_catalog(self.resolver.pipeline_dirs().to_vec(), catalog);
        self
    }

    /// Flag checked during compilation; setting it aborts with `Interrupted`
    pub fn with_interrupt(mut self, interrupted: Arc<AtomicBool>) -> Self {
        self.interrupted = interrupted;
        self
    }

    fn compiled(&self) -> Compiled {
        Compiled::new(self.resolver.clone(), self.interrupted.clone())
    }

    /// Compile every pipeline of the build
    pub fn compile(&self) -> Result<CompiledBuild, CompileError> {
        let cfg = &self.configuration;
        info!(
            "compiling {} for {} ({})",
            cfg.package.name, self.arch, self.flavor
        );

        let sm = SubstitutionMap::new(cfg, &self.arch, &self.flavor, &self.enabled_build_options)
            .map_err(CompileError::SubstitutionMap)?;
        let mut out = cfg.clone();

        let mut main = self.compiled();
        out.pipeline = main
            .compile_pipelines(&sm, &cfg.pipeline)
            .map_err(CompileError::in_phase("main pipelines"))?;
        let (mut needs, mut external_refs) = main.into_parts();

        for (sp, compiled_sp) in cfg.subpackages.iter().zip(out.subpackages.iter_mut()) {
            let sm = sm.subpackage(sp);
            let phase = format!("subpackage {:?}", sp.name);

            compiled_sp.condition = subpackage_condition(&sm, sp).map_err(CompileError::in_phase(&phase))?;

            let mut c = self.compiled();
            compiled_sp.pipeline = c
                .compile_pipelines(&sm, &sp.pipeline)
                .map_err(CompileError::in_phase(&phase))?;
            let (sp_needs, sp_refs) = c.into_parts();
            needs.extend(sp_needs);
            external_refs.extend(sp_refs);

            let (Some(test), Some(compiled_test)) = (&sp.test, compiled_sp.test.as_mut()) else {
                continue;
            };

            let mut tc = self.compiled();
            compiled_test.pipeline = tc
                .compile_pipelines(&sm, &test.pipeline)
                .map_err(CompileError::in_phase(format!("{} tests", phase)))?;

            // The subpackage under test has to be installed to be tested.
            let packages = &mut compiled_test.environment.contents.packages;
            packages.push(sp.name.clone());
            packages.extend(tc.into_parts().0);
        }

        let packages = &mut out.environment.contents.packages;
        for opt in &self.enabled_build_options {
            if let Some(option) = cfg.options.get(opt) {
                packages.extend(option.environment.contents.packages.iter().cloned());
            }
        }
        packages.extend(needs.iter().cloned());

        if let (Some(test), Some(compiled_test)) = (&cfg.test, out.test.as_mut()) {
            let mut tc = self.compiled();
            compiled_test.pipeline = tc
                .compile_pipelines(&sm, &test.pipeline)
                .map_err(CompileError::in_phase("main test pipelines"))?;

            let packages = &mut compiled_test.environment.contents.packages;
            packages.extend(tc.into_parts().0);
            packages.push(cfg.package.name.clone());
        }

        Ok(CompiledBuild {
            configuration: out,
            needs,
            external_refs,
        })
    }
}

/// A standalone test run of an already built package
#[derive(Debug, Clone)]
pub struct Test {
    pub configuration: Configuration,
    pub arch: String,

    /// Package to install for the main test instead of the configured one
    pub package: Option<String>,
    resolver: TemplateResolver,
    interrupted: Arc<AtomicBool>,
}

/// Output of [`Test::compile`]
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledTest {
    /// Compiled copy of the configuration with merged test environments
    pub configuration: Configuration,

    /// Needs gathered from the main test pipeline
    pub needs: Vec<String>,
}

impl Test {
    pub fn new(configuration: Configuration, arch: impl Into<String>) -> Self {
        Self {
            configuration,
            arch: arch.into(),
            package: None,
            resolver: TemplateResolver::default(),
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_package(mut self, package: Option<String>) -> Self {
        self.package = package;
        self
    }

    pub fn with_pipeline_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.resolver = TemplateResolver::with_catalog(dirs, self.resolver.shared_catalog());
        self
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn TemplateCatalog>) -> Self {
        self.resolver = TemplateResolver::with_catalog(self.resolver.pipeline_dirs().to_vec(), catalog);
        self
    }

    pub fn with_interrupt(mut self, interrupted: Arc<AtomicBool>) -> Self {
        self.interrupted = interrupted;
        self
    }

    fn compiled(&self) -> Compiled {
        Compiled::new(self.resolver.clone(), self.interrupted.clone())
    }

    /// Compile the test pipelines of the package and its subpackages.
    ///
    /// The build pipelines are compiled as well, so they are validated and
    /// come back substituted, but their needs are discarded: tests must not
    /// inherit build-time packages.
    pub fn compile(&self) -> Result<CompiledTest, CompileError> {
        let cfg = &self.configuration;
        info!("compiling tests for {} on {}", cfg.package.name, self.arch);

        let sm = SubstitutionMap::new(cfg, &self.arch, DEFAULT_FLAVOR, &[])
            .map_err(CompileError::SubstitutionMap)?;
        let mut out = cfg.clone();

        let mut ignore = self.compiled();
        out.pipeline = ignore
            .compile_pipelines(&sm, &cfg.pipeline)
            .map_err(CompileError::in_phase("main pipelines"))?;

        let mut c = self.compiled();
        let test_pipeline = cfg.test.as_ref().map(|t| t.pipeline.as_slice()).unwrap_or(&[]);
        let compiled_main_test = c
            .compile_pipelines(&sm, test_pipeline)
            .map_err(CompileError::in_phase("main test pipelines"))?;

        for (sp, compiled_sp) in cfg.subpackages.iter().zip(out.subpackages.iter_mut()) {
            let sm = sm.subpackage(sp);
            let phase = format!("subpackage {:?}", sp.name);

            compiled_sp.condition = subpackage_condition(&sm, sp).map_err(CompileError::in_phase(&phase))?;
            compiled_sp.pipeline = ignore
                .compile_pipelines(&sm, &sp.pipeline)
                .map_err(CompileError::in_phase(&phase))?;

            let (Some(test), Some(compiled_test)) = (&sp.test, compiled_sp.test.as_mut()) else {
                continue;
            };

            let mut tc = self.compiled();
            compiled_test.pipeline = tc
                .compile_pipelines(&sm, &test.pipeline)
                .map_err(CompileError::in_phase(format!("{} tests", phase)))?;

            let packages = &mut compiled_test.environment.contents.packages;
            packages.push(sp.name.clone());
            packages.extend(tc.into_parts().0);
        }

        let needs = c.into_parts().0;
        let main_test = out.test.get_or_insert_with(Default::default);
        main_test.pipeline = compiled_main_test;

        let package = self.package.clone().unwrap_or_else(|| cfg.package.name.clone());
        let packages = &mut main_test.environment.contents.packages;
        packages.push(package);
        packages.extend(needs.iter().cloned());

        Ok(CompiledTest {
            configuration: out,
            needs,
        })
    }
}

/// Substitute a subpackage's `if:` against its own context
fn subpackage_condition(
    sm: &SubstitutionMap,
    sp: &Subpackage,
) -> Result<Option<String>, CompileError> {
    sp.condition
        .as_deref()
        .map(|cond| {
            substitute_and_quote(sm.substitutions(), cond)
                .map_err(CompileError::substitution("subpackage if"))
        })
        .transpose()
}
