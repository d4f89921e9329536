//! Pipeline compiler - expands templates, substitutes variables and gathers needs

use crate::{
    compile::{
        error::{CompileError, ValidationError},
        resolver::TemplateResolver,
    },
    core::{
        condition,
        config::{Input, Pipeline},
        provenance::{compute_external_refs, PackageUrl},
        substitution::{input_token, is_token, right_join, substitute, substitute_and_quote},
        SubstitutionMap,
    },
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Accumulates the results of compiling one build context
///
/// One instance belongs to exactly one context (main build, main test, one
/// subpackage build, one subpackage test). Results are handed on by value,
/// never by sharing the accumulator.
#[derive(Debug)]
pub struct Compiled {
    resolver: TemplateResolver,
    interrupted: Arc<AtomicBool>,

    /// Runtime packages required by the enabled steps, in tree order
    pub needs: Vec<String>,

    /// References to externally fetched sources, in tree order
    pub external_refs: Vec<PackageUrl>,
}

impl Compiled {
    pub fn new(resolver: TemplateResolver, interrupted: Arc<AtomicBool>) -> Self {
        Self {
            resolver,
            interrupted,
            needs: Vec::new(),
            external_refs: Vec::new(),
        }
    }

    /// Consume the accumulator, returning `(needs, external_refs)`
    pub fn into_parts(self) -> (Vec<String>, Vec<PackageUrl>) {
        (self.needs, self.external_refs)
    }

    /// Compile a list of top-level steps.
    ///
    /// The input is left untouched; the compiled steps are returned. Each step
    /// is compiled and then has its needs gathered before the next one starts.
    pub fn compile_pipelines(
        &mut self,
        sm: &SubstitutionMap,
        pipelines: &[Pipeline],
    ) -> Result<Vec<Pipeline>, CompileError> {
        let mut compiled = Vec::with_capacity(pipelines.len());

        for (index, pipeline) in pipelines.iter().enumerate() {
            let identity = pipeline.identity().to_string();

            let mut step = self
                .compile_pipeline(sm, pipeline.clone())
                .map_err(|cause| CompileError::Step {
                    index,
                    identity: identity.clone(),
                    cause: Box::new(cause),
                })?;

            self.gather_deps(&mut step)
                .map_err(|cause| CompileError::GatherDeps {
                    index,
                    identity,
                    cause: Box::new(cause),
                })?;

            compiled.push(step);
        }

        Ok(compiled)
    }

    fn compile_pipeline(
        &mut self,
        sm: &SubstitutionMap,
        mut pipeline: Pipeline,
    ) -> Result<Pipeline, CompileError> {
        // The caller's parameters, before a template can replace them.
        let uses = pipeline.uses.clone();
        let with = pipeline.with.clone();

        if let Some(name) = uses.as_deref() {
            self.check_interrupted()?;
            let data = self.resolver.resolve(name)?;
            let template: Pipeline =
                serde_yaml::from_slice(&data).map_err(|e| CompileError::TemplateParse {
                    name: name.to_string(),
                    message: e.to_string(),
                })?;
            pipeline = pipeline.overlay(template);
        }

        let validated = validate_with(&with, &pipeline.inputs)?;
        let mutated = sm
            .mutate_with(&validated)
            .map_err(CompileError::substitution("with"))?;

        if let Some(needs) = pipeline.needs.as_mut() {
            for pkg in needs.packages.iter_mut() {
                *pkg = substitute(&mutated, pkg).map_err(CompileError::substitution("needs"))?;
            }
        }

        if let Some(workdir) = pipeline.workdir.as_mut() {
            *workdir = substitute(&mutated, workdir).map_err(CompileError::substitution("workdir"))?;
        }

        pipeline.runs =
            substitute(&mutated, &pipeline.runs).map_err(CompileError::substitution("runs"))?;

        if let Some(cond) = pipeline.condition.as_mut() {
            *cond = substitute_and_quote(&mutated, cond).map_err(CompileError::substitution("if"))?;
        }

        if let Some(name) = uses.as_deref() {
            let refs = compute_external_refs(name, &mutated)?;
            for r in &refs {
                debug!("external ref {} for pipeline {:?}", r, name);
            }
            self.external_refs.extend(refs);
        }

        let children = std::mem::take(&mut pipeline.pipeline);
        for (index, mut child) in children.into_iter().enumerate() {
            child.with = right_join(&mutated, &child.with);
            let identity = child.identity().to_string();

            let compiled = self
                .compile_pipeline(sm, child)
                .map_err(|cause| CompileError::Step {
                    index,
                    identity,
                    cause: Box::new(cause),
                })?;
            pipeline.pipeline.push(compiled);
        }

        pipeline.with = non_default_inputs(&with, &mutated, &pipeline.inputs);
        pipeline.inputs.clear();

        Ok(pipeline)
    }

    /// Harvest needs from a compiled step and the enabled part of its subtree.
    ///
    /// A step whose condition is false contributes nothing, and neither does
    /// anything nested under it.
    fn gather_deps(&mut self, pipeline: &mut Pipeline) -> Result<(), CompileError> {
        let id = pipeline.identity().to_string();

        if let Some(expr) = pipeline.condition.as_deref() {
            self.check_interrupted()?;
            let enabled = condition::evaluate(expr).map_err(|error| CompileError::Condition {
                expr: expr.to_string(),
                error,
            })?;
            if !enabled {
                debug!("pipeline {:?} disabled by {:?}, skipping its needs", id, expr);
                return Ok(());
            }
        }

        if let Some(needs) = pipeline.needs.take() {
            for pkg in &needs.packages {
                info!("  adding package {:?} for pipeline {:?}", pkg, id);
            }
            self.needs.extend(needs.packages);
        }

        for child in pipeline.pipeline.iter_mut() {
            self.gather_deps(child)?;
        }

        Ok(())
    }

    fn check_interrupted(&self) -> Result<(), CompileError> {
        if self.interrupted.load(Ordering::SeqCst) {
            return Err(CompileError::Interrupted);
        }
        Ok(())
    }
}

/// Check caller parameters against the declared inputs and fill in defaults.
///
/// Keys that are already substitution tokens were inherited from an enclosing
/// step and are passed through unchecked.
fn validate_with(
    with: &BTreeMap<String, String>,
    inputs: &BTreeMap<String, Input>,
) -> Result<BTreeMap<String, String>, ValidationError> {
    if let Some(unknown) = with.keys().find(|k| !is_token(k) && !inputs.contains_key(*k)) {
        return Err(ValidationError::UnknownInput(unknown.clone()));
    }

    let mut validated = with.clone();
    for (name, input) in inputs {
        let value = validated.entry(name.clone()).or_default();
        if value.is_empty() {
            *value = input.default.clone();
        }
        if input.required && value.is_empty() {
            return Err(ValidationError::MissingInput(name.clone()));
        }
    }

    Ok(validated)
}

/// The caller's parameters whose final value differs from the input default
fn non_default_inputs(
    with: &BTreeMap<String, String>,
    mutated: &HashMap<String, String>,
    inputs: &BTreeMap<String, Input>,
) -> BTreeMap<String, String> {
    with.keys()
        .filter(|k| !is_token(k))
        .filter_map(|k| {
            let value = mutated.get(&input_token(k)).cloned().unwrap_or_default();
            let default = inputs.get(k).map(|i| i.default.as_str()).unwrap_or("");
            (value != default).then(|| (k.clone(), value))
        })
        .collect()
}
