//! Compilation error types

use crate::core::{ConditionError, ProvenanceError, SubstitutionError};
use thiserror::Error;

/// Parameter validation failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("undefined input {0:?}")]
    UnknownInput(String),

    #[error("missing required input {0:?}")]
    MissingInput(String),
}

/// Error raised while compiling pipelines
///
/// Nested failures are wrapped with the position of the step (or the build
/// phase) they happened in, so the rendered message reads as a path from the
/// entry point down to the root cause.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("could not find 'uses' pipeline {0:?}")]
    TemplateNotFound(String),

    #[error("unable to parse pipeline {name:?}: {message}")]
    TemplateParse { name: String, message: String },

    #[error("unable to validate with: {0}")]
    Validation(#[from] ValidationError),

    #[error("mutating {field}: {error}")]
    Substitution {
        field: &'static str,
        error: SubstitutionError,
    },

    #[error("building substitution map: {0}")]
    SubstitutionMap(SubstitutionError),

    #[error("evaluating conditional {expr:?}: {error}")]
    Condition { expr: String, error: ConditionError },

    #[error("computing external refs: {0}")]
    Provenance(#[from] ProvenanceError),

    #[error("compilation interrupted")]
    Interrupted,

    #[error("compiling pipeline[{index}] ({identity}): {cause}")]
    Step {
        index: usize,
        identity: String,
        cause: Box<CompileError>,
    },

    #[error("gathering deps for pipeline[{index}] ({identity}): {cause}")]
    GatherDeps {
        index: usize,
        identity: String,
        cause: Box<CompileError>,
    },

    #[error("compiling {phase}: {cause}")]
    Phase { phase: String, cause: Box<CompileError> },
}

impl CompileError {
    pub(crate) fn substitution(field: &'static str) -> impl FnOnce(SubstitutionError) -> Self {
        move |error| CompileError::Substitution { field, error }
    }

    pub(crate) fn in_phase(phase: impl Into<String>) -> impl FnOnce(CompileError) -> Self {
        let phase = phase.into();
        move |cause| CompileError::Phase {
            phase,
            cause: Box::new(cause),
        }
    }

    /// The innermost error, with all positional wrapping removed
    pub fn root_cause(&self) -> &CompileError {
        match self {
            CompileError::Step { cause, .. }
            | CompileError::GatherDeps { cause, .. }
            | CompileError::Phase { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}
