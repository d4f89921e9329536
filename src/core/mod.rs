//! Core domain: configuration model, substitution, conditions and provenance

pub mod condition;
pub mod config;
pub mod provenance;
pub mod substitution;

pub use condition::{evaluate, ConditionError};
pub use config::{Configuration, Pipeline, Subpackage, Test};
pub use provenance::{compute_external_refs, PackageUrl, ProvenanceError};
pub use substitution::{SubstitutionError, SubstitutionMap};
