//! pkgpipe - compiles package build pipelines

pub mod cli;
pub mod compile;
pub mod core;

// Re-export commonly used types
pub use compile::{Build, CompileError, Compiled, CompiledBuild, CompiledTest, Test, TemplateResolver};
pub use core::{Configuration, PackageUrl, Pipeline, SubstitutionMap};
