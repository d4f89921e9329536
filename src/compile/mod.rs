//! Pipeline compilation

pub mod build;
pub mod compiler;
pub mod error;
pub mod resolver;

pub use build::{Build, CompiledBuild, CompiledTest, Test, DEFAULT_FLAVOR};
pub use compiler::Compiled;
pub use error::{CompileError, ValidationError};
pub use resolver::{BuiltinCatalog, TemplateCatalog, TemplateResolver};
