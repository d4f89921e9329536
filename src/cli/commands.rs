//! CLI command definitions

use clap::Args;
use std::path::PathBuf;

/// Compile a package build
#[derive(Debug, Args, Clone)]
pub struct CompileCommand {
    /// Path to the package YAML file
    #[arg(short, long)]
    pub file: String,

    /// Target architecture
    #[arg(long, default_value = "x86_64")]
    pub arch: String,

    /// Build flavor (gnu or musl)
    #[arg(long, default_value = crate::compile::DEFAULT_FLAVOR)]
    pub flavor: String,

    /// Build options to enable (repeatable)
    #[arg(long)]
    pub build_option: Vec<String>,

    /// Directories searched for pipeline templates before the built-in ones (repeatable)
    #[arg(long)]
    pub pipeline_dir: Vec<PathBuf>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Compile a standalone test run
#[derive(Debug, Args, Clone)]
pub struct TestCommand {
    /// Path to the package YAML file
    #[arg(short, long)]
    pub file: String,

    /// Target architecture
    #[arg(long, default_value = "x86_64")]
    pub arch: String,

    /// Package to install for the main test instead of the configured package
    #[arg(long)]
    pub package: Option<String>,

    /// Directories searched for pipeline templates before the built-in ones (repeatable)
    #[arg(long)]
    pub pipeline_dir: Vec<PathBuf>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List built-in pipeline templates
#[derive(Debug, Args, Clone)]
pub struct TemplatesCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}
