//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{CompileCommand, TemplatesCommand, TestCommand};

/// Package build pipeline compiler
#[derive(Debug, Parser, Clone)]
#[command(name = "pkgpipe")]
#[command(author = "pkgpipe Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Compiles package build pipelines", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Compile a package build
    Compile(CompileCommand),

    /// Compile a standalone test run
    Test(TestCommand),

    /// List built-in pipeline templates
    Templates(TemplatesCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}

use std::ffi::OsString;
