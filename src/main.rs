use anyhow::{Context, Result};
use pkgpipe::cli::commands::{CompileCommand, TemplatesCommand, TestCommand};
use pkgpipe::cli::output::*;
use pkgpipe::cli::{Cli, Command};
use pkgpipe::compile::{Build, BuiltinCatalog, TemplateCatalog, Test};
use pkgpipe::core::Configuration;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("{}", e))
        .context("Failed to set logging subscriber")?;

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let flag = interrupted.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping compilation");
                flag.store(true, Ordering::SeqCst);
            }
        });
    }

    match &cli.command {
        Command::Compile(cmd) => compile_build(cmd.clone(), interrupted).await?,
        Command::Test(cmd) => compile_test(cmd.clone(), interrupted).await?,
        Command::Templates(cmd) => list_templates(cmd)?,
    }

    Ok(())
}

async fn compile_build(cmd: CompileCommand, interrupted: Arc<AtomicBool>) -> Result<()> {
    let config = Configuration::from_file(&cmd.file).context("Failed to load package config")?;
    eprintln!("{} Loaded package: {}", INFO, style(&config.package.name).bold());

    let build = Build::new(config, cmd.arch.clone())
        .with_flavor(cmd.flavor.clone())
        .with_build_options(cmd.build_option.clone())
        .with_pipeline_dirs(cmd.pipeline_dir.clone())
        .with_interrupt(interrupted);

    let result = tokio::task::spawn_blocking(move || build.compile())
        .await
        .context("Compilation task panicked")?;

    let compiled = match result {
        Ok(compiled) => compiled,
        Err(e) => {
            eprintln!("{} Compilation failed:", CROSS);
            eprintln!("  {}", style(&e).red());
            error!("{}", e);
            std::process::exit(1);
        }
    };

    if cmd.json {
        let data = serde_json::json!({
            "configuration": compiled.configuration,
            "needs": compiled.needs,
            "external_refs": compiled.external_refs,
        });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        print!("{}", serde_yaml::to_string(&compiled.configuration)?);
    }

    eprintln!();
    eprintln!("{}", format_summary(&compiled.configuration));
    eprintln!("{}", format_needs("Build needs", &compiled.needs));
    eprintln!("{}", format_external_refs(&compiled.external_refs));

    Ok(())
}

async fn compile_test(cmd: TestCommand, interrupted: Arc<AtomicBool>) -> Result<()> {
    let config = Configuration::from_file(&cmd.file).context("Failed to load package config")?;
    eprintln!("{} Loaded package: {}", INFO, style(&config.package.name).bold());

    let test = Test::new(config, cmd.arch.clone())
        .with_package(cmd.package.clone())
        .with_pipeline_dirs(cmd.pipeline_dir.clone())
        .with_interrupt(interrupted);

    let result = tokio::task::spawn_blocking(move || test.compile())
        .await
        .context("Compilation task panicked")?;

    let compiled = match result {
        Ok(compiled) => compiled,
        Err(e) => {
            eprintln!("{} Test compilation failed:", CROSS);
            eprintln!("  {}", style(&e).red());
            error!("{}", e);
            std::process::exit(1);
        }
    };

    if cmd.json {
        let data = serde_json::json!({
            "configuration": compiled.configuration,
            "needs": compiled.needs,
        });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        print!("{}", serde_yaml::to_string(&compiled.configuration)?);
    }

    eprintln!();
    eprintln!("{}", format_summary(&compiled.configuration));
    eprintln!("{}", format_needs("Test needs", &compiled.needs));

    Ok(())
}

fn list_templates(cmd: &TemplatesCommand) -> Result<()> {
    let names = BuiltinCatalog.names();

    if cmd.json {
        let data = serde_json::json!({ "templates": names });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    println!("{} Built-in pipeline templates:", INFO);
    for name in &names {
        println!("  {}", style(name).bold());
    }

    Ok(())
}
