//! CLI output formatting

use crate::core::{config::Configuration, PackageUrl};
use console::Emoji;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static PACKAGE: Emoji<'_, '_> = Emoji("📦 ", "- ");
pub static LINK: Emoji<'_, '_> = Emoji("🔗 ", "- ");

/// Format a list of needed packages for display
pub fn format_needs(title: &str, needs: &[String]) -> String {
    if needs.is_empty() {
        return format!("{} {}: {}", INFO, style(title).bold(), style("none").dim());
    }

    let mut out = format!("{} {} ({}):", INFO, style(title).bold(), style(needs.len()).cyan());
    for pkg in needs {
        out.push_str(&format!("\n  {}{}", PACKAGE, pkg));
    }
    out
}

/// Format external references for display
pub fn format_external_refs(refs: &[PackageUrl]) -> String {
    if refs.is_empty() {
        return format!("{} {}: {}", INFO, style("External refs").bold(), style("none").dim());
    }

    let mut out = format!(
        "{} {} ({}):",
        INFO,
        style("External refs").bold(),
        style(refs.len()).cyan()
    );
    for r in refs {
        out.push_str(&format!("\n  {}{}", LINK, style(r).dim()));
    }
    out
}

/// Format a one-line summary of a compiled configuration
pub fn format_summary(cfg: &Configuration) -> String {
    format!(
        "{} {} {} ({} steps, {} subpackages)",
        CHECK,
        style(&cfg.package.name).bold(),
        style(cfg.package.full_version()).dim(),
        count_steps(&cfg.pipeline),
        cfg.subpackages.len()
    )
}

fn count_steps(pipelines: &[crate::core::Pipeline]) -> usize {
    pipelines
        .iter()
        .map(|p| 1 + count_steps(&p.pipeline))
        .sum()
}
