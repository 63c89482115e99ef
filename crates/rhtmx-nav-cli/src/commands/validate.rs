use anyhow::{bail, Context, Result};
use colored::Colorize;
use rhtmx_nav::NavConfig;
use rhtmx_router::validate_route_config_str;
use std::fs;

pub fn execute(config: &NavConfig, strict: bool) -> Result<()> {
    let path = &config.routes.path;
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read route config: {}", path))?;

    println!("{} {}", "Validating".green().bold(), path.cyan());
    println!();

    let report = validate_route_config_str(&text);

    for issue in &report.errors {
        println!("  {} {}", "error".red().bold(), issue);
    }
    for issue in &report.warnings {
        println!("  {} {}", "warning".yellow().bold(), issue);
    }
    if !report.errors.is_empty() || !report.warnings.is_empty() {
        println!();
    }

    println!(
        "{} error(s), {} warning(s)",
        report.errors.len(),
        report.warnings.len()
    );

    if !report.is_valid() {
        bail!("Route config has {} error(s)", report.errors.len());
    }
    if strict && !report.warnings.is_empty() {
        bail!("Route config has {} warning(s)", report.warnings.len());
    }

    println!("{}", "✓ Route config is valid".green().bold());
    Ok(())
}
