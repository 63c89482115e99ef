use anyhow::{Context, Result};
use colored::Colorize;
use rhtmx_nav::{GuardContext, MemoryEnvironment, NavConfig, Navigator};
use std::sync::Arc;

pub struct NavigateRequest {
    pub path: String,
    pub authenticated: bool,
    pub role: Option<String>,
    pub flags: Vec<String>,
    pub language: Option<String>,
}

impl NavigateRequest {
    fn context(&self) -> GuardContext {
        let mut context = GuardContext {
            is_authenticated: self.authenticated,
            user_role: self.role.clone(),
            ..GuardContext::default()
        };
        for flag in &self.flags {
            context = context.with_flag(flag.as_str(), true);
        }
        context
    }
}

pub fn execute(config: NavConfig, request: NavigateRequest) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(run(config, request))
}

async fn run(config: NavConfig, request: NavigateRequest) -> Result<()> {
    let environment = Arc::new(MemoryEnvironment::default());
    environment.set_language(request.language.clone());

    let routes = rhtmx_nav::load_route_table(&config.routes.path)?;
    let navigator = Navigator::builder(config).routes(routes).environment(environment).build();

    println!("{} {}", "Navigating to".green().bold(), request.path.cyan());
    println!();

    let outcome = navigator.navigate(&request.path, &request.context());

    if !outcome.is_allowed() {
        println!("{} {}", "✗ Blocked:".red().bold(), outcome.guard.reason);
        if let Some(target) = &outcome.guard.redirect_to {
            println!("Redirect:  {}", target.cyan());
        }
        return Ok(());
    }

    println!("{} {}", "✓ Allowed:".green().bold(), outcome.guard.reason);
    if let Some(route) = &outcome.route {
        println!("Route:     {}", route.slug.cyan());
    }
    if !outcome.params.is_empty() {
        println!("Params:");
        for (name, value) in &outcome.params {
            println!("  {} = {}", name.yellow(), value);
        }
    }
    println!("Locale:    {}", outcome.locale.as_deref().unwrap_or("-"));

    if outcome.sections.is_empty() {
        println!("Sections:  -");
        return Ok(());
    }
    println!("Sections:  {}", outcome.sections.join(", "));
    println!();

    let Some(report) = outcome.wait_for_background().await else {
        println!("{}", "⚠ Background loads did not complete".yellow());
        return Ok(());
    };

    println!("{}", "Preload".bold());
    for section in &report.preload.successful {
        println!("  {} {}", "✓".green(), section);
    }
    for section in &report.preload.failed {
        println!("  {} {}", "✗".red(), section);
    }

    println!("{} ({})", "Translations".bold(), report.locale);
    for (section, keys) in &report.translations {
        let line = format!("{} key(s)", keys);
        if *keys == 0 {
            println!("  {} {} {}", "⚠".yellow(), section, line.yellow());
        } else {
            println!("  {} {} {}", "✓".green(), section, line);
        }
    }

    Ok(())
}
