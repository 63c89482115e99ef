use anyhow::Result;
use colored::Colorize;
use rhtmx_nav::{load_route_table, NavConfig};
use rhtmx_router::{get_all_route_sections_for_route, resolve_component_path_for_route};
use serde_json::json;

pub fn execute(config: &NavConfig, path: &str, role: Option<&str>, as_json: bool) -> Result<()> {
    let table = load_route_table(&config.routes.path)?;
    let role = role.unwrap_or(&config.guards.default_role);

    let Some(matched) = table.match_route(path) else {
        if as_json {
            println!("{}", json!({ "path": path, "route": null }));
        } else {
            println!("{} {}", "✗ No route matches".red().bold(), path.cyan());
        }
        return Ok(());
    };

    let route = table.inherit_configuration_from_parent_route(matched.route);
    let component = resolve_component_path_for_route(&route, Some(role));
    let sections = get_all_route_sections_for_route(&route, Some(role));
    let chain: Vec<&str> = table
        .get_route_chain_for_path(path)
        .into_iter()
        .map(|r| r.slug.as_str())
        .collect();

    if as_json {
        let report = json!({
            "path": path,
            "role": role,
            "slug": route.slug,
            "exact": matched.exact,
            "params": matched.params,
            "component": component,
            "sections": sections,
            "redirect": route.redirect,
            "requiresAuth": route.requires_auth,
            "enabled": route.enabled,
            "chain": chain,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{} {}", "✓ Route".green().bold(), route.slug.cyan());
    println!();
    println!("Path:      {}", path);
    println!("Role:      {}", role);
    println!("Match:     {}", if matched.exact { "exact" } else { "dynamic" });
    if !matched.params.is_empty() {
        println!("Params:");
        for (name, value) in &matched.params {
            println!("  {} = {}", name.yellow(), value);
        }
    }
    if let Some(target) = &route.redirect {
        println!("Redirect:  {}", target.cyan());
    }
    println!("Component: {}", component.as_deref().unwrap_or("-"));
    println!(
        "Sections:  {}",
        if sections.is_empty() { "-".to_string() } else { sections.join(", ") }
    );
    println!("Auth:      {}", if route.requires_auth { "required" } else { "not required" });
    if !route.enabled {
        println!("{}", "⚠ Route is disabled".yellow());
    }
    println!("Chain:     {}", chain.join(" › "));

    Ok(())
}
