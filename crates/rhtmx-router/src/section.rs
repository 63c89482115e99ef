//! Section resolution
//!
//! Maps a route's section declaration to concrete section names for the
//! current role, and computes the set of sections a navigation should warm.

use crate::descriptor::{RouteDescriptor, SectionSpec, DEFAULT_ROLE_KEY};
use tracing::{debug, warn};

/// Resolve the section name for `role`
///
/// A plain name is returned as is. For a role map the lookup order is the
/// role's entry, then `fallback`, then the first declared value. Empty
/// names are treated as absent.
pub fn resolve_role_section_variant(
    section: Option<&SectionSpec>,
    role: Option<&str>,
    fallback: &str,
) -> Option<String> {
    match section? {
        SectionSpec::Single(name) => non_empty(name),
        SectionSpec::ByRole(variants) => {
            if let Some(name) = role.and_then(|role| variants.get(role)).and_then(|n| non_empty(n)) {
                return Some(name);
            }

            if let Some(name) = variants.get(fallback).and_then(|n| non_empty(n)) {
                debug!(?role, fallback, section = %name, "Section resolved via fallback key");
                return Some(name);
            }

            let (first_role, name) = variants.first()?;
            let name = non_empty(name)?;
            warn!(
                ?role,
                first_role,
                section = %name,
                "No role or fallback entry, using first declared section"
            );
            Some(name)
        }
    }
}

/// Resolve the section for `role` using the `default` fallback key
pub fn resolve_section_for_role(route: &RouteDescriptor, role: Option<&str>) -> Option<String> {
    resolve_role_section_variant(route.section.as_ref(), role, DEFAULT_ROLE_KEY)
}

/// Declared preload sections, deduplicated in first-occurrence order
pub fn get_preload_sections_for_route(route: &RouteDescriptor) -> Vec<String> {
    dedup(route.pre_load_sections.iter().filter(|s| !s.is_empty()).cloned())
}

/// The route's own section followed by its preload sections, deduplicated
pub fn get_all_route_sections_for_route(route: &RouteDescriptor, role: Option<&str>) -> Vec<String> {
    let own = resolve_section_for_role(route, role);
    let sections = dedup(own.into_iter().chain(get_preload_sections_for_route(route)));

    debug!(slug = %route.slug, count = sections.len(), "Resolved route sections");
    sections
}

pub fn is_section_role_based(section: Option<&SectionSpec>) -> bool {
    section.is_some_and(SectionSpec::is_role_based)
}

/// Every distinct section name a declaration can resolve to
pub fn get_all_section_variants(section: Option<&SectionSpec>) -> Vec<String> {
    match section {
        None => Vec::new(),
        Some(SectionSpec::Single(name)) => vec![name.clone()],
        Some(SectionSpec::ByRole(variants)) => dedup(variants.values().cloned()),
    }
}

fn non_empty(name: &str) -> Option<String> {
    (!name.is_empty()).then(|| name.to_string())
}

fn dedup(names: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::new();
    for name in names {
        if !unique.contains(&name) {
            unique.push(name);
        }
    }
    unique
}
