//! Route configuration validation
//!
//! Works on raw JSON so that it can report problems the typed loader would
//! silently skip.

use crate::descriptor::DEFAULT_ROLE_KEY;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueKind {
    InvalidJson,
    InvalidType,
    MissingRequiredField,
    InvalidFieldType,
    DuplicateSlugs,
    MissingRecommendedField,
    MissingDefaultRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub kind: IssueKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl ValidationIssue {
    fn new(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            route_index: None,
            field: None,
            message: message.into(),
        }
    }

    fn at(mut self, index: usize, field: &str) -> Self {
        self.route_index = Some(index);
        self.field = Some(field.to_string());
        self
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// No errors; warnings do not affect validity
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate route configuration text
pub fn validate_route_config_str(text: &str) -> ValidationReport {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => validate_route_config(&value),
        Err(e) => ValidationReport {
            errors: vec![ValidationIssue::new(
                IssueKind::InvalidJson,
                format!("Route config is not valid JSON: {}", e),
            )],
            warnings: Vec::new(),
        },
    }
}

/// Validate a parsed route configuration
pub fn validate_route_config(routes: &Value) -> ValidationReport {
    let mut report = ValidationReport::default();

    let Some(routes) = routes.as_array() else {
        report.errors.push(ValidationIssue::new(
            IssueKind::InvalidType,
            format!("Route config must be an array, got {}", type_name(routes)),
        ));
        return report;
    };

    for (index, route) in routes.iter().enumerate() {
        check_route(index, route, &mut report);
    }

    let mut seen: Vec<&str> = Vec::new();
    let mut duplicates: Vec<&str> = Vec::new();
    for slug in routes.iter().filter_map(|route| route.get("slug")?.as_str()) {
        if seen.contains(&slug) {
            if !duplicates.contains(&slug) {
                duplicates.push(slug);
            }
        } else {
            seen.push(slug);
        }
    }
    if !duplicates.is_empty() {
        report.errors.push(ValidationIssue::new(
            IssueKind::DuplicateSlugs,
            format!("Found duplicate route slugs: {}", duplicates.join(", ")),
        ));
    }

    if report.is_valid() {
        info!(
            routes = routes.len(),
            warnings = report.warnings.len(),
            "Route config valid"
        );
    } else {
        warn!(
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "Route config has errors"
        );
    }

    report
}

fn check_route(index: usize, route: &Value, report: &mut ValidationReport) {
    let slug = route.get("slug").and_then(Value::as_str);
    let label = slug.unwrap_or("<no slug>");
    let is_redirect = truthy(route.get("redirect"));

    if slug.map_or(true, str::is_empty) {
        report.errors.push(
            ValidationIssue::new(
                IssueKind::MissingRequiredField,
                format!(
                    "Route at index {} missing required field 'slug' or slug is not a string",
                    index
                ),
            )
            .at(index, "slug"),
        );
    }

    let has_component = route
        .get("componentPath")
        .and_then(Value::as_str)
        .is_some_and(|path| !path.is_empty());
    if !is_redirect && !has_component && !truthy(route.get("customComponentPath")) {
        report.errors.push(
            ValidationIssue::new(
                IssueKind::MissingRequiredField,
                format!(
                    "Route at index {} ({}) missing 'componentPath' or 'customComponentPath'",
                    index, label
                ),
            )
            .at(index, "componentPath"),
        );
    }

    let section = route.get("section");
    if !is_redirect && !label.contains("pathMatch") && !truthy(section) {
        report.warnings.push(
            ValidationIssue::new(
                IssueKind::MissingRecommendedField,
                format!("Route at index {} ({}) missing 'section' field", index, label),
            )
            .at(index, "section"),
        );
    }

    if let Some(Value::Object(variants)) = section {
        if !variants.contains_key(DEFAULT_ROLE_KEY) {
            report.warnings.push(
                ValidationIssue::new(
                    IssueKind::MissingDefaultRole,
                    format!(
                        "Route at index {} ({}) has a role-based section without a '{}' entry, unknown roles get the first declared section",
                        index, label, DEFAULT_ROLE_KEY
                    ),
                )
                .at(index, "section"),
            );
        }
    }

    let mut expect = |field: &str, expected: &str, ok: fn(&Value) -> bool| {
        if let Some(value) = route.get(field) {
            if !value.is_null() && !ok(value) {
                report.errors.push(
                    ValidationIssue::new(
                        IssueKind::InvalidFieldType,
                        format!(
                            "Route at index {} ({}) has invalid {} type, expected {} but got {}",
                            index,
                            label,
                            field,
                            expected,
                            type_name(value)
                        ),
                    )
                    .at(index, field),
                );
            }
        }
    };

    expect("redirect", "string", Value::is_string);
    expect("supportedRoles", "array", Value::is_array);
    expect("preLoadSections", "array", Value::is_array);
    expect("requiresAuth", "boolean", Value::is_boolean);
    expect("enabled", "boolean", Value::is_boolean);
    expect("inheritConfigFromParent", "boolean", Value::is_boolean);
    expect("preloadExclude", "boolean", Value::is_boolean);
    expect("dependencies", "object", Value::is_object);
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(_) => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
